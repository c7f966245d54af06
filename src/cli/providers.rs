use super::{format_output, table::Table, Stack};
use crate::ProvidersArgs;

#[derive(serde::Serialize)]
struct ProviderRow {
    provider: String,
    credential: bool,
}

impl From<Vec<ProviderRow>> for Table {
    fn from(value: Vec<ProviderRow>) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["PROVIDER", "CREDENTIAL"]);

        for row in value {
            tab.add_row(vec![
                row.provider,
                if row.credential { "ready" } else { "missing" }.to_string(),
            ]);
        }

        tab
    }
}

pub(crate) async fn providers_cmd(stack: &Stack, args: &ProvidersArgs) {
    let mut rows = Vec::new();

    for provider in stack.orchestrator.provider_names() {
        let credential = stack.resolver.has_usable_credential(&provider).await;

        rows.push(ProviderRow {
            provider,
            credential,
        });
    }

    format_output(rows, args.format);
}
