use super::{format_output, table::Table, Stack};
use crate::credentials::KEY_PREFIX;
use crate::secrets::env_secrets_with_prefix;
use crate::{warn, KeyArgs, KeyCommand};

#[derive(serde::Serialize)]
struct EnvKeyRow {
    name: String,
    source: String,
}

impl From<Vec<EnvKeyRow>> for Table {
    fn from(value: Vec<EnvKeyRow>) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["NAME", "SOURCE"]);

        for row in value {
            tab.add_row(vec![row.name, row.source]);
        }

        tab
    }
}

pub(crate) async fn key_cmd(stack: &Stack, args: &KeyArgs) {
    match &args.command {
        KeyCommand::Set {
            provider,
            value,
            model,
        } => {
            let stored = match model {
                Some(model) => stack.resolver.save_for_model(provider, model, value).await,
                None => stack.resolver.save(provider, value).await,
            };

            if !stored {
                crate::die!("failed to store the key for \"{}\"", provider);
            }

            // A stale "provider unavailable" discovery result must not
            // outlive the credential change.
            stack.orchestrator.clear_cache();

            if !stack.resolver.has_usable_credential(provider).await {
                warn!(
                    "the key was stored but does not look like a valid {} key",
                    provider
                );
            }

            println!("key stored for \"{}\"", provider);
        }
        KeyCommand::Check { provider } => {
            match stack.resolver.has_usable_credential(provider).await {
                true => println!("\"{}\" has a usable key", provider),
                false => println!("\"{}\" has no usable key", provider),
            }
        }
        KeyCommand::Delete { provider } => {
            if !stack.resolver.delete(provider).await {
                crate::die!("failed to delete the key for \"{}\"", provider);
            }

            stack.orchestrator.clear_cache();

            println!("key deleted for \"{}\"", provider);
        }
        KeyCommand::List { format } => {
            // Values are never printed, only which names are set.
            let rows: Vec<EnvKeyRow> = env_secrets_with_prefix(KEY_PREFIX)
                .into_iter()
                .map(|(name, _)| EnvKeyRow {
                    name,
                    source: "environment".to_string(),
                })
                .collect();

            format_output(rows, *format);
        }
    }
}
