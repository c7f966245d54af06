use tokio_util::sync::CancellationToken;

use super::{format_output, table::Table, Stack};
use crate::catalog::{ModelDescriptor, ModelKey};
use crate::{die, ModelsArgs, ModelsCommand};

#[derive(serde::Serialize)]
struct ModelRow {
    provider: String,
    model: String,
    context: u32,
    favorite: bool,
    current: bool,
    uses: u64,
}

impl From<Vec<ModelRow>> for Table {
    fn from(value: Vec<ModelRow>) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["PROVIDER", "MODEL", "CONTEXT", "FAV", "CURRENT", "USES"]);

        for row in value {
            tab.add_row(vec![
                row.provider,
                row.model,
                row.context.to_string(),
                if row.favorite { "yes" } else { "-" }.to_string(),
                if row.current { "*" } else { "-" }.to_string(),
                row.uses.to_string(),
            ]);
        }

        tab
    }
}

fn rows(models: Vec<ModelDescriptor>, current: Option<&ModelKey>) -> Vec<ModelRow> {
    models
        .into_iter()
        .map(|model| {
            let is_current = current.is_some_and(|key| *key == model.key());

            ModelRow {
                provider: model.provider,
                model: model.model,
                context: model.max_context,
                favorite: model.favorite,
                current: is_current,
                uses: model.use_count,
            }
        })
        .collect()
}

fn parse_spec(spec: &str) -> ModelKey {
    match ModelKey::parse(spec) {
        Some(key) => key,
        None => die!("\"{}\" is not a provider/model spec", spec),
    }
}

pub(crate) async fn models_cmd(stack: &Stack, args: &ModelsArgs) {
    match &args.command {
        ModelsCommand::List { all, format } => {
            let models = if *all {
                stack.manager.get_models_unfiltered().await
            } else {
                stack.manager.get_models().await
            };

            let current = stack.manager.current().await;

            format_output(rows(models, current.as_ref()), *format);
        }
        ModelsCommand::Discover => {
            // Ctrl-C stops the merge between batches rather than mid-write.
            let cancel = CancellationToken::new();

            {
                let cancel = cancel.clone();

                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cancel.cancel();
                    }
                });
            }

            let added = stack.manager.discover_and_merge(&cancel).await;

            println!("{} new model(s) added to the catalog", added);
        }
        ModelsCommand::Use { spec } => {
            let key = parse_spec(spec);

            if stack.manager.set_current(key.provider(), key.model()).await {
                println!("current model is now {}", key);
            } else {
                die!("failed to set the current model");
            }
        }
        ModelsCommand::Favorite { spec, remove } => {
            let key = parse_spec(spec);
            let favorite = !remove;

            if stack
                .manager
                .set_favorite(key.provider(), key.model(), favorite)
                .await
            {
                match favorite {
                    true => println!("{} marked as a favorite", key),
                    false => println!("{} is no longer a favorite", key),
                }
            } else {
                die!("failed to update {}", key);
            }
        }
    }
}
