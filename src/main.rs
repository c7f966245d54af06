mod catalog;
mod cli;
mod config;
mod credentials;
mod discovery;
mod secrets;
mod utils;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use cli::{keys::key_cmd, models::models_cmd, providers::providers_cmd, ColorMode};

#[derive(
    Parser, Default, Clone, Copy, ValueEnum, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum RequestedColorMode {
    #[default]
    Auto,
    On,
    Off,
}

/// Output formats
#[derive(
    Parser, ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum ListingFormat {
    /// Format the output as a table
    #[default]
    Table,
    /// Format the output as JSON
    Json,
    /// Format the output as a table without a header
    HeaderlessTable,
}

#[derive(Parser)]
#[command(name = "modelkit")]
#[command(
    about = "Model catalog and credential manager for multi-provider chat clients",
    version = "0.1.0"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, default_value_t = RequestedColorMode::default())]
    color: RequestedColorMode,
    /// Use the specified config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and manage the model catalog
    Models(ModelsArgs),
    /// Manage provider API keys
    Key(KeyArgs),
    /// List providers and their credential state
    Providers(ProvidersArgs),
}

#[derive(Parser)]
pub(crate) struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
pub(crate) enum ModelsCommand {
    /// List catalog models from providers with a usable key
    List {
        /// Include models from providers without a usable key
        #[arg(short, long)]
        all: bool,
        #[arg(short, long, default_value_t = ListingFormat::default())]
        format: ListingFormat,
    },
    /// Query all providers and merge new models into the catalog
    Discover,
    /// Select the current model, e.g. "groq/llama3-70b-8192"
    Use { spec: String },
    /// Mark a model as a favorite
    Favorite {
        spec: String,
        /// Remove the favorite mark instead
        #[arg(long)]
        remove: bool,
    },
}

#[derive(Parser)]
pub(crate) struct KeyArgs {
    #[command(subcommand)]
    command: KeyCommand,
}

#[derive(Subcommand)]
pub(crate) enum KeyCommand {
    /// Store an API key for a provider
    Set {
        provider: String,
        value: String,
        /// Store the key for one specific model only
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Report whether a provider has a usable key
    Check { provider: String },
    /// Delete a provider's stored key
    Delete { provider: String },
    /// List AI_KEY_* names present in the environment
    List {
        #[arg(short, long, default_value_t = ListingFormat::default())]
        format: ListingFormat,
    },
}

#[derive(Parser)]
pub(crate) struct ProvidersArgs {
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let color = ColorMode::resolve_auto(cli.color);
    utils::errors::configure_color(color);

    let config = config::read_config(cli.config);
    let stack = cli::build_stack(&config).await;

    match &cli.command {
        Commands::Models(args) => models_cmd(&stack, args).await,
        Commands::Key(args) => key_cmd(&stack, args).await,
        Commands::Providers(args) => providers_cmd(&stack, args).await,
    }
}
