use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "attrsync", about = "Attribute-driven group membership sync", version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "attrsync.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Directory to write the configuration into
        #[arg(long, default_value = "/etc/attrsync")]
        dir: String,
    },
    /// Validate the configuration and report every violation
    Validate,
    /// Run one reconciliation pass against the directory
    Sync {
        /// Preview changes without applying
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { dir } => {
            commands::init::run(&dir).await?;
        }
        Commands::Validate => {
            commands::validate::run(&cli.config).await?;
        }
        Commands::Sync { dry_run } => {
            commands::sync::run(&cli.config, dry_run).await?;
        }
    }

    Ok(())
}
