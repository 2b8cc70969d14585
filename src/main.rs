use clap::Parser;
use color_eyre::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use lifeflow::cli::{self, Cli, Commands};
use lifeflow::preferences::DocumentState;
use lifeflow::{Config, Database, Profile, Workspace};

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let config = match &cli.config {
        Some(path) => {
            let mut config = Config::load_from(Path::new(path))?;
            config.apply_profile(profile);
            config
        }
        None => Config::load_with_profile(profile)?,
    };

    init_tracing(&config.log_filter);

    let db_path = config.get_database_path();
    let db = Database::new(
        db_path
            .to_str()
            .ok_or_else(|| color_eyre::eyre::eyre!("Database path contains invalid UTF-8"))?,
    )?;

    let document = Arc::new(DocumentState::new());
    let workspace = Workspace::open(Arc::new(db), document, config.color_scheme());
    let _theme_watch = workspace.preferences.init_theme();
    let _language = workspace.preferences.init_language();

    cli::run(cli.command.unwrap_or(Commands::Summary), &workspace, &config)?;

    Ok(())
}

/// RUST_LOG wins over the config's log_filter
fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
