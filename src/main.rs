use anyhow::Context;
use clap::Parser;
use lineledger::config::ConfigManager;
use lineledger::*;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lineledger")]
#[command(about = "Select lines from server-side text files and plot them", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite database holding tracked files, selections and settings
    #[arg(long, default_value = "lineledger.db")]
    db: PathBuf,

    /// Directory with the text files users may pick (saved to settings)
    #[arg(long)]
    text_dir: Option<String>,

    /// Required file name prefix, e.g. "room_"; pass "" to accept any name
    #[arg(long)]
    name_prefix: Option<String>,

    /// Eligible file extension without the dot
    #[arg(long)]
    extension: Option<String>,

    /// Lines per page in the viewer
    #[arg(long)]
    page_size: Option<usize>,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3737")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    log::info!("Database path: {:?}", cli.db);

    // Create parent directory if it doesn't exist
    if let Some(parent) = cli.db.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    db::init_database(&cli.db)?;

    let manager = ConfigManager::new(cli.db.clone()).context("Failed to open settings")?;
    let mut config = manager.load().await.context("Failed to load settings")?;
    let loaded = config.clone();

    if let Some(dir) = cli.text_dir {
        config.text_directory = dir;
    }
    if let Some(prefix) = cli.name_prefix {
        config.name_prefix = Some(prefix).filter(|p| !p.is_empty());
    }
    if let Some(extension) = cli.extension {
        config.extension = extension;
    }
    if let Some(page_size) = cli.page_size {
        config.page_size = page_size.max(1);
    }
    if config != loaded {
        manager.save(&config).await.context("Failed to save settings")?;
        log::info!("Settings updated from command line");
    }

    log::info!(
        "Serving {:?} files from {} ({} lines per page)",
        config.extension,
        config.text_directory,
        config.page_size
    );

    let state = AppState {
        db_path: cli.db,
        config: Arc::new(manager),
    };

    log::info!("LineLedger initialized successfully");

    http_server::start_server(state, cli.bind).await
}
