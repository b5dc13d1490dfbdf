use crate::config::parse::load_config;
use crate::config::types::{Config, OutputConfig};
use crate::poller::{PollController, PollSettings, Scheduler, TokioTimer};
use crate::remote::HttpLogDirectory;
use crate::sink::{JsonLinesSink, RecordSink};
use crate::source::parser::RecordParser;
use crate::storage::cursor::CursorStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::parse::ConfigError),

    #[error("cursor error: {0}")]
    Cursor(#[from] crate::storage::cursor::CursorError),

    #[error("parser error: {0}")]
    Parser(#[from] crate::source::parser::ParserError),

    #[error("log directory error: {0}")]
    Directory(#[from] crate::remote::DirectoryError),

    #[error("sink error: {0}")]
    Sink(#[from] crate::sink::SinkError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/rds-pgsql-log/config.yml");
            eprintln!("  /etc/rds-pgsql-log/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'rds-pgsql-log config init' to generate one.");
            std::process::exit(1);
        }
    };

    run_poller(&config_path).await.map_err(|e| e.into())
}

async fn run_poller(config_path: &Path) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    let store = CursorStore::new(config.poll.pos_file.clone())?;
    prepare_cursor_file(&store).await;

    info!(
        region = %config.source.region,
        db_instance_identifier = %config.source.db_instance_identifier,
        endpoint = %config.source.endpoint,
        "Creating log directory client"
    );
    let directory = Arc::new(HttpLogDirectory::new(&config.source)?);
    let sink = build_sink(&config).await?;

    let controller = PollController::new(
        directory,
        sink,
        store,
        RecordParser::new()?,
        PollSettings::from_config(&config),
    );

    let handle = Scheduler::spawn(controller, TokioTimer);
    info!("Poller started, press Ctrl+C to shutdown");

    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }

    info!("Shutdown signal received, waiting for in-flight cycle");
    let cycles = handle.shutdown().await?;
    info!(cycles = cycles, "Poller shutdown complete");

    Ok(())
}

/// Make sure the cursor file exists. Failures here are not fatal: the cycle
/// falls back to a zero cursor and retries persistence every time.
async fn prepare_cursor_file(store: &CursorStore) {
    if let Some(parent) = store.path().parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!(path = %parent.display(), error = %e, "Could not create cursor directory");
            }
        }
    }

    if let Err(e) = store.touch().await {
        warn!(error = %e, "Could not create cursor file");
    }
}

async fn build_sink(config: &Config) -> Result<Arc<dyn RecordSink>, RunError> {
    let sink: Arc<dyn RecordSink> = match &config.output {
        OutputConfig::Stdout => Arc::new(JsonLinesSink::stdout()),
        OutputConfig::File { path } => {
            info!(path = %path.display(), "Writing records to file");
            Arc::new(JsonLinesSink::file(path).await?)
        }
    };
    Ok(sink)
}
