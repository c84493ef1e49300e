use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use tokio::net::TcpListener;
use tokio::signal;

use gtfs_rt_validator::api::create_router;
use gtfs_rt_validator::config::{Config, DEFAULT_PORT};
use gtfs_rt_validator::utils::ensure_directory_exists;
use gtfs_rt_validator::validation::time::elapsed_time_string;
use gtfs_rt_validator::{AppState, BatchProcessor, Database, SortBy};

#[derive(Parser, Debug)]
#[command(name = "gtfs-rt-validator", version, about = "GTFS-realtime feed validator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the REST API and background monitors
    Serve {
        #[arg(long, env = "GTFS_RT_VALIDATOR_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        #[arg(long, env = "GTFS_RT_VALIDATOR_DATA_DIR", default_value = "data")]
        data_dir: PathBuf,
        #[arg(long, env = "GTFS_RT_VALIDATOR_DATABASE", default_value = "data/validator.db")]
        database: PathBuf,
    },
    /// Validate a directory of archived GTFS-realtime files
    Batch {
        #[arg(long)]
        gtfs: PathBuf,
        #[arg(long = "gtfs-realtime-path")]
        gtfs_realtime_path: PathBuf,
        #[arg(long, value_enum, default_value_t = SortArg::Date)]
        sort: SortArg,
        /// Also write each decoded feed as JSON with this extension
        #[arg(long = "plain-text")]
        plain_text: Option<String>,
        #[arg(long)]
        stats: bool,
        #[arg(long)]
        ignore_shapes: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SortArg {
    Name,
    Date,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Commands::Serve { port, data_dir, database } => serve(Config::new(port, data_dir, database)).await,
        Commands::Batch { gtfs, gtfs_realtime_path, sort, plain_text, stats, ignore_shapes } => {
            let mut builder = BatchProcessor::builder(gtfs, gtfs_realtime_path)
                .sort_by(match sort {
                    SortArg::Name => SortBy::Name,
                    SortArg::Date => SortBy::DateModified,
                })
                .return_statistics(stats)
                .ignore_shapes(ignore_shapes);
            if let Some(extension) = plain_text {
                builder = builder.plain_text_extension(extension);
            }
            let processor = builder.build();

            let statistics = tokio::task::spawn_blocking(move || processor.process_feeds()).await??;
            for (index, stats) in statistics.iter().enumerate() {
                info!(
                    "File {}: total {}, rules {}",
                    index + 1,
                    elapsed_time_string(stats.total_iteration_time),
                    elapsed_time_string(stats.total_rule_time())
                );
            }
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting GTFS-realtime validator...");

    ensure_directory_exists(&config.database)?;
    let database = Database::new(&config.database)?;

    let address = format!("0.0.0.0:{}", config.port);
    let state = AppState::new(&database, config)?;
    let scheduler = state.scheduler.clone();
    let app = create_router(state);

    let listener = TcpListener::bind(&address).await.with_context(|| format!("Failed to bind {}", address))?;
    info!("Server running on {}", address);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    scheduler.shutdown().await;
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
