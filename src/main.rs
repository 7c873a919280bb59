use anyhow::Result;
use clap::Parser;
use neuroscan::{config::Config, web::serve};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "neuroscan")]
#[command(about = "Brain MRI tumor triage service with persistent case history")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:5005")]
    bind: String,

    /// ONNX classification model
    #[arg(long, default_value = "models/model.onnx")]
    model_path: String,

    /// SQLite database file for case records
    #[arg(long, default_value = "data/neuroscan.db")]
    database: String,

    /// Directory for uploaded scans
    #[arg(long, default_value = "static/uploads")]
    uploads_dir: String,

    /// Per-request inference timeout in seconds
    #[arg(long)]
    inference_timeout_secs: Option<u64>,

    /// Per-operation storage timeout in seconds
    #[arg(long)]
    storage_timeout_secs: Option<u64>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable development mode
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志系统
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting NeuroScan triage service...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Model: {}", args.model_path);
    tracing::info!("Database: {}", args.database);
    tracing::info!("Uploads directory: {}", args.uploads_dir);

    let config = Config::new(
        args.bind,
        args.model_path,
        args.database,
        args.uploads_dir,
        args.dev,
    )?
    .with_timeouts(
        args.inference_timeout_secs.map(Duration::from_secs),
        args.storage_timeout_secs.map(Duration::from_secs),
    );

    serve(config).await?;

    Ok(())
}
