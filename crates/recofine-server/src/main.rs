//! RecoFine: incremental similarity engines behind a small HTTP trigger surface.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use recofine_core::RecoConfig;
use recofine_runtime::{EngineKind, Orchestrator};
use recofine_server::{build_router, AppState};
use recofine_store::SqliteStore;

fn resolve_data_dir() -> PathBuf {
    std::env::var("RECOFINE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn print_usage() {
    println!("RecoFine — incremental similarity engines");
    println!();
    println!("Usage: recofine [command]");
    println!();
    println!("Commands:");
    println!("  (none)                   Start the server");
    println!("  train <engine>           Run one engine and exit");
    println!("  help                     Show this help message");
    println!();
    println!("Engines:");
    for kind in EngineKind::all() {
        println!("  {}", kind);
    }
}

/// Run one engine in-process. Returns the process exit code.
fn train_once(engine: &str) -> anyhow::Result<i32> {
    let kind: EngineKind = match engine.parse() {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("{}. Use 'recofine help' for usage.", e);
            return Ok(2);
        }
    };

    let config = RecoConfig::from_env(resolve_data_dir())?;
    let store = SqliteStore::open(&config.data_paths.db_file)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;
    let orchestrator = Orchestrator::new(config.engines)?;

    match orchestrator.run(kind, &store) {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(0)
        }
        Err(e) => {
            error!("{} failed: {}", kind.checkpoint_name(), e);
            Ok(1)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "train" => {
                if args.len() < 3 {
                    eprintln!("Usage: recofine train <engine>");
                    std::process::exit(1);
                }
                let engine = args[2].clone();
                let code = tokio::task::spawn_blocking(move || train_once(&engine)).await??;
                std::process::exit(code);
            }
            "--help" | "-h" | "help" => {
                print_usage();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'recofine help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = RecoConfig::from_env(&data_dir)?;
    let port = config.port;

    let store = SqliteStore::open(&config.data_paths.db_file)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;

    let state = Arc::new(AppState::new(config, store)?);
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("RecoFine server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
