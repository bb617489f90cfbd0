//! GSLB control plane - Main Entry Point

use clap::Parser;
use log::{error, info};
use tokio::signal;

use gslb_core::{GslbEngine, Shutdown};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    // Sets a custom config file
    #[arg(short, long)]
    config: Option<String>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    let config_path = cli
        .config
        .unwrap_or_else(|| "./config/config.yaml".to_string());

    // Read configuration file
    let config = match gslb_config::loader::read_config(&config_path) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("Error loading config: {}", err);
            std::process::exit(1);
        }
    };

    // Initialize the Logger
    if let Err(err) = gslb_utils::logger::init_logger(&config.log.level, config.log.file.as_deref())
    {
        eprintln!("Error initializing logger: {}", err);
        std::process::exit(1);
    }

    // Validates the configuration as part of construction
    let engine = match GslbEngine::new(config) {
        Ok(engine) => engine,
        Err(err) => {
            error!("Configuration validation failed: {}. Exiting...", err);
            std::process::exit(1);
        }
    };

    info!(
        "GSLB is starting: {} PoPs, {} regions, ranking {:?}",
        engine.pops().len(),
        engine.regions().len(),
        engine.ranking()
    );

    let (tx, shutdown) = Shutdown::channel();
    let handle = match engine.start(shutdown).await {
        Ok(handle) => handle,
        Err(err) => {
            error!("Failed to start: {}", err);
            std::process::exit(1);
        }
    };

    match handle.observability_addr() {
        Some(addr) => info!("GSLB is ready, dashboard at http://{}", addr),
        None => info!("GSLB is ready"),
    }

    let join = handle.join();
    tokio::pin!(join);

    let result = tokio::select! {
        res = &mut join => res,
        () = shutdown_signal() => {
            // Fails only if the engine already stopped
            let _ = tx.send(true);
            join.await
        }
    };

    if let Err(err) = result {
        error!("GSLB stopped with error: {}", err);
        std::process::exit(1);
    }

    info!("GSLB stopped");
}
