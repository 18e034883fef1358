//! Privileged IP changer service
//!
//! Supports running as:
//! - Console application (default), stopped with Ctrl-C
//! - Windows Service (with --service flag)
//!
//! Configuration is loaded from config.toml in the executable directory.

use ipchanger::{config::get_config_path, init_tracing, service::windows_service, Config};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Check if running as Windows service
    if args.iter().any(|arg| arg == "--service") {
        run_as_service();
    } else {
        run_console();
    }
}

fn run_as_service() {
    // Load config to get the service name
    let config = Config::load_or_default(get_config_path());

    if let Err(e) = windows_service::run_as_service(&config.service.name) {
        eprintln!("Service error: {}", e);
        std::process::exit(1);
    }
}

fn run_console() {
    let config = Config::load_or_default(get_config_path());

    init_tracing(&config.logging.level);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received Ctrl-C, shutting down");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    // Dropping the sender would stop the listener
                    std::future::pending::<()>().await;
                }
            }
        });

        ipchanger::run(&config, shutdown_rx).await;
    });
}
