use std::process::ExitCode;

use lodestone_bin::Server;
use lodestone_config::ServerConfig;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "config.json";

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging with a custom format
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(true)
        .with_max_level(tracing::Level::DEBUG)
        .compact()
        .init();

    // An explicit config path must exist; the default path may not.
    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(&path),
        None => ServerConfig::load_or_default(DEFAULT_CONFIG_PATH),
    };

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("[STARTUP] {}", e);
            return ExitCode::from(1);
        }
    };

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("[STARTUP] {:#}", e);
            return ExitCode::from(1);
        }
    };

    let trigger = server.shutdown_trigger();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("[SHUTDOWN] Ctrl-C received");
            trigger.trigger();
        }
    });

    if let Err(e) = server.run().await {
        error!("[SHUTDOWN] Server terminated abnormally: {:#}", e);
        return ExitCode::from(1);
    }

    info!("[SHUTDOWN] Goodbye");
    ExitCode::SUCCESS
}
