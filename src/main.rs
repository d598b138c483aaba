//! # Pool Server - Entry Point
//! src/main.rs
//!
//! Lee la configuración, arranca el servidor y lo apaga ordenadamente con
//! Ctrl-C.

use pool_server::config::{BuilderKind, Config};
use pool_server::response::{Echo, ResponseBuilder, StaticPage};
use pool_server::server::Server;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    let config = Config::new();

    // RUST_LOG tiene prioridad sobre --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();

    config.print_summary();

    let builder: Arc<dyn ResponseBuilder> = match config.builder {
        BuilderKind::Static => Arc::new(StaticPage::new()),
        BuilderKind::Echo => Arc::new(Echo),
    };

    let mut server = match Server::bind(config, builder) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    let handle = server.handle();
    let signal_handle = handle.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if signal_handle.is_shutdown_requested() {
            warn!("shutdown already in progress");
            return;
        }
        signal_handle.shutdown();
    }) {
        warn!(error = %e, "cannot install Ctrl-C handler");
    }

    let result = server.start().and_then(|_| server.listen());
    match result {
        Ok(report) => {
            let json = serde_json::to_string_pretty(&report).unwrap_or_default();
            info!("shutdown report:\n{}", json);
            info!("server stats:\n{}", handle.stats_json());
        }
        Err(e) => {
            error!(error = %e, "server error");
            std::process::exit(1);
        }
    }
}
