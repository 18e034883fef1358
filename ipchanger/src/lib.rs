//! Privileged network adapter configuration service
//!
//! An unprivileged client sends one JSON request per connection over a local
//! IPC endpoint; the service applies it to a single adapter and answers with
//! one JSON response.
//!
//! - [`listener`]: accept loop, one handler task per connection
//! - [`handler`]: single request/response exchange
//! - [`applier`]: request to adapter mutations, serialized per adapter
//! - [`client`]: probe and request helpers used by the CLI

pub mod applier;
pub mod client;
pub mod config;
pub mod dto;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod listener;
pub mod locks;
pub mod service;
pub mod validation;

use std::sync::Arc;

use netcfg::NetworkConfigurator;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use applier::Applier;
pub use config::Config;
pub use dto::{ConfigurationRequest, ConfigurationResponse};
pub use endpoint::Endpoint;
pub use error::{Result, ServiceError};
pub use listener::Listener;

// =============================================================================
// Tracing Initialization
// =============================================================================

/// Initialize tracing/logging with the given filter level.
///
/// `RUST_LOG` takes precedence. Calling this more than once is harmless.
pub fn init_tracing(filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

// =============================================================================
// Service Entry
// =============================================================================

/// Build the listener described by `config` around `configurator`
pub fn build_listener(config: &Config, configurator: Arc<dyn NetworkConfigurator>) -> Listener {
    let endpoint = Endpoint::from_name(&config.endpoint.name);
    Listener::new(endpoint, Applier::new(configurator), &config.listener)
}

/// Serve with the platform configurator until `shutdown` fires
pub async fn run(config: &Config, shutdown: watch::Receiver<bool>) {
    tracing::info!(
        endpoint = %config.endpoint.name,
        "IP changer service starting"
    );
    build_listener(config, netcfg::system_configurator())
        .run(shutdown)
        .await;
}
