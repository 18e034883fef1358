//! Listener loop
//!
//! Accepts connections on the service endpoint and hands each one to its own
//! handler task. Endpoint and accept failures are logged and retried after a
//! backoff; only the shutdown signal ends the loop.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::applier::Applier;
use crate::config::ListenerConfig;
use crate::endpoint::{Endpoint, EndpointListener};
use crate::handler::handle_connection;

pub struct Listener {
    endpoint: Endpoint,
    applier: Applier,
    retry_backoff: Duration,
    response_linger: Duration,
}

impl Listener {
    pub fn new(endpoint: Endpoint, applier: Applier, config: &ListenerConfig) -> Self {
        Self {
            endpoint,
            applier,
            retry_backoff: config.retry_backoff(),
            response_linger: config.response_linger(),
        }
    }

    /// Run until `shutdown` turns true or its sender is dropped, then wait
    /// for in-flight handlers to finish. Handlers still waiting for a
    /// request are released by the same signal.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut handlers = JoinSet::new();
        let mut listener: Option<EndpointListener> = None;

        tracing::info!(endpoint = %self.endpoint, "Listener starting");

        loop {
            if *shutdown.borrow() {
                break;
            }

            while let Some(finished) = handlers.try_join_next() {
                if let Err(e) = finished {
                    tracing::error!(error = %e, "Connection handler failed");
                }
            }

            if listener.is_none() {
                match self.endpoint.bind() {
                    Ok(bound) => {
                        tracing::info!(endpoint = %self.endpoint, "Waiting for connections");
                        listener = Some(bound);
                    }
                    Err(e) => {
                        tracing::error!(endpoint = %self.endpoint, error = %e, "Failed to create endpoint");
                        if self.backoff(&mut shutdown).await {
                            break;
                        }
                        continue;
                    }
                }
            }

            let Some(active) = listener.as_mut() else {
                continue;
            };

            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = active.accept() => match accepted {
                    Ok(connection) => {
                        tracing::debug!("Client connected");
                        handlers.spawn(handle_connection(
                            connection,
                            self.applier.clone(),
                            self.response_linger,
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                        if self.backoff(&mut shutdown).await {
                            break;
                        }
                    }
                },
            }
        }

        // Stop offering the endpoint before draining
        drop(listener);

        tracing::info!(in_flight = handlers.len(), "Draining connection handlers");
        while let Some(finished) = handlers.join_next().await {
            if let Err(e) = finished {
                tracing::error!(error = %e, "Connection handler failed");
            }
        }
        tracing::info!("Listener stopped");
    }

    /// Sleep for the retry backoff. Returns true if shutdown was requested.
    async fn backoff(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = shutdown.changed() => true,
            _ = tokio::time::sleep(self.retry_backoff) => false,
        }
    }
}
