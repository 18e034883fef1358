//! Connection handler
//!
//! Owns one accepted connection: reads a single request line, applies it and
//! writes a single response line before closing.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinError;

use crate::applier::Applier;
use crate::dto::{ConfigurationRequest, ConfigurationResponse};

/// Upper bound on a request line
pub const MAX_REQUEST_BYTES: u64 = 64 * 1024;

/// Serve one connection. Failures are logged, never returned.
pub async fn handle_connection<S>(
    stream: S,
    applier: Applier,
    linger: Duration,
    shutdown: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match serve(stream, &applier, linger, shutdown).await {
        Ok(Some(response)) => {
            tracing::debug!(success = response.success, "Response sent");
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Connection aborted"),
    }
}

/// Returns the response written, or `None` if the peer sent nothing.
///
/// Shutdown releases a connection that is still waiting for its request.
/// Once a request has arrived it is applied and answered regardless.
pub async fn serve<S>(
    stream: S,
    applier: &Applier,
    linger: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<Option<ConfigurationResponse>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);
    let mut line = Vec::new();

    let mut limited = (&mut stream).take(MAX_REQUEST_BYTES);
    let read = tokio::select! {
        read = limited.read_until(b'\n', &mut line) => read?,
        // A dropped sender counts as shutdown, as in the listener
        _ = async { drop(shutdown.wait_for(|stop| *stop).await) } => {
            tracing::debug!("Shutting down before a request arrived");
            return Ok(None);
        }
    };

    if read == 0 {
        // Liveness probes connect and disconnect without sending
        tracing::debug!("Connection closed without a request");
        return Ok(None);
    }

    let response = respond(&line, applier).await;

    let mut payload = serde_json::to_string(&response)?;
    payload.push('\n');
    stream.write_all(payload.as_bytes()).await?;
    stream.flush().await?;

    // Give the client time to read before the endpoint goes away
    tokio::time::sleep(linger).await;
    stream.shutdown().await?;

    Ok(Some(response))
}

async fn respond(line: &[u8], applier: &Applier) -> ConfigurationResponse {
    let request = std::str::from_utf8(line)
        .ok()
        .and_then(|text| ConfigurationRequest::parse_line(text.trim_end()));

    let Some(request) = request else {
        tracing::info!("Rejected malformed request");
        return ConfigurationResponse::invalid_request();
    };

    tracing::info!(
        adapter = %request.adapter_id,
        use_dhcp = request.use_dhcp,
        "Processing configuration request"
    );

    match applier.apply(request).await {
        Ok(response) => response,
        Err(e) => {
            let text = fault_text(e);
            tracing::error!(error = %text, "Applier faulted");
            ConfigurationResponse::failure(format!("Error: {}", text))
        }
    }
}

fn fault_text(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }

    let payload = err.into_panic();
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "applier panicked".to_string()
    }
}
