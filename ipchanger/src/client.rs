//! Client side of the service protocol

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::dto::{ConfigurationRequest, ConfigurationResponse};
use crate::endpoint::{ClientStream, Endpoint};
use crate::error::{Result, ServiceError};

/// Connect timeout used for liveness checks
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Connect timeout used when applying a configuration
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

async fn open(endpoint: &Endpoint, timeout: Duration) -> Result<ClientStream> {
    match tokio::time::timeout(timeout, endpoint.connect()).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(ServiceError::Unreachable {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(ServiceError::Unreachable {
            endpoint: endpoint.to_string(),
            reason: format!("connect timed out after {} ms", timeout.as_millis()),
        }),
    }
}

/// True if the service accepts a connection within `timeout`.
///
/// Nothing is sent; the service treats the empty connection as a no-op.
pub async fn probe(endpoint: &Endpoint, timeout: Duration) -> bool {
    open(endpoint, timeout).await.is_ok()
}

/// Send one request and wait for its response.
///
/// `timeout` bounds the connect only; applying a change may legitimately take
/// longer while the OS reconfigures the adapter.
pub async fn send_request(
    endpoint: &Endpoint,
    request: &ConfigurationRequest,
    timeout: Duration,
) -> Result<ConfigurationResponse> {
    let stream = open(endpoint, timeout).await?;
    let mut stream = BufReader::new(stream);

    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    stream.write_all(line.as_bytes()).await?;
    stream.flush().await?;

    let mut reply = String::new();
    if stream.read_line(&mut reply).await? == 0 {
        return Err(ServiceError::NoResponse);
    }

    Ok(serde_json::from_str(reply.trim_end())?)
}
