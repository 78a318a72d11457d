use std::time::Duration;

use shared::protocol::ConnectionState;
use thiserror::Error;

use crate::vehicle::VehicleEndpoint;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid vehicle host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },
    #[error("vehicle endpoint not ready after {0:?}")]
    Timeout(Duration),
    #[error("vehicle connection state channel closed")]
    Closed,
}

/// Waits until `endpoint` reports `Connected`. `None` waits indefinitely.
pub async fn wait_until_connected<E>(
    endpoint: &E,
    timeout: Option<Duration>,
) -> Result<(), ConnectionError>
where
    E: VehicleEndpoint + ?Sized,
{
    let mut connection = endpoint.subscribe_connection();
    let ready = async move {
        connection
            .wait_for(|state| *state == ConnectionState::Connected)
            .await
            .map(|_| ())
            .map_err(|_| ConnectionError::Closed)
    };

    match timeout {
        None => ready.await,
        Some(limit) => tokio::time::timeout(limit, ready)
            .await
            .map_err(|_| ConnectionError::Timeout(limit))?,
    }
}

#[cfg(test)]
#[path = "tests/connect_tests.rs"]
mod tests;
