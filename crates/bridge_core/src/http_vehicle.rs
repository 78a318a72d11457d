use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{GearDirection, TurnSignal},
    error::ApiError,
    protocol::{
        ConnectionState, VehicleStatus, DEFAULT_VEHICLE_PORT, HEALTHZ_ROUTE, VEHICLE_STATUS_ROUTE,
        VEHICLE_UPDATE_ROUTE,
    },
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    connect::ConnectionError,
    vehicle::{StagedControls, VehicleEndpoint, VehicleError},
};

#[derive(Debug, Clone)]
pub struct HttpVehicleOptions {
    pub probe_initial_backoff: Duration,
    pub probe_max_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpVehicleOptions {
    fn default() -> Self {
        Self {
            probe_initial_backoff: Duration::from_millis(100),
            probe_max_backoff: Duration::from_secs(2),
            request_timeout: Duration::from_millis(500),
        }
    }
}

/// Resolves a host identifier (`localhost`, `host:port` or a full URL) to the
/// simulator base URL.
pub fn vehicle_base_url(host: &str) -> Result<Url, ConnectionError> {
    let host = host.trim();
    let invalid = |reason: String| ConnectionError::InvalidHost {
        host: host.to_string(),
        reason,
    };

    if host.is_empty() {
        return Err(invalid("host is empty".into()));
    }

    if host.contains("://") {
        let url = Url::parse(host).map_err(|err| invalid(err.to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        return Ok(url);
    }

    let mut url = Url::parse(&format!("http://{host}")).map_err(|err| invalid(err.to_string()))?;
    if !has_explicit_port(host) {
        url.set_port(Some(DEFAULT_VEHICLE_PORT))
            .map_err(|_| invalid("host cannot carry a port".into()))?;
    }
    Ok(url)
}

/// `url` drops a port equal to the scheme default, so the raw authority decides.
/// Only the part after an IPv6 literal's closing bracket can carry the port.
fn has_explicit_port(host: &str) -> bool {
    let authority = host.split(['/', '?', '#']).next().unwrap_or_default();
    let tail = authority.rsplit(']').next().unwrap_or_default();
    tail.contains(':')
}

/// Vehicle endpoint speaking JSON over HTTP to the simulator.
///
/// Opening never blocks: a background probe polls the health route with
/// exponential backoff and flips the connection state to `Connected` once it
/// answers. A failed push drops back to `Disconnected` and restarts the probe.
pub struct HttpVehicleEndpoint {
    http: Client,
    base_url: Url,
    options: HttpVehicleOptions,
    staged: StagedControls,
    connection: Arc<watch::Sender<ConnectionState>>,
    probe: Mutex<Option<JoinHandle<()>>>,
    updates_sent: AtomicU64,
}

impl HttpVehicleEndpoint {
    /// Must be called inside a tokio runtime.
    pub fn open(host: &str, options: HttpVehicleOptions) -> Result<Self, ConnectionError> {
        let base_url = vehicle_base_url(host)?;
        let http = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|err| ConnectionError::InvalidHost {
                host: host.to_string(),
                reason: err.to_string(),
            })?;
        let (connection, _) = watch::channel(ConnectionState::AttemptingConnect);

        let endpoint = Self {
            http,
            base_url,
            options,
            staged: StagedControls::default(),
            connection: Arc::new(connection),
            probe: Mutex::new(None),
            updates_sent: AtomicU64::new(0),
        };
        info!(url = %endpoint.base_url, "vehicle: connecting");
        endpoint.spawn_probe();
        Ok(endpoint)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn updates_sent(&self) -> u64 {
        self.updates_sent.load(Ordering::Relaxed)
    }

    fn route(&self, path: &str) -> Result<Url, VehicleError> {
        self.base_url
            .join(path)
            .map_err(|err| VehicleError::Transport(err.to_string()))
    }

    fn spawn_probe(&self) {
        let mut probe = self.probe.lock().unwrap_or_else(PoisonError::into_inner);
        if probe.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let health_url = match self.route(HEALTHZ_ROUTE) {
            Ok(url) => url,
            Err(err) => {
                warn!(%err, "vehicle: cannot build health url");
                return;
            }
        };
        let http = self.http.clone();
        let connection = Arc::clone(&self.connection);
        let mut backoff = self.options.probe_initial_backoff;
        let max_backoff = self.options.probe_max_backoff;

        connection.send_replace(ConnectionState::AttemptingConnect);
        *probe = Some(tokio::spawn(async move {
            let mut attempts = 0u32;
            loop {
                attempts += 1;
                let outcome = http
                    .get(health_url.clone())
                    .send()
                    .await
                    .and_then(|res| res.error_for_status());
                match outcome {
                    Ok(_) => {
                        connection.send_replace(ConnectionState::Connected);
                        info!(attempts, url = %health_url, "vehicle: connected");
                        return;
                    }
                    Err(err) => {
                        debug!(attempts, %err, ?backoff, "vehicle: not ready, retrying");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(max_backoff);
                    }
                }
            }
        }));
    }

    fn mark_disconnected(&self, reason: &str) {
        let previous = self.connection.send_replace(ConnectionState::Disconnected);
        if previous == ConnectionState::Connected {
            warn!(reason, "vehicle: connection lost, reconnecting");
        }
        self.spawn_probe();
    }
}

impl Drop for HttpVehicleEndpoint {
    fn drop(&mut self) {
        let probe = self.probe.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = probe.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl VehicleEndpoint for HttpVehicleEndpoint {
    fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    fn set_throttle(&self, value: f32) {
        self.staged.modify(|s| s.throttle = value);
    }

    fn set_brake(&self, value: f32) {
        self.staged.modify(|s| s.brake = value);
    }

    fn set_steering_angle(&self, value: f32) {
        self.staged.modify(|s| s.steering = value);
    }

    fn set_gear(&self, gear: GearDirection) {
        self.staged.modify(|s| s.gear = gear);
    }

    fn set_turn_signal(&self, signal: TurnSignal) {
        self.staged.modify(|s| s.turn_signal = signal);
    }

    async fn update(&self) -> Result<(), VehicleError> {
        if self.connection_state() != ConnectionState::Connected {
            return Err(VehicleError::NotConnected);
        }

        let state = self.staged.snapshot();
        let res = match self
            .http
            .post(self.route(VEHICLE_UPDATE_ROUTE)?)
            .json(&state)
            .send()
            .await
        {
            Ok(res) => res,
            Err(err) => {
                self.mark_disconnected(&err.to_string());
                return Err(VehicleError::Transport(err.to_string()));
            }
        };

        if !res.status().is_success() {
            let status = res.status();
            let message = match res.json::<ApiError>().await {
                Ok(body) => body.message,
                Err(_) => status.to_string(),
            };
            return Err(VehicleError::Rejected(message));
        }

        self.updates_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn status(&self) -> Result<VehicleStatus, VehicleError> {
        let res = self
            .http
            .get(self.route(VEHICLE_STATUS_ROUTE)?)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|err| VehicleError::Transport(err.to_string()))?;
        res.json::<VehicleStatus>()
            .await
            .map_err(|err| VehicleError::Transport(err.to_string()))
    }
}

#[cfg(test)]
#[path = "tests/http_vehicle_tests.rs"]
mod tests;
