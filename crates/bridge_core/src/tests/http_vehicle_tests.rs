use super::*;
use crate::connect::wait_until_connected;
use std::sync::atomic::AtomicBool;
use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use shared::{
    domain::VehicleCommandState,
    error::ErrorCode,
};
use tokio::{net::TcpListener, sync::Mutex as AsyncMutex};

#[derive(Clone, Default)]
struct SimState {
    received: Arc<AsyncMutex<Vec<VehicleCommandState>>>,
}

async fn spawn_sim(reject_updates: bool) -> (String, SimState, JoinHandle<()>) {
    let state = SimState::default();
    let update = if reject_updates {
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiError::new(ErrorCode::Validation, "steering must be finite")),
            )
        })
    } else {
        post(
            |State(state): State<SimState>, Json(body): Json<VehicleCommandState>| async move {
                state.received.lock().await.push(body);
                StatusCode::OK
            },
        )
    };
    let app = Router::new()
        .route(HEALTHZ_ROUTE, get(|| async { "ok" }))
        .route(VEHICLE_UPDATE_ROUTE, update)
        .route(
            VEHICLE_STATUS_ROUTE,
            get(|State(state): State<SimState>| async move {
                let received = state.received.lock().await;
                Json(VehicleStatus {
                    state: received.last().copied().unwrap_or_default(),
                    updates_received: received.len() as u64,
                    last_update_at: None,
                })
            }),
        )
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("127.0.0.1:{}", addr.port()), state, server)
}

fn fast_options() -> HttpVehicleOptions {
    HttpVehicleOptions {
        probe_initial_backoff: Duration::from_millis(10),
        probe_max_backoff: Duration::from_millis(40),
        request_timeout: Duration::from_millis(500),
    }
}

#[test]
fn bare_host_gets_default_port() {
    let url = vehicle_base_url("localhost").expect("url");
    assert_eq!(url.as_str(), "http://localhost:8470/");
}

#[test]
fn explicit_port_and_scheme_are_kept() {
    assert_eq!(
        vehicle_base_url("10.0.0.5:9000").expect("url").as_str(),
        "http://10.0.0.5:9000/"
    );
    assert_eq!(
        vehicle_base_url("https://sim.local").expect("url").as_str(),
        "https://sim.local/"
    );
}

#[test]
fn ipv6_hosts_respect_explicit_ports() {
    let url = vehicle_base_url("[::1]").expect("url");
    assert_eq!(url.port(), Some(8470));
    assert_eq!(url.as_str(), "http://[::1]:8470/");

    let url = vehicle_base_url("[::1]:9000").expect("url");
    assert_eq!(url.port(), Some(9000));
}

#[test]
fn explicit_default_http_port_is_not_replaced() {
    let url = vehicle_base_url("sim.local:80").expect("url");
    assert_eq!(url.port_or_known_default(), Some(80));
    assert_eq!(url.as_str(), "http://sim.local/");
}

#[test]
fn rejects_empty_and_non_http_hosts() {
    assert!(matches!(
        vehicle_base_url("  "),
        Err(ConnectionError::InvalidHost { .. })
    ));
    assert!(matches!(
        vehicle_base_url("ftp://sim.local"),
        Err(ConnectionError::InvalidHost { .. })
    ));
}

#[tokio::test]
async fn update_before_connect_is_refused() {
    // Nothing listens on port 9 on loopback.
    let endpoint = HttpVehicleEndpoint::open("127.0.0.1:9", fast_options()).expect("open");
    assert_ne!(endpoint.connection_state(), ConnectionState::Connected);
    assert!(matches!(
        endpoint.update().await,
        Err(VehicleError::NotConnected)
    ));
}

#[tokio::test]
async fn connects_and_pushes_staged_state() {
    let (host, sim, server) = spawn_sim(false).await;
    let endpoint = HttpVehicleEndpoint::open(&host, fast_options()).expect("open");
    wait_until_connected(&endpoint, Some(Duration::from_secs(2)))
        .await
        .expect("connected");

    endpoint.set_throttle(0.3);
    endpoint.set_gear(GearDirection::Forward);
    endpoint.set_turn_signal(TurnSignal::Right);
    endpoint.update().await.expect("update");

    let received = sim.received.lock().await.clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].throttle, 0.3);
    assert_eq!(received[0].gear, GearDirection::Forward);
    assert_eq!(received[0].turn_signal, TurnSignal::Right);
    assert_eq!(endpoint.updates_sent(), 1);

    let status = endpoint.status().await.expect("status");
    assert_eq!(status.updates_received, 1);
    server.abort();
}

#[tokio::test]
async fn rejected_update_surfaces_server_message() {
    let (host, _sim, server) = spawn_sim(true).await;
    let endpoint = HttpVehicleEndpoint::open(&host, fast_options()).expect("open");
    wait_until_connected(&endpoint, Some(Duration::from_secs(2)))
        .await
        .expect("connected");

    match endpoint.update().await {
        Err(VehicleError::Rejected(message)) => assert!(message.contains("steering")),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(endpoint.connection_state(), ConnectionState::Connected);
    server.abort();
}

#[tokio::test]
async fn probe_retries_until_simulator_appears() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let endpoint =
        HttpVehicleEndpoint::open(&format!("127.0.0.1:{}", addr.port()), fast_options())
            .expect("open");
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(
        endpoint.connection_state(),
        ConnectionState::AttemptingConnect
    );

    let listener = TcpListener::bind(addr).await.expect("rebind");
    let app = Router::new().route(HEALTHZ_ROUTE, get(|| async { "ok" }));
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    wait_until_connected(&endpoint, Some(Duration::from_secs(2)))
        .await
        .expect("connected after retry");
    server.abort();
}

#[derive(Clone, Default)]
struct FlakySim {
    unhealthy: Arc<AtomicBool>,
    stalled: Arc<AtomicBool>,
}

async fn spawn_flaky_sim() -> (String, FlakySim, JoinHandle<()>) {
    let sim = FlakySim::default();
    let app = Router::new()
        .route(
            HEALTHZ_ROUTE,
            get(|State(sim): State<FlakySim>| async move {
                if sim.unhealthy.load(Ordering::SeqCst) {
                    StatusCode::SERVICE_UNAVAILABLE
                } else {
                    StatusCode::OK
                }
            }),
        )
        .route(
            VEHICLE_UPDATE_ROUTE,
            post(|State(sim): State<FlakySim>| async move {
                if sim.stalled.load(Ordering::SeqCst) {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                StatusCode::OK
            }),
        )
        .with_state(sim.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("127.0.0.1:{}", addr.port()), sim, server)
}

#[tokio::test]
async fn failed_push_disconnects_and_probe_reconnects() {
    let (host, sim, server) = spawn_flaky_sim().await;
    let endpoint = HttpVehicleEndpoint::open(
        &host,
        HttpVehicleOptions {
            request_timeout: Duration::from_millis(200),
            ..fast_options()
        },
    )
    .expect("open");
    wait_until_connected(&endpoint, Some(Duration::from_secs(2)))
        .await
        .expect("connected");
    endpoint.update().await.expect("first update");

    sim.unhealthy.store(true, Ordering::SeqCst);
    sim.stalled.store(true, Ordering::SeqCst);
    match endpoint.update().await {
        Err(VehicleError::Transport(_)) => {}
        other => panic!("expected transport failure, got {other:?}"),
    }
    assert_ne!(endpoint.connection_state(), ConnectionState::Connected);
    assert!(matches!(
        endpoint.update().await,
        Err(VehicleError::NotConnected)
    ));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_ne!(endpoint.connection_state(), ConnectionState::Connected);

    sim.stalled.store(false, Ordering::SeqCst);
    sim.unhealthy.store(false, Ordering::SeqCst);
    wait_until_connected(&endpoint, Some(Duration::from_secs(2)))
        .await
        .expect("reconnected");
    endpoint.update().await.expect("update after reconnect");
    assert_eq!(endpoint.updates_sent(), 2);
    server.abort();
}
