use super::*;
use crate::{mapper::ActuationMapper, test_support::RecordingVehicle};
use shared::domain::{Arm, GearDirection, Gesture, GestureEvent, OrientationSample};

fn session() -> CommandSession {
    CommandSession::new(ActuationMapper::default())
}

#[tokio::test]
async fn first_push_happens_immediately() {
    let vehicle = Arc::new(RecordingVehicle::connected());
    let pump = UpdatePump::start(session(), vehicle.clone(), Duration::from_secs(60));

    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(vehicle.pushes().len(), 1);
    assert_eq!(pump.ticks(), 1);
    pump.stop().await;
}

#[tokio::test]
async fn pushes_repeat_at_the_configured_period() {
    let vehicle = Arc::new(RecordingVehicle::connected());
    let pump = UpdatePump::start(session(), vehicle.clone(), DEFAULT_PUMP_PERIOD);

    tokio::time::sleep(Duration::from_millis(150)).await;
    pump.stop().await;

    assert!(
        vehicle.pushes().len() >= 3,
        "expected several pushes, got {}",
        vehicle.pushes().len()
    );
}

#[tokio::test]
async fn events_between_ticks_coalesce_into_latest_state() {
    let vehicle = Arc::new(RecordingVehicle::connected());
    let session = session();
    let pump = UpdatePump::start(session.clone(), vehicle.clone(), Duration::from_millis(40));

    tokio::time::sleep(Duration::from_millis(10)).await;
    session
        .handle_gesture(GestureEvent::new(Gesture::WaveIn, Arm::Right))
        .await;
    for pitch in [0.05, 0.1, 0.15, 0.2] {
        session
            .handle_orientation(OrientationSample::new(pitch, 0.0), Arm::Right)
            .await;
    }
    let latest = session.snapshot().await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    pump.stop().await;

    let pushes = vehicle.pushes();
    assert_eq!(pushes.first().map(|s| s.gear), Some(GearDirection::Neutral));
    assert_eq!(pushes.last().copied(), Some(latest));
    assert!(
        pushes.iter().all(|s| s.throttle == 0.0 || s.throttle == latest.throttle),
        "intermediate pitches must never be pushed"
    );
}

#[tokio::test]
async fn failures_are_counted_and_pump_keeps_running() {
    let vehicle = Arc::new(RecordingVehicle::connected());
    vehicle.set_failing(true);
    let pump = UpdatePump::start(session(), vehicle.clone(), Duration::from_millis(10));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(pump.failures() >= 2);
    assert!(vehicle.pushes().is_empty());

    vehicle.set_failing(false);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!vehicle.pushes().is_empty());
    assert!(pump.ticks() > pump.failures());
    pump.stop().await;
}

#[tokio::test]
async fn dropping_the_pump_stops_pushes() {
    let vehicle = Arc::new(RecordingVehicle::connected());
    let pump = UpdatePump::start(session(), vehicle.clone(), Duration::from_millis(5));
    tokio::time::sleep(Duration::from_millis(30)).await;
    drop(pump);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let after_drop = vehicle.pushes().len();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(vehicle.pushes().len(), after_drop);
}

#[tokio::test]
async fn zero_period_is_raised_to_minimum() {
    let vehicle = Arc::new(RecordingVehicle::connected());
    let pump = UpdatePump::start(session(), vehicle, Duration::ZERO);
    assert_eq!(pump.period(), Duration::from_millis(1));
    pump.stop().await;
}

#[tokio::test]
async fn fractional_millisecond_period_is_kept_exactly() {
    let vehicle = Arc::new(RecordingVehicle::connected());
    let pump = UpdatePump::start(session(), vehicle, Duration::from_micros(2_500));
    assert_eq!(pump.period(), Duration::from_micros(2_500));
    pump.stop().await;
}
