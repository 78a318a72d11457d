use super::*;
use shared::domain::{GearDirection, Gesture, TurnSignal};

#[tokio::test]
async fn starts_parked_in_neutral() {
    let session = CommandSession::new(ActuationMapper::default());
    assert_eq!(session.snapshot().await, VehicleCommandState::default());
}

#[tokio::test]
async fn clones_share_one_state() {
    let session = CommandSession::new(ActuationMapper::default());
    let pump_view = session.clone();

    session
        .handle_gesture(GestureEvent::new(Gesture::WaveOut, Arm::Left))
        .await;

    assert_eq!(pump_view.snapshot().await.gear, GearDirection::Backward);
}

#[tokio::test]
async fn handlers_return_post_update_snapshot() {
    let session = CommandSession::new(ActuationMapper::default());
    let after = session
        .handle_orientation(OrientationSample::new(-0.2, 0.0), Arm::Right)
        .await;
    assert!(after.brake > 0.0);
    assert_eq!(after.throttle, 0.0);
    assert_eq!(session.snapshot().await, after);
}

#[tokio::test]
async fn initial_unknown_gear_steps_like_neutral() {
    let session = CommandSession::with_state(
        ActuationMapper::default(),
        VehicleCommandState {
            gear: GearDirection::Unknown,
            ..VehicleCommandState::default()
        },
    );
    let after = session
        .handle_gesture(GestureEvent::new(Gesture::WaveIn, Arm::Right))
        .await;
    assert_eq!(after.gear, GearDirection::Forward);
}

#[tokio::test]
async fn concurrent_arms_keep_throttle_and_brake_exclusive() {
    let session = CommandSession::new(ActuationMapper::default());

    let mut tasks = Vec::new();
    for i in 0..64 {
        let session = session.clone();
        tasks.push(tokio::spawn(async move {
            let pitch = if i % 2 == 0 { 0.2 } else { -0.2 };
            session
                .handle_orientation(OrientationSample::new(pitch, 0.1), Arm::Right)
                .await;
            session
                .handle_orientation(OrientationSample::new(0.0, pitch), Arm::Left)
                .await;
            session
                .handle_gesture(GestureEvent::new(Gesture::Fist, Arm::Left))
                .await
        }));
    }

    for task in tasks {
        let state = task.await.expect("task");
        assert!(state.throttle == 0.0 || state.brake == 0.0);
    }

    let final_state = session.snapshot().await;
    assert!(final_state.throttle == 0.0 || final_state.brake == 0.0);
    assert_eq!(final_state.turn_signal, TurnSignal::Off, "64 toggles end off");
}
