use crate::api::SimVehicle;
use shared::protocol::VehicleEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub vehicle: SimVehicle,
    pub events: broadcast::Sender<VehicleEvent>,
}

impl AppState {
    pub fn new(vehicle: SimVehicle) -> Self {
        let (events, _) = broadcast::channel(256);
        Self { vehicle, events }
    }
}
