pub mod connect;
pub mod dispatch;
pub mod http_vehicle;
pub mod mapper;
pub mod pump;
pub mod session;
pub mod vehicle;

pub use connect::{wait_until_connected, ConnectionError};
pub use dispatch::{DispatchStats, SensorDispatcher};
pub use http_vehicle::{vehicle_base_url, HttpVehicleEndpoint, HttpVehicleOptions};
pub use mapper::{ActuationMapper, MapperConfig, RangePolicy, ZeroPitchPolicy};
pub use pump::{UpdatePump, DEFAULT_PUMP_PERIOD};
pub use session::CommandSession;
pub use vehicle::{DetachedVehicle, StagedControls, VehicleEndpoint, VehicleError};

#[cfg(test)]
mod test_support;
