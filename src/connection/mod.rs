// Input device connection state and retry policy

pub mod reconnect;
pub mod status;

pub use reconnect::ReconnectionStrategy;
pub use status::{AtomicDeviceStatus, DeviceStatus};
