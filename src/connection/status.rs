// Input device status, shared between the poller and the MIDI thread

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Disconnected = 0,
    Connecting = 1,
    /// Device found; events flow once the source is started
    Connected = 2,
    Error = 3,
}

impl From<u8> for DeviceStatus {
    fn from(value: u8) -> Self {
        match value {
            1 => DeviceStatus::Connecting,
            2 => DeviceStatus::Connected,
            3 => DeviceStatus::Error,
            _ => DeviceStatus::Disconnected,
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeviceStatus::Disconnected => "disconnected",
            DeviceStatus::Connecting => "connecting",
            DeviceStatus::Connected => "connected",
            DeviceStatus::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct AtomicDeviceStatus {
    inner: Arc<AtomicU8>,
}

impl AtomicDeviceStatus {
    pub fn new(status: DeviceStatus) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(status as u8)),
        }
    }

    pub fn get(&self) -> DeviceStatus {
        DeviceStatus::from(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, status: DeviceStatus) {
        self.inner.store(status as u8, Ordering::Release);
    }

    /// Needs a new detect-and-connect attempt
    pub fn needs_reconnect(&self) -> bool {
        matches!(
            self.get(),
            DeviceStatus::Disconnected | DeviceStatus::Error
        )
    }
}

impl Default for AtomicDeviceStatus {
    fn default() -> Self {
        Self::new(DeviceStatus::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_between_clones() {
        let status = AtomicDeviceStatus::default();
        let seen_elsewhere = status.clone();
        assert!(seen_elsewhere.needs_reconnect());

        status.set(DeviceStatus::Connected);
        assert_eq!(seen_elsewhere.get(), DeviceStatus::Connected);
        assert!(!seen_elsewhere.needs_reconnect());
    }

    #[test]
    fn test_unknown_value_reads_disconnected() {
        assert_eq!(DeviceStatus::from(42), DeviceStatus::Disconnected);
        assert_eq!(DeviceStatus::Error.to_string(), "error");
    }
}
