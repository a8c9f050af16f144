// Clock domains for measure timing and metronome scheduling
//
// Measures and note events are stamped in wall-clock milliseconds (Unix epoch).
// The metronome worker sleeps against a monotonic clock, which never jumps when
// the system time is adjusted. The two are related by an offset captured once.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Milliseconds. Wall-clock values count from the Unix epoch, monotonic values
/// from an arbitrary per-clock origin.
pub type Millis = i64;

/// Source of "now" in both clock domains
pub trait Clock: Send + Sync {
    /// Current wall-clock time
    fn wall_now(&self) -> Millis;

    /// Current monotonic execution-clock time
    fn monotonic_now(&self) -> Millis;
}

/// Real clocks: `SystemTime` for wall time, `Instant` for monotonic time
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn wall_now(&self) -> Millis {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Millis
    }

    fn monotonic_now(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

/// Hand-driven clock for deterministic tests and simulations.
/// Clones share the same time; both domains advance together.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    wall: Arc<AtomicI64>,
    monotonic: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(wall: Millis, monotonic: Millis) -> Self {
        Self {
            wall: Arc::new(AtomicI64::new(wall)),
            monotonic: Arc::new(AtomicI64::new(monotonic)),
        }
    }

    /// Advance both domains by `ms`
    pub fn advance(&self, ms: Millis) {
        self.wall.fetch_add(ms, Ordering::SeqCst);
        self.monotonic.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump the wall clock only (e.g. an NTP correction); monotonic time is unaffected
    pub fn set_wall(&self, wall: Millis) {
        self.wall.store(wall, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn wall_now(&self) -> Millis {
        self.wall.load(Ordering::SeqCst)
    }

    fn monotonic_now(&self) -> Millis {
        self.monotonic.load(Ordering::SeqCst)
    }
}

/// Render a wall-clock timestamp as local `HH:MM:SS.mmm` for log lines
pub fn format_timestamp(timestamp: Millis) -> String {
    match chrono::DateTime::from_timestamp_millis(timestamp) {
        Some(utc) => utc
            .with_timezone(&chrono::Local)
            .format("%H:%M:%S%.3f")
            .to_string(),
        None => format!("{}ms", timestamp),
    }
}
