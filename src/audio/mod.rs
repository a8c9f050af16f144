// Module audio - clocks and the metronome click output (CPAL)

pub mod click;
pub mod engine;
pub mod timing;

pub use click::{ClickKind, ClickPlayer, ClickSound, SilentPlayer};
pub use engine::{ClickEngine, ClickTrigger};
pub use timing::{Clock, ManualClock, Millis, SystemClock, format_timestamp};
