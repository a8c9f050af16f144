// midi_measures - Library exports for the binary, tests and benchmarks

pub mod audio;
pub mod config;
pub mod connection;
pub mod error;
pub mod messaging;
pub mod midi;
pub mod sequencer;
pub mod session;

// Re-export commonly used types for convenience
pub use audio::click::{ClickKind, ClickPlayer, SilentPlayer};
pub use audio::engine::{ClickEngine, ClickTrigger};
pub use audio::timing::{Clock, ManualClock, Millis, SystemClock};
pub use config::{MeasureTiming, MetronomeSettings, SessionConfig, SourceKind};
pub use error::{ConfigError, MeasureError, ProtocolViolation, SessionError, TransportError};
pub use midi::event::{NoteEvent, NoteKind};
pub use midi::source::EventSource;
pub use sequencer::{
    DingSink, Measure, MeasureSequencer, MeasureState, MetronomeScheduler, Note, PendingDing,
    VelocityCurve,
};
pub use session::Session;
