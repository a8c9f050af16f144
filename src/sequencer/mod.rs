// Sequencer module
// Windows the note stream into measures and schedules the metronome against them

pub mod measure;
pub mod metronome;
pub mod tracker;
pub mod velocity;

pub use measure::{Measure, MeasureState, Note};
pub use metronome::{MetronomeScheduler, PendingDing};
pub use tracker::{DingSink, MeasureSequencer};
pub use velocity::{CurveLookup, VelocityCurve};
