// MIDI side: wire decoding and the note event sources

pub mod event;
pub mod input;
pub mod source;
pub mod synthetic;

pub use event::{NoteEvent, NoteKind};
pub use input::HardwareSource;
pub use source::{EventSource, create_source};
pub use synthetic::SyntheticSource;
