// Event sources - where note events come from
//
// The session only talks to `EventSource`; whether the notes come from a
// keyboard or from the random generator is decided once, from the config.

use crate::audio::timing::Clock;
use crate::config::{SessionConfig, SourceKind};
use crate::error::TransportError;
use crate::midi::event::NoteEvent;
use crate::midi::input::HardwareSource;
use crate::midi::synthetic::SyntheticSource;
use std::sync::Arc;

pub trait EventSource {
    /// Look for a device and prepare to receive from it
    fn find_and_connect(&mut self) -> Result<(), TransportError>;

    /// True once `find_and_connect` has succeeded
    fn is_ready(&self) -> bool;

    /// True between `start` and `stop`
    fn is_receiving(&self) -> bool;

    fn start(&mut self) -> Result<(), TransportError>;

    fn stop(&mut self);

    /// Every event received since the previous call, oldest first
    fn drain_events(&mut self) -> Vec<NoteEvent>;

    fn name(&self) -> String;
}

/// Build the source selected by the config
pub fn create_source(config: &SessionConfig, clock: Arc<dyn Clock>) -> Box<dyn EventSource> {
    match config.source {
        SourceKind::Hardware => Box::new(HardwareSource::new(
            config.device_name.clone(),
            config.event_queue_capacity,
            clock,
        )),
        SourceKind::Synthetic => Box::new(SyntheticSource::new(clock)),
    }
}
