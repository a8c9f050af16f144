// Synthetic source - random playing for demos and tests without a keyboard

use crate::audio::timing::{Clock, Millis};
use crate::error::TransportError;
use crate::midi::event::NoteEvent;
use crate::midi::source::EventSource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info};

/// Gap between generated events, ms
const GAP_MS: Range<Millis> = 200..1000;
/// Two octaves from E4
const KEYS: Range<u8> = 0x40..0x58;
const INTENSITY: Range<u8> = 0x20..0x70;

pub struct SyntheticSource {
    clock: Arc<dyn Clock>,
    rng: StdRng,
    held: Vec<u8>,
    /// Wall time of the next event to generate; `None` while stopped
    next_event: Option<Millis>,
}

impl SyntheticSource {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_rng(clock, StdRng::from_entropy())
    }

    /// Reproducible playing
    pub fn seeded(clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self::with_rng(clock, StdRng::seed_from_u64(seed))
    }

    fn with_rng(clock: Arc<dyn Clock>, rng: StdRng) -> Self {
        Self {
            clock,
            rng,
            held: Vec::new(),
            next_event: None,
        }
    }

    pub fn held_keys(&self) -> &[u8] {
        &self.held
    }

    fn next_gap(&mut self) -> Millis {
        self.rng.gen_range(GAP_MS)
    }

    /// Strike a new key with probability 1/(held + 1), otherwise release one
    fn generate(&mut self, timestamp: Millis) -> NoteEvent {
        let strike = self.rng.gen_bool(1.0 / (self.held.len() as f64 + 1.0));
        let free: Vec<u8> = KEYS.filter(|key| !self.held.contains(key)).collect();

        if (strike || self.held.is_empty()) && !free.is_empty() {
            let key = free[self.rng.gen_range(0..free.len())];
            let intensity = self.rng.gen_range(INTENSITY);
            self.held.push(key);
            NoteEvent::note_on(timestamp, key, intensity)
        } else {
            let index = self.rng.gen_range(0..self.held.len());
            let key = self.held.swap_remove(index);
            NoteEvent::note_off(timestamp, key)
        }
    }
}

impl EventSource for SyntheticSource {
    fn find_and_connect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn is_receiving(&self) -> bool {
        self.next_event.is_some()
    }

    fn start(&mut self) -> Result<(), TransportError> {
        if self.next_event.is_none() {
            let first = self.clock.wall_now() + self.next_gap();
            self.next_event = Some(first);
            info!("synthetic source started");
        }
        Ok(())
    }

    fn stop(&mut self) {
        if self.next_event.take().is_some() {
            // Keys stay held; whatever consumes the events sees them carried over
            debug!(held = self.held.len(), "synthetic source stopped");
        }
    }

    fn drain_events(&mut self) -> Vec<NoteEvent> {
        let now = self.clock.wall_now();
        let mut events = Vec::new();
        while let Some(at) = self.next_event {
            if at > now {
                break;
            }
            events.push(self.generate(at));
            self.next_event = Some(at + self.next_gap());
        }
        events
    }

    fn name(&self) -> String {
        "synthetic".to_string()
    }
}
