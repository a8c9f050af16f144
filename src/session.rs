// Session - the periodic poller
//
// Each tick moves events from the source into the sequencer, which in turn
// hands ding times to the metronome. Device detection is retried with
// backoff until the source is ready.

use crate::audio::click::ClickPlayer;
use crate::audio::timing::{Clock, Millis};
use crate::config::{MetronomeSettings, SessionConfig};
use crate::connection::reconnect::ReconnectionStrategy;
use crate::error::SessionError;
use crate::midi::source::{EventSource, create_source};
use crate::sequencer::metronome::MetronomeScheduler;
use crate::sequencer::tracker::MeasureSequencer;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Session {
    source: Box<dyn EventSource>,
    sequencer: MeasureSequencer,
    metronome: Arc<MetronomeScheduler>,
    clock: Arc<dyn Clock>,
    reconnect: ReconnectionStrategy,
    /// Monotonic time of the next detection attempt; `None` when none is due
    next_attempt: Option<Millis>,
    paused: bool,
}

impl Session {
    /// Session with a metronome worker thread, sounding through `player`
    pub fn new(
        config: &SessionConfig,
        clock: Arc<dyn Clock>,
        player: Arc<dyn ClickPlayer>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let timing = config.timing()?;
        let metronome = MetronomeScheduler::new(
            Arc::clone(&clock),
            MetronomeSettings::from_config(config),
            player,
        )?;
        let source = create_source(config, Arc::clone(&clock));
        Ok(Self::with_parts(
            source,
            MeasureSequencer::new(timing),
            Arc::new(metronome),
            clock,
        ))
    }

    pub fn with_parts(
        source: Box<dyn EventSource>,
        mut sequencer: MeasureSequencer,
        metronome: Arc<MetronomeScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        sequencer.register_metronome(metronome.clone());
        let next_attempt = Some(clock.monotonic_now());
        Self {
            source,
            sequencer,
            metronome,
            clock,
            reconnect: ReconnectionStrategy::new(),
            next_attempt,
            paused: false,
        }
    }

    pub fn with_reconnection(mut self, strategy: ReconnectionStrategy) -> Self {
        self.reconnect = strategy;
        self
    }

    /// One poll at wall-clock `now`. Returns the number of measures opened.
    /// A paused session neither advances the timeline nor schedules dings.
    pub fn tick(&mut self, now: Millis) -> usize {
        if self.paused {
            return 0;
        }
        self.ensure_receiving();

        let events = self.source.drain_events();
        let opened = self.sequencer.update(&events, now);

        // The newest measure is still open; the ones before it just closed
        for measure in self.sequencer.measures().iter().rev().skip(1).take(opened) {
            info!(%measure, "measure completed");
        }
        opened
    }

    fn ensure_receiving(&mut self) {
        if !self.source.is_ready() && !self.try_connect() {
            return;
        }
        if self.source.is_receiving() {
            return;
        }
        if let Err(err) = self.source.start() {
            warn!(%err, source = %self.source.name(), "could not start receiving");
        }
    }

    /// Detect-and-connect if an attempt is due. True once the source is ready.
    fn try_connect(&mut self) -> bool {
        let now = self.clock.monotonic_now();
        match self.next_attempt {
            Some(at) if at <= now => {}
            _ => return false,
        }

        match self.source.find_and_connect() {
            Ok(()) => {
                info!(source = %self.source.name(), "event source ready");
                self.reconnect.reset();
                self.next_attempt = Some(now);
                true
            }
            Err(err) => {
                match self.reconnect.next_delay() {
                    Some(delay) => {
                        warn!(
                            %err,
                            attempt = self.reconnect.current_attempt(),
                            retry_in_ms = delay.as_millis() as u64,
                            "event source not available"
                        );
                        self.next_attempt = Some(now + delay.as_millis() as Millis);
                    }
                    None => {
                        warn!(%err, "giving up on event source; running without input");
                        self.next_attempt = None;
                    }
                }
                false
            }
        }
    }

    /// Stop receiving and silence every pending ding
    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.source.stop();
        let cancelled = self.metronome.cancel_all();
        info!(cancelled, "session paused");
    }

    /// Receive again from the next tick on
    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        if self.next_attempt.is_none() {
            // A resume is a fresh chance to find the device
            self.reconnect.reset();
            self.next_attempt = Some(self.clock.monotonic_now());
        }
        info!("session resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn sequencer(&self) -> &MeasureSequencer {
        &self.sequencer
    }

    pub fn metronome(&self) -> &MetronomeScheduler {
        &self.metronome
    }

    pub fn source(&self) -> &dyn EventSource {
        self.source.as_ref()
    }
}
