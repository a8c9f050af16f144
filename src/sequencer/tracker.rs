// Measure sequencer - windows the live note stream into contiguous measures
//
// Called once per poll with the events received since the previous poll and
// the current wall-clock time. Single-threaded: nothing else touches the
// measures while `update` runs.

use crate::audio::timing::{Millis, format_timestamp};
use crate::config::MeasureTiming;
use crate::error::MeasureError;
use crate::midi::event::NoteEvent;
use crate::sequencer::measure::Measure;
use crate::sequencer::velocity::VelocityCurve;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Receiver of metronome ding times, in wall-clock milliseconds
pub trait DingSink: Send + Sync {
    /// Callers pass non-decreasing `wall_time` across calls
    fn ding_at(&self, wall_time: Millis, measure_start: bool);
}

pub struct MeasureSequencer {
    timing: MeasureTiming,
    curve: VelocityCurve,
    /// Oldest first, bounded by `timing.measures_to_keep()`
    measures: VecDeque<Measure>,
    /// Events past the end of the latest measure, held for the next update
    deferred: Vec<NoteEvent>,
    metronome: Option<Arc<dyn DingSink>>,
}

impl MeasureSequencer {
    pub fn new(timing: MeasureTiming) -> Self {
        Self::with_curve(timing, VelocityCurve::default())
    }

    pub fn with_curve(timing: MeasureTiming, curve: VelocityCurve) -> Self {
        Self {
            timing,
            curve,
            measures: VecDeque::with_capacity(timing.measures_to_keep() + 1),
            deferred: Vec::new(),
            metronome: None,
        }
    }

    /// Register where ding times for newly opened measures are sent
    pub fn register_metronome(&mut self, metronome: Arc<dyn DingSink>) {
        self.metronome = Some(metronome);
    }

    /// Feed `events` (chronological) and advance the timeline to `now`.
    /// Returns the number of measures opened by this call.
    pub fn update(&mut self, events: &[NoteEvent], now: Millis) -> usize {
        let mut new_measures = 0;

        if self.measures.is_empty() {
            self.measures.push_back(Measure::new(
                now,
                self.timing.duration_ms(),
                self.timing.beats_per_measure(),
                true,
            ));
            new_measures += 1;
            debug!(start = %format_timestamp(now), "first measure opened");
        }

        let deferred = std::mem::take(&mut self.deferred);
        let mut pending = deferred.iter().chain(events.iter()).peekable();

        while let Some(latest) = self.measures.back_mut() {
            Self::dispatch(latest, &self.curve, &mut pending);

            if latest.end_time() >= now {
                break;
            }

            match latest.roll_over() {
                Ok(next) => {
                    debug!(measure = %latest, "measure completed");
                    self.measures.push_back(next);
                    new_measures += 1;
                }
                Err(err) => {
                    // Only the latest measure is ever active, so this means
                    // the sequence was corrupted; stop advancing this poll.
                    error!(%err, "cannot roll over latest measure");
                    break;
                }
            }
        }

        // Events at or beyond the end of the still-open latest measure. Only
        // the window right after it is held; anything further out is bogus.
        let horizon = self
            .measures
            .back()
            .map_or(now, |latest| latest.end_time())
            + self.timing.duration_ms();
        for event in pending {
            if event.timestamp < horizon {
                self.deferred.push(*event);
            } else {
                warn!(
                    event = %event,
                    horizon = %format_timestamp(horizon),
                    "event too far in the future, dropped"
                );
            }
        }

        if new_measures > 0 {
            self.send_ding_times();
        }

        self.drop_expired_measures();
        new_measures
    }

    /// Ingest events into `measure` until one falls past its end.
    /// Events earlier than the measure's start are dropped as late.
    fn dispatch<'a, I>(
        measure: &mut Measure,
        curve: &VelocityCurve,
        events: &mut std::iter::Peekable<I>,
    ) where
        I: Iterator<Item = &'a NoteEvent>,
    {
        while let Some(event) = events.peek() {
            if event.timestamp >= measure.end_time() {
                return;
            }
            if event.timestamp < measure.start_time() {
                warn!(
                    event = %event,
                    measure_start = %format_timestamp(measure.start_time()),
                    "late event dropped"
                );
            } else if let Err(err) = measure.ingest(event, curve) {
                match err {
                    MeasureError::Protocol(violation) => {
                        warn!(event = %event, %violation, "protocol violation, event dropped");
                    }
                    MeasureError::Completed => {
                        error!(event = %event, "event routed to a completed measure");
                    }
                }
            }
            events.next();
        }
    }

    /// Forward the latest measure's beats after its start. Windows that
    /// elapsed between polls are skipped: their beats are already past.
    fn send_ding_times(&self) {
        let Some(metronome) = &self.metronome else {
            debug!("no metronome registered");
            return;
        };
        let Some(latest) = self.measures.back() else {
            return;
        };

        let times = latest.ding_times();
        let last = times.len() - 1;
        for (n, &time) in times.iter().enumerate().skip(1) {
            metronome.ding_at(time, n == last);
        }
    }

    fn drop_expired_measures(&mut self) {
        let excess = self
            .measures
            .len()
            .saturating_sub(self.timing.measures_to_keep());
        self.measures.drain(..excess);
    }

    /// Retained measures, oldest first
    pub fn measures(&self) -> &VecDeque<Measure> {
        &self.measures
    }

    pub fn latest(&self) -> Option<&Measure> {
        self.measures.back()
    }

    pub fn timing(&self) -> &MeasureTiming {
        &self.timing
    }

    pub fn curve(&self) -> &VelocityCurve {
        &self.curve
    }

    /// Events received ahead of the current window
    pub fn deferred_events(&self) -> &[NoteEvent] {
        &self.deferred
    }
}
