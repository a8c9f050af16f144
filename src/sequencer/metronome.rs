// Metronome scheduler - sounds ticks and bells at future wall-clock instants
//
// Ding times arrive in wall-clock milliseconds. The worker thread sleeps
// against the monotonic clock, so each time is shifted by the wall/monotonic
// offset captured when the scheduler is created. Scheduling, firing and
// cancelling all run under one lock over the pending queue.

use crate::audio::click::{ClickKind, ClickPlayer};
use crate::audio::timing::{Clock, Millis, format_timestamp};
use crate::config::MetronomeSettings;
use crate::sequencer::tracker::DingSink;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// A ding waiting for its deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDing {
    pub target_wall_time: Millis,
    /// `target_wall_time` on the monotonic clock
    pub deadline: Millis,
    /// Tick plus bell when true, tick only otherwise
    pub measure_start: bool,
}

#[derive(Debug, Default)]
struct SchedulerState {
    // In arrival order; callers schedule non-decreasing times
    pending: VecDeque<PendingDing>,
    fired: u64,
    shutdown: bool,
}

struct Shared {
    state: Mutex<SchedulerState>,
    wake: Condvar,
    clock: Arc<dyn Clock>,
    settings: MetronomeSettings,
    player: Arc<dyn ClickPlayer>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fire every pending ding whose deadline has passed. Caller holds the lock.
    fn fire_due(&self, state: &mut SchedulerState, now: Millis) -> usize {
        let mut fired = 0;
        while let Some(ding) = state.pending.front().copied() {
            if ding.deadline > now {
                break;
            }
            state.pending.pop_front();
            self.fire(&ding);
            fired += 1;
        }
        state.fired += fired as u64;
        fired
    }

    fn fire(&self, ding: &PendingDing) {
        trace!(
            at = %format_timestamp(ding.target_wall_time),
            measure_start = ding.measure_start,
            "ding"
        );
        // Tick on every ding, bell layered on top at a measure start
        self.player.play(ClickKind::Tick, self.settings.tick_volume());
        if ding.measure_start && self.settings.bell_on() {
            self.player.play(ClickKind::Bell, self.settings.bell_volume());
        }
    }
}

pub struct MetronomeScheduler {
    shared: Arc<Shared>,
    /// wall clock minus monotonic clock at construction
    offset: Millis,
    worker: Option<JoinHandle<()>>,
}

impl MetronomeScheduler {
    /// Scheduler with a dedicated timer thread firing dings at their deadlines
    pub fn new(
        clock: Arc<dyn Clock>,
        settings: MetronomeSettings,
        player: Arc<dyn ClickPlayer>,
    ) -> io::Result<Self> {
        let mut scheduler = Self::manual(clock, settings, player);
        let shared = Arc::clone(&scheduler.shared);
        let worker = thread::Builder::new()
            .name("metronome".to_string())
            .spawn(move || Self::run_worker(shared))?;
        scheduler.worker = Some(worker);
        Ok(scheduler)
    }

    /// Scheduler without a timer thread; dings fire only through `fire_due`.
    /// For hosts that drive their own timing loop, and for tests.
    pub fn manual(
        clock: Arc<dyn Clock>,
        settings: MetronomeSettings,
        player: Arc<dyn ClickPlayer>,
    ) -> Self {
        let offset = clock.wall_now() - clock.monotonic_now();
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedulerState::default()),
                wake: Condvar::new(),
                clock,
                settings,
                player,
            }),
            offset,
            worker: None,
        }
    }

    fn run_worker(shared: Arc<Shared>) {
        let mut state = shared.lock();
        loop {
            if state.shutdown {
                break;
            }
            let now = shared.clock.monotonic_now();
            shared.fire_due(&mut state, now);

            let next_deadline = state.pending.front().map(|ding| ding.deadline);
            state = match next_deadline {
                Some(deadline) => {
                    let wait = Duration::from_millis((deadline - now).max(1) as u64);
                    shared
                        .wake
                        .wait_timeout(state, wait)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|poisoned| poisoned.into_inner().0)
                }
                None => shared
                    .wake
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
        debug!("metronome worker stopped");
    }

    /// Sound a ding at `wall_time`. Does nothing while the metronome is
    /// switched off; the bell setting is checked later, when the ding fires.
    /// A time already in the past fires on the next worker pass.
    pub fn schedule_at(&self, wall_time: Millis, measure_start: bool) {
        if !self.shared.settings.metronome_on() {
            return;
        }
        let ding = PendingDing {
            target_wall_time: wall_time,
            deadline: wall_time - self.offset,
            measure_start,
        };

        let mut state = self.shared.lock();
        if let Some(last) = state.pending.back() {
            if ding.deadline < last.deadline {
                warn!(
                    at = %format_timestamp(wall_time),
                    "ding scheduled before an earlier pending ding; it will wait its turn"
                );
            }
        }
        state.pending.push_back(ding);
        drop(state);
        self.shared.wake.notify_one();
    }

    /// Drop every ding that has not fired yet. Returns how many were dropped.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.shared.lock();
        let dropped = state.pending.len();
        state.pending.clear();
        drop(state);
        self.shared.wake.notify_one();
        if dropped > 0 {
            debug!(dropped, "pending dings cancelled");
        }
        dropped
    }

    /// Fire whatever is due on the monotonic clock now
    pub fn fire_due(&self) -> usize {
        let now = self.shared.clock.monotonic_now();
        let mut state = self.shared.lock();
        self.shared.fire_due(&mut state, now)
    }

    pub fn pending(&self) -> Vec<PendingDing> {
        self.shared.lock().pending.iter().copied().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Dings fired since creation
    pub fn fired_count(&self) -> u64 {
        self.shared.lock().fired
    }

    pub fn offset(&self) -> Millis {
        self.offset
    }

    pub fn settings(&self) -> &MetronomeSettings {
        &self.shared.settings
    }
}

impl DingSink for MetronomeScheduler {
    fn ding_at(&self, wall_time: Millis, measure_start: bool) {
        self.schedule_at(wall_time, measure_start);
    }
}

impl Drop for MetronomeScheduler {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.shared.lock().shutdown = true;
            self.shared.wake.notify_all();
            let _ = worker.join();
        }
    }
}
