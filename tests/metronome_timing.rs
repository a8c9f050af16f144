//! Metronome timing tests
//!
//! Runs the scheduler with its real worker thread against the system clock
//! and checks that dings fire close to their wall-clock targets.

use midi_measures::{
    ClickKind, ClickPlayer, Clock, MeasureSequencer, MeasureTiming, MetronomeScheduler,
    MetronomeSettings, Millis, SystemClock,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Records each click with the wall time it was triggered at
struct TimedPlayer {
    clock: SystemClock,
    played: Mutex<Vec<(ClickKind, Millis)>>,
}

impl TimedPlayer {
    fn new(clock: SystemClock) -> Self {
        Self {
            clock,
            played: Mutex::new(Vec::new()),
        }
    }

    fn played(&self) -> Vec<(ClickKind, Millis)> {
        self.played.lock().unwrap().clone()
    }
}

impl ClickPlayer for TimedPlayer {
    fn play(&self, kind: ClickKind, _volume: f32) {
        let at = self.clock.wall_now();
        self.played.lock().unwrap().push((kind, at));
    }
}

fn setup() -> (MetronomeScheduler, SystemClock, Arc<TimedPlayer>, MetronomeSettings) {
    let clock = SystemClock::new();
    let player = Arc::new(TimedPlayer::new(clock.clone()));
    let settings = MetronomeSettings::new(true, true, 1.0, 0.5);
    let scheduler =
        MetronomeScheduler::new(Arc::new(clock.clone()), settings.clone(), player.clone())
            .unwrap();
    (scheduler, clock, player, settings)
}

#[test]
fn test_dings_fire_near_target() {
    let (scheduler, clock, player, _settings) = setup();
    let start = clock.wall_now();
    let targets = [start + 50, start + 100, start + 150];
    scheduler.schedule_at(targets[0], false);
    scheduler.schedule_at(targets[1], false);
    scheduler.schedule_at(targets[2], true);

    thread::sleep(Duration::from_millis(400));

    let played = player.played();
    let kinds: Vec<ClickKind> = played.iter().map(|(kind, _)| *kind).collect();
    assert_eq!(
        kinds,
        vec![
            ClickKind::Tick,
            ClickKind::Tick,
            ClickKind::Tick,
            ClickKind::Bell
        ]
    );

    // Never early; late by a scheduling hiccup at most
    for ((_, at), target) in played.iter().zip(targets.iter()) {
        assert!(*at >= *target - 2, "fired at {} for target {}", at, target);
        assert!(*at - *target < 100, "fired at {} for target {}", at, target);
    }
    assert_eq!(scheduler.pending_count(), 0);
}

#[test]
fn test_past_target_fires_immediately() {
    let (scheduler, clock, player, _settings) = setup();
    scheduler.schedule_at(clock.wall_now() - 5000, false);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(player.played().len(), 1);
}

#[test]
fn test_cancel_all_silences_pending() {
    let (scheduler, clock, player, _settings) = setup();
    let start = clock.wall_now();
    scheduler.schedule_at(start + 150, false);
    scheduler.schedule_at(start + 200, true);

    assert_eq!(scheduler.cancel_all(), 2);
    thread::sleep(Duration::from_millis(350));
    assert!(player.played().is_empty());
}

#[test]
fn test_master_switch_checked_when_scheduling() {
    let (scheduler, clock, player, settings) = setup();
    settings.set_metronome_on(false);
    scheduler.schedule_at(clock.wall_now() + 20, true);
    settings.set_metronome_on(true);

    thread::sleep(Duration::from_millis(150));
    assert!(player.played().is_empty());
}

#[test]
fn test_sequencer_drives_scheduler() {
    let (scheduler, clock, player, _settings) = setup();
    let scheduler = Arc::new(scheduler);

    // 4 beats in 400 ms
    let timing = MeasureTiming::from_duration(400, 4, 4).unwrap();
    let mut sequencer = MeasureSequencer::new(timing);
    sequencer.register_metronome(scheduler.clone());

    sequencer.update(&[], clock.wall_now());
    assert_eq!(scheduler.pending_count(), 4);

    thread::sleep(Duration::from_millis(700));
    let played = player.played();
    let ticks = played.iter().filter(|(k, _)| *k == ClickKind::Tick).count();
    let bells = played.iter().filter(|(k, _)| *k == ClickKind::Bell).count();
    assert_eq!(ticks, 4);
    assert_eq!(bells, 1);
}

#[test]
fn test_drop_stops_worker() {
    let (scheduler, clock, player, _settings) = setup();
    scheduler.schedule_at(clock.wall_now() + 200, false);
    drop(scheduler);

    thread::sleep(Duration::from_millis(300));
    assert!(player.played().is_empty());
}

#[test]
fn test_concurrent_schedule_and_cancel() {
    let (scheduler, clock, player, _settings) = setup();
    let scheduled = AtomicUsize::new(0);
    let cancelled = AtomicUsize::new(0);

    // Near-due dings keep the worker firing while other threads schedule
    // and cancel against the same queue
    thread::scope(|s| {
        for t in 0..4 {
            let scheduler = &scheduler;
            let clock = &clock;
            let scheduled = &scheduled;
            let cancelled = &cancelled;
            s.spawn(move || {
                for i in 0..250 {
                    scheduler.schedule_at(clock.wall_now() + (i % 3) as Millis, i % 4 == 0);
                    scheduled.fetch_add(1, Ordering::Relaxed);
                    if (i + t) % 10 == 0 {
                        cancelled.fetch_add(scheduler.cancel_all(), Ordering::Relaxed);
                    }
                    if i % 50 == 0 {
                        thread::sleep(Duration::from_millis(1));
                    }
                }
            });
        }
    });

    let deadline = Instant::now() + Duration::from_secs(2);
    while scheduler.pending_count() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(scheduler.pending_count(), 0);

    let scheduled = scheduled.load(Ordering::Relaxed);
    let cancelled = cancelled.load(Ordering::Relaxed);
    assert_eq!(scheduled, 1000);
    assert_eq!(scheduler.fired_count() as usize + cancelled, scheduled);

    // Every fired ding sounded exactly one tick
    let ticks = player
        .played()
        .iter()
        .filter(|(kind, _)| *kind == ClickKind::Tick)
        .count();
    assert_eq!(ticks as u64, scheduler.fired_count());
}
