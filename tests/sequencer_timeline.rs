//! Timeline tests for the measure sequencer
//!
//! Drives the sequencer the way the poller does, with batches of events and
//! an advancing clock, and checks the resulting measure history.

use midi_measures::{
    DingSink, MeasureSequencer, MeasureTiming, Millis, NoteEvent, NoteKind, VelocityCurve,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingSink {
    dings: Mutex<Vec<(Millis, bool)>>,
}

impl RecordingSink {
    fn take(&self) -> Vec<(Millis, bool)> {
        std::mem::take(&mut *self.dings.lock().unwrap())
    }
}

impl DingSink for RecordingSink {
    fn ding_at(&self, wall_time: Millis, measure_start: bool) {
        self.dings.lock().unwrap().push((wall_time, measure_start));
    }
}

fn sequencer(beats: u32, bpm: u32, keep: usize) -> (MeasureSequencer, Arc<RecordingSink>) {
    let timing = MeasureTiming::new(beats, bpm, keep).unwrap();
    let mut sequencer = MeasureSequencer::new(timing);
    let sink = Arc::new(RecordingSink::default());
    sequencer.register_metronome(sink.clone());
    (sequencer, sink)
}

/// 4/4 at 120 bpm, a key pressed at t=1000 and still held at t=3100
#[test]
fn test_held_note_across_boundary() {
    let (mut seq, sink) = sequencer(4, 120, 12);
    assert_eq!(seq.timing().duration_ms(), 2000);

    let opened = seq.update(&[NoteEvent::note_on(1000, 60, 40)], 1000)
        + seq.update(&[], 3100);
    assert_eq!(opened, 2);

    let measures = seq.measures();
    assert_eq!(measures.len(), 2);

    let first = &measures[0];
    assert!(!first.is_active());
    assert_eq!(first.notes().len(), 1);
    let released = &first.notes()[0];
    assert!(!released.held);
    assert_eq!(released.start_beat, 0.0);
    assert_eq!(released.end_beat, 4.0);

    let second = &measures[1];
    assert!(second.is_active());
    assert_eq!(second.start_time(), first.end_time());
    let carried = second.held_note(60).unwrap();
    assert_eq!(carried.start_beat, 0.0);
    assert_eq!(carried.level, released.level);
    let expected_level = VelocityCurve::default().lookup(40).level();
    assert!((carried.level - expected_level).abs() < 1e-6);

    // First call: the first measure's beats. Second call: only the second
    // measure's beats after its start, bell on the last one.
    assert_eq!(
        sink.take(),
        vec![
            (1500, false),
            (2000, false),
            (2500, false),
            (3000, true),
            (3500, false),
            (4000, false),
            (4500, false),
            (5000, true),
        ]
    );
}

#[test]
fn test_press_and_release_in_one_window() {
    let (mut seq, _sink) = sequencer(4, 120, 12);
    seq.update(&[], 0);
    seq.update(
        &[
            NoteEvent::note_on(500, 64, 90),
            NoteEvent::note_off(1500, 64),
        ],
        1600,
    );

    let notes = seq.latest().unwrap().notes();
    assert_eq!(notes.len(), 1);
    assert!(!notes[0].held);
    assert_eq!(notes[0].start_beat, 1.0);
    assert_eq!(notes[0].end_beat, 3.0);
}

#[test]
fn test_unmatched_release_ignored() {
    let (mut seq, _sink) = sequencer(4, 120, 12);
    seq.update(&[NoteEvent::note_off(10, 60)], 0);
    seq.update(&[NoteEvent::note_off(100, 61)], 200);
    assert!(seq.latest().unwrap().notes().is_empty());
}

#[test]
fn test_history_bounded_and_contiguous() {
    let (mut seq, _sink) = sequencer(3, 90, 5);
    let duration = seq.timing().duration_ms();

    let mut now = 0;
    let mut opened = 0;
    while now < duration * 20 {
        opened += seq.update(&[], now);
        now += 37;
    }

    assert!(opened >= 20);
    let measures = seq.measures();
    assert_eq!(measures.len(), 5);
    for pair in measures.iter().collect::<Vec<_>>().windows(2) {
        assert_eq!(pair[1].start_time(), pair[0].end_time());
    }
    // Only the newest measure is still taking events
    assert_eq!(measures.iter().filter(|m| m.is_active()).count(), 1);
    assert!(measures.back().unwrap().is_active());
}

/// Random playing with irregular polling: every measure stays contiguous,
/// every held key is carried forward and no key is ever held twice.
#[test]
fn test_random_playing_keeps_invariants() {
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..20 {
        let beats = rng.gen_range(1..=7);
        let bpm = rng.gen_range(40..=240);
        let keep = rng.gen_range(1..=8);
        let (mut seq, sink) = sequencer(beats, bpm, keep);

        let mut now: Millis = rng.gen_range(0..100_000);
        seq.update(&[], now);
        let mut held: BTreeSet<u8> = BTreeSet::new();
        let mut last_ding = Millis::MIN;

        for _ in 0..200 {
            let step = rng.gen_range(1..400);
            let mut batch = Vec::new();
            let mut t = now;
            while batch.len() < 4 && t < now + step {
                t += rng.gen_range(1..100);
                // Strictly before the new `now`, so nothing is held back
                if t >= now + step {
                    break;
                }
                let key = rng.gen_range(60..66u8);
                // Deliberately includes repeated presses and stray releases
                if rng.gen_bool(0.5) {
                    batch.push(NoteEvent::note_on(t, key, rng.gen_range(1..=127)));
                } else {
                    batch.push(NoteEvent::note_off(t, key));
                }
            }
            now += step;
            seq.update(&batch, now);

            for event in &batch {
                match event.kind {
                    NoteKind::On => {
                        held.insert(event.key);
                    }
                    NoteKind::Off => {
                        held.remove(&event.key);
                    }
                }
            }

            let measures = seq.measures();
            assert!(measures.len() <= keep);
            for pair in measures.iter().collect::<Vec<_>>().windows(2) {
                assert_eq!(pair[1].start_time(), pair[0].end_time());
                assert!(!pair[0].is_active());
            }

            let latest = measures.back().unwrap();
            assert!(latest.start_time() <= now && now <= latest.end_time());
            let latest_held: BTreeSet<u8> = latest.held_notes().map(|n| n.key).collect();
            assert_eq!(latest_held, held);

            for measure in measures.iter().filter(|m| !m.is_active()) {
                for note in measure.notes() {
                    assert!(!note.held);
                    assert!(note.end_beat >= note.start_beat);
                    assert!(note.end_beat <= measure.beat_count() as f32 + 1e-4);
                }
            }

            for (time, _) in sink.take() {
                assert!(time >= last_ding);
                last_ding = time;
            }
        }
    }
}

#[test]
fn test_late_events_dropped() {
    let (mut seq, _sink) = sequencer(4, 120, 12);
    seq.update(&[], 1000);
    seq.update(&[], 3100);

    // Belongs to the already-closed first measure
    seq.update(&[NoteEvent::note_on(2500, 60, 80)], 3200);
    let measures = seq.measures();
    assert!(measures.iter().all(|m| m.notes().is_empty()));
}
