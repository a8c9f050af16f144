// Measure - one fixed-duration window of notes
//
// Positions inside a measure are kept in beats rather than milliseconds so a
// measure's geometry is self-contained. Notes still held when the window
// closes are force-released at `beat_count` here and re-opened at beat 0 in
// the successor measure.

use crate::audio::timing::Millis;
use crate::error::{MeasureError, ProtocolViolation};
use crate::midi::event::{NoteEvent, NoteKind};
use crate::sequencer::velocity::VelocityCurve;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureState {
    Active,
    /// Terminal: no further events, every note released
    Completed,
}

/// A note within one measure
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub start_beat: f32,
    /// Only meaningful once `held` is false
    pub end_beat: f32,
    /// Perceptual loudness in [0, 1]
    pub level: f32,
    pub key: u8,
    pub held: bool,
}

impl Note {
    /// A note whose release has not been seen yet
    pub fn held(start_beat: f32, key: u8, level: f32) -> Self {
        Self {
            start_beat,
            end_beat: start_beat,
            level,
            key,
            held: true,
        }
    }

    pub fn released(start_beat: f32, end_beat: f32, key: u8, level: f32) -> Self {
        Self {
            start_beat,
            end_beat,
            level,
            key,
            held: false,
        }
    }

    /// End of the note as it should be drawn at `now`. Held notes extend to
    /// the current time, which may lie past the end of the measure.
    pub fn current_end_beat(&self, measure: &Measure, now: Millis) -> f32 {
        if self.held {
            measure.beat_for_time(now)
        } else {
            self.end_beat
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.2}-{:.2} {} {:.2}",
            self.start_beat, self.end_beat, self.key, self.level
        )?;
        if self.held {
            write!(f, " h")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone)]
pub struct Measure {
    start_time: Millis,
    end_time: Millis,
    beat_count: u32,
    state: MeasureState,
    notes: Vec<Note>,
    // key -> index into `notes`; at most one open note per key
    held: BTreeMap<u8, usize>,
}

impl Measure {
    /// A measure covering `[start_time, start_time + duration)`.
    /// `active == false` yields an already-completed, empty measure.
    pub fn new(start_time: Millis, duration: Millis, beat_count: u32, active: bool) -> Self {
        Self {
            start_time,
            end_time: start_time + duration,
            beat_count,
            state: if active {
                MeasureState::Active
            } else {
                MeasureState::Completed
            },
            notes: Vec::new(),
            held: BTreeMap::new(),
        }
    }

    /// The measure immediately following `previous`, with every note still
    /// held in `previous` re-opened at beat 0.
    ///
    /// Must run before `previous.complete()`, which releases those notes.
    pub fn from_predecessor(previous: &Measure) -> Self {
        let mut next = Self::new(
            previous.end_time,
            previous.duration(),
            previous.beat_count,
            true,
        );
        for note in previous.held_notes() {
            next.open_note(Note::held(0.0, note.key, note.level));
        }
        next
    }

    /// Close this measure and return its successor, carrying held notes over
    /// before they are force-released here.
    pub fn roll_over(&mut self) -> Result<Measure, MeasureError> {
        if self.state == MeasureState::Completed {
            return Err(MeasureError::Completed);
        }
        let next = Self::from_predecessor(self);
        self.complete()?;
        Ok(next)
    }

    /// Position of `time` in beats. Not clamped to `[0, beat_count]`.
    pub fn beat_for_time(&self, time: Millis) -> f32 {
        let elapsed = (time - self.start_time) as f64;
        let duration = (self.end_time - self.start_time) as f64;
        (elapsed / duration * self.beat_count as f64) as f32
    }

    /// Apply a note event that falls inside this measure
    pub fn ingest(&mut self, event: &NoteEvent, curve: &VelocityCurve) -> Result<(), MeasureError> {
        if self.state == MeasureState::Completed {
            return Err(MeasureError::Completed);
        }
        match event.kind {
            NoteKind::On => {
                if self.held.contains_key(&event.key) {
                    return Err(ProtocolViolation::AlreadyHeld(event.key).into());
                }
                let level = curve.level_of(i32::from(event.intensity));
                let start_beat = self.beat_for_time(event.timestamp);
                self.open_note(Note::held(start_beat, event.key, level));
            }
            NoteKind::Off => {
                let index = self
                    .held
                    .remove(&event.key)
                    .ok_or(ProtocolViolation::NotHeld(event.key))?;
                let end_beat = self.beat_for_time(event.timestamp);
                let note = &mut self.notes[index];
                note.end_beat = end_beat;
                note.held = false;
            }
        }
        Ok(())
    }

    /// Beat timestamps from start to end inclusive (`beat_count + 1` values).
    /// Each is computed from the start directly so rounding never accumulates.
    pub fn ding_times(&self) -> Vec<Millis> {
        let duration = self.duration();
        let beats = self.beat_count as Millis;
        (0..=beats)
            .map(|n| self.start_time + duration * n / beats)
            .collect()
    }

    /// Release every held note at the end of the measure and close it.
    /// A second call is rejected.
    pub fn complete(&mut self) -> Result<(), MeasureError> {
        if self.state == MeasureState::Completed {
            return Err(MeasureError::Completed);
        }
        let end_beat = self.beat_count as f32;
        for index in std::mem::take(&mut self.held).into_values() {
            let note = &mut self.notes[index];
            note.end_beat = end_beat;
            note.held = false;
        }
        self.state = MeasureState::Completed;
        Ok(())
    }

    fn open_note(&mut self, note: Note) {
        self.held.insert(note.key, self.notes.len());
        self.notes.push(note);
    }

    pub fn start_time(&self) -> Millis {
        self.start_time
    }

    pub fn end_time(&self) -> Millis {
        self.end_time
    }

    pub fn duration(&self) -> Millis {
        self.end_time - self.start_time
    }

    pub fn beat_count(&self) -> u32 {
        self.beat_count
    }

    pub fn state(&self) -> MeasureState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == MeasureState::Active
    }

    /// Every note in order of appearance, carried-over notes first
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Currently held notes, ordered by key
    pub fn held_notes(&self) -> impl Iterator<Item = &Note> + '_ {
        self.held.values().map(move |&index| &self.notes[index])
    }

    pub fn held_note(&self, key: u8) -> Option<&Note> {
        self.held.get(&key).map(|&index| &self.notes[index])
    }

    pub fn contains(&self, time: Millis) -> bool {
        time >= self.start_time && time < self.end_time
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for note in &self.notes {
            write!(f, "{} ", note)?;
        }
        write!(f, "Held:")?;
        for key in self.held.keys() {
            write!(f, " {}", key)?;
        }
        write!(f, "]")
    }
}
