// Note events - the only traffic the measure sequencer understands
//
// Wire shape: `[status, key, intensity]`, status high nibble 0x8 (note off)
// or 0x9 (note on), channel nibble ignored. Anything else is rejected here,
// before it reaches the sequencer.

use crate::audio::timing::{Millis, format_timestamp};
use crate::error::ProtocolViolation;
use std::fmt;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    On,
    Off,
}

/// A timestamped note on/off as received from the instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    /// Wall-clock receipt time
    pub timestamp: Millis,
    pub kind: NoteKind,
    pub key: u8,
    /// Strike velocity; always 0 for note off
    pub intensity: u8,
}

impl NoteEvent {
    pub fn note_on(timestamp: Millis, key: u8, intensity: u8) -> Self {
        Self {
            timestamp,
            kind: NoteKind::On,
            key,
            intensity,
        }
    }

    pub fn note_off(timestamp: Millis, key: u8) -> Self {
        Self {
            timestamp,
            kind: NoteKind::Off,
            key,
            intensity: 0,
        }
    }

    /// Decode a raw 3-byte note message.
    ///
    /// A note on with velocity 0 decodes as a note off, which is how most
    /// keyboards release keys under running status.
    pub fn from_bytes(bytes: &[u8], timestamp: Millis) -> Result<Self, ProtocolViolation> {
        let status = *bytes.first().ok_or(ProtocolViolation::Empty)?;

        let message_type = status & 0xF0;
        if message_type != NOTE_ON && message_type != NOTE_OFF {
            return Err(ProtocolViolation::UnknownStatus(status));
        }

        let [_, key, intensity] = *bytes else {
            return Err(ProtocolViolation::WrongLength(bytes.len()));
        };

        if key > 0x7F {
            return Err(ProtocolViolation::DataOutOfRange(key));
        }
        if intensity > 0x7F {
            return Err(ProtocolViolation::DataOutOfRange(intensity));
        }

        if message_type == NOTE_ON && intensity > 0 {
            Ok(Self::note_on(timestamp, key, intensity))
        } else {
            Ok(Self::note_off(timestamp, key))
        }
    }

    /// Encode on channel 0
    pub fn to_bytes(&self) -> [u8; 3] {
        match self.kind {
            NoteKind::On => [NOTE_ON, self.key, self.intensity],
            NoteKind::Off => [NOTE_OFF, self.key, 0],
        }
    }

    pub fn is_note_on(&self) -> bool {
        self.kind == NoteKind::On
    }
}

impl fmt::Display for NoteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [status, key, intensity] = self.to_bytes();
        write!(
            f,
            "{:02X} {:02X} {:02X} @ {}",
            status,
            key,
            intensity,
            format_timestamp(self.timestamp)
        )
    }
}
