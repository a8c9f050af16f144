// Error types - configuration, wire decoding, measure state, transport, audio output

use thiserror::Error;

/// Invalid session parameters. Always fatal: the sequencer refuses to run with them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("beats per measure must be between 1 and 64 (got {0})")]
    InvalidBeatsPerMeasure(u32),

    #[error("beats per minute must be at least 1 (got {0})")]
    InvalidBeatsPerMinute(u32),

    #[error("measure duration must be positive and at most one hour (got {0} ms)")]
    InvalidDuration(i64),

    #[error("must keep at least one measure (got {0})")]
    InvalidRetention(usize),

    #[error("update interval must be positive")]
    InvalidUpdateInterval,

    #[error("event queue capacity must be positive")]
    InvalidQueueCapacity,

    #[error("volume {0} outside [0, 1]")]
    InvalidVolume(f32),

    #[error("invalid velocity curve: {0}")]
    InvalidCurve(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("RON write error: {0}")]
    Write(#[from] ron::Error),
}

/// Malformed or inconsistent note traffic. Logged and discarded, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("empty message")]
    Empty,

    #[error("expected 3 bytes, got {0}")]
    WrongLength(usize),

    #[error("unknown status byte {0:#04X}")]
    UnknownStatus(u8),

    #[error("data byte {0:#04X} out of range")]
    DataOutOfRange(u8),

    #[error("note on for key {0}, which is already held")]
    AlreadyHeld(u8),

    #[error("note off for key {0}, which is not held")]
    NotHeld(u8),
}

/// Errors raised by a measure's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MeasureError {
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),

    #[error("measure is already completed")]
    Completed,
}

/// Device-side failures. The sequencer never sees these, only the absence of events.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("MIDI init error: {0}")]
    Init(String),

    #[error("no MIDI input device found")]
    NoDevice,

    #[error("MIDI device '{0}' not found")]
    PortNotFound(String),

    #[error("MIDI connection failed: {0}")]
    Connect(String),

    #[error("MIDI source is not ready")]
    NotReady,
}

/// Click output failures.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device found")]
    NoDevice,

    #[error("audio configuration error: {0}")]
    Config(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Failures building a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not start metronome worker: {0}")]
    Worker(#[from] std::io::Error),
}
