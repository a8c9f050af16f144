// Click engine - CPAL output stream that sounds metronome clicks
//
// The metronome worker pushes triggers into a ringbuffer through
// `ClickTrigger`; the audio callback pops them and mixes the pre-rendered
// click samples. The stream itself is not Send on every platform, so
// `ClickEngine` stays on the thread that created it and only the trigger
// handle is shared.
//
// Supported device formats: F32, I16, U16. Mixing is done in f32 and
// converted when written to the device buffer.

use crate::audio::click::{ClickKind, ClickPlayer, ClickSound};
use crate::error::AudioError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::{Mutex, PoisonError};
use tracing::{error, info, warn};

// Triggers in flight between the worker and the callback; a burst larger
// than a handful means the callback has stalled
const TRIGGER_CAPACITY: usize = 64;
// Clicks sounding at once; the oldest is cut when exceeded
const MAX_VOICES: usize = 8;

#[derive(Debug, Clone, Copy)]
struct ClickTriggerMsg {
    kind: ClickKind,
    volume: f32,
}

#[derive(Debug, Clone, Copy)]
struct ClickVoice {
    kind: ClickKind,
    volume: f32,
    position: usize,
}

/// Mixes active clicks; owned by the audio callback
struct ClickMixer {
    sound: ClickSound,
    voices: Vec<ClickVoice>,
    triggers: HeapCons<ClickTriggerMsg>,
}

impl ClickMixer {
    fn new(sound: ClickSound, triggers: HeapCons<ClickTriggerMsg>) -> Self {
        Self {
            sound,
            voices: Vec::with_capacity(MAX_VOICES),
            triggers,
        }
    }

    fn accept_triggers(&mut self) {
        while let Some(trigger) = self.triggers.try_pop() {
            if self.voices.len() == MAX_VOICES {
                self.voices.remove(0);
            }
            self.voices.push(ClickVoice {
                kind: trigger.kind,
                volume: trigger.volume,
                position: 0,
            });
        }
    }

    fn next_sample(&mut self) -> f32 {
        let mut mix = 0.0f32;
        for voice in &mut self.voices {
            let samples = self.sound.samples(voice.kind);
            if let Some(sample) = samples.get(voice.position) {
                mix += sample * voice.volume;
                voice.position += 1;
            }
        }
        let sound = &self.sound;
        self.voices
            .retain(|voice| voice.position < sound.samples(voice.kind).len());
        mix.clamp(-1.0, 1.0)
    }

    fn fill<T>(&mut self, data: &mut [T], channels: usize)
    where
        T: Sample + FromSample<f32>,
    {
        self.accept_triggers();
        for frame in data.chunks_mut(channels) {
            let value: T = T::from_sample(self.next_sample());
            for sample in frame.iter_mut() {
                *sample = value;
            }
        }
    }
}

/// Shareable handle that queues clicks for the engine
pub struct ClickTrigger {
    producer: Mutex<HeapProd<ClickTriggerMsg>>,
}

impl ClickPlayer for ClickTrigger {
    fn play(&self, kind: ClickKind, volume: f32) {
        let mut producer = self.producer.lock().unwrap_or_else(PoisonError::into_inner);
        if producer.try_push(ClickTriggerMsg { kind, volume }).is_err() {
            warn!(?kind, "click queue full, click dropped");
        }
    }
}

pub struct ClickEngine {
    _stream: Stream,
    sample_rate: f32,
}

impl ClickEngine {
    /// Open the default output device and start the click stream
    pub fn start() -> Result<(Self, ClickTrigger), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        info!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            "audio output"
        );

        let supported_config = device
            .default_output_config()
            .map_err(|e| AudioError::Config(e.to_string()))?;
        let sample_format = supported_config.sample_format();
        let sample_rate = supported_config.sample_rate().0 as f32;
        let config: StreamConfig = supported_config.into();

        let (producer, consumer) = HeapRb::<ClickTriggerMsg>::new(TRIGGER_CAPACITY).split();
        let mixer = ClickMixer::new(ClickSound::new(sample_rate), consumer);

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, mixer),
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, mixer),
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, mixer),
            other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
        }?;

        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        let trigger = ClickTrigger {
            producer: Mutex::new(producer),
        };
        Ok((
            Self {
                _stream: stream,
                sample_rate,
            },
            trigger,
        ))
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut mixer: ClickMixer,
    ) -> Result<Stream, AudioError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels as usize;
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    mixer.fill(data, channels);
                },
                |err| error!(%err, "audio stream error"),
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}
