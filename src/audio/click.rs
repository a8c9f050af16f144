// Metronome click sounds
// Pre-renders the tick and bell samples once so triggering a click is only a copy

use std::f32::consts::PI;
use tracing::debug;

/// The two metronome sounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    /// Short beat marker, sounded on every beat
    Tick,
    /// Longer ring layered on top of the tick at a measure start
    Bell,
}

/// Fire-and-forget sound trigger. Implementations must not block: the
/// metronome worker calls `play` while holding its schedule lock.
pub trait ClickPlayer: Send + Sync {
    fn play(&self, kind: ClickKind, volume: f32);
}

/// Pre-rendered mono samples for both click kinds
#[derive(Debug, Clone)]
pub struct ClickSound {
    tick_samples: Vec<f32>,
    bell_samples: Vec<f32>,
}

impl ClickSound {
    const TICK_DURATION_MS: f32 = 10.0;
    const BELL_DURATION_MS: f32 = 120.0;

    pub fn new(sample_rate: f32) -> Self {
        let tick_len = ((Self::TICK_DURATION_MS / 1000.0) * sample_rate) as usize;
        let bell_len = ((Self::BELL_DURATION_MS / 1000.0) * sample_rate) as usize;

        Self {
            tick_samples: Self::render(sample_rate, tick_len, &[(800.0, 0.4)], 8.0),
            bell_samples: Self::render(
                sample_rate,
                bell_len,
                &[(1200.0, 0.45), (2400.0, 0.15), (3600.0, 0.05)],
                4.0,
            ),
        }
    }

    /// Sum of sine partials `(frequency, amplitude)` under an exponential decay
    fn render(sample_rate: f32, num_samples: usize, partials: &[(f32, f32)], decay: f32) -> Vec<f32> {
        (0..num_samples)
            .map(|i| {
                let t = i as f32 / num_samples as f32;
                let envelope = (-t * decay).exp();
                let time = i as f32 / sample_rate;
                partials
                    .iter()
                    .map(|&(frequency, amplitude)| (2.0 * PI * frequency * time).sin() * amplitude)
                    .sum::<f32>()
                    * envelope
            })
            .collect()
    }

    pub fn samples(&self, kind: ClickKind) -> &[f32] {
        match kind {
            ClickKind::Tick => &self.tick_samples,
            ClickKind::Bell => &self.bell_samples,
        }
    }
}

/// Player for headless runs: logs instead of sounding
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPlayer;

impl ClickPlayer for SilentPlayer {
    fn play(&self, kind: ClickKind, volume: f32) {
        debug!(?kind, volume, "click");
    }
}
