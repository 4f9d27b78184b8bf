use std::f32::consts::TAU;

use super::param::Param;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
}

/// Signal source at the head of a voice.
#[derive(Clone, Debug)]
pub enum Source {
    Oscillator {
        waveform: Waveform,
        phase: f32, // 0..1
        frequency: Param,
    },
    Noise {
        rng: fastrand::Rng,
    },
}

impl Source {
    pub fn oscillator(waveform: Waveform, frequency: Param) -> Self {
        Source::Oscillator { waveform, phase: 0.0, frequency }
    }

    pub fn white_noise(seed: u64) -> Self {
        Source::Noise { rng: fastrand::Rng::with_seed(seed) }
    }

    pub fn next_sample(&mut self, t: u64, sample_rate: f32) -> f32 {
        match self {
            Source::Oscillator { waveform, phase, frequency } => {
                let s = match waveform {
                    Waveform::Sine => (*phase * TAU).sin(),
                    Waveform::Square => {
                        if *phase < 0.5 { 1.0 } else { -1.0 }
                    }
                };
                *phase = (*phase + frequency.value_at(t) / sample_rate).fract();
                s
            }
            Source::Noise { rng } => rng.f32() * 2.0 - 1.0,
        }
    }
}
