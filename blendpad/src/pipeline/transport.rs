// Sixteenth-note step clock. Advanced in frames by the audio callback, so
// step boundaries land on exact sample offsets inside a block.

use super::pattern::{Pattern, TrackSet};
use crate::shared::{DEFAULT_BARS, DEFAULT_BPM, MAX_BARS, MAX_BPM, MIN_BARS, MIN_BPM, STEPS_PER_PATTERN};

const STEPS_PER_BEAT: f64 = 4.0;

pub fn clamp_bpm(bpm: f32) -> f32 {
    if bpm.is_nan() { DEFAULT_BPM } else { bpm.clamp(MIN_BPM, MAX_BPM) }
}

pub fn clamp_bars(bars: i32) -> u16 {
    bars.clamp(MIN_BARS as i32, MAX_BARS as i32) as u16
}

/// A step boundary crossed inside a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepEvent {
    pub step: u16,
    pub tracks: TrackSet,
    pub frame_offset: u32,
}

#[derive(Clone, Debug)]
pub struct TransportClock {
    bpm: f32,
    bars: u16,
    current_step: u16, // next step to fire
    last_fired: Option<u16>,
    playing: bool,
    frames_to_next: f64,
}

impl Default for TransportClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportClock {
    pub fn new() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            bars: DEFAULT_BARS,
            current_step: 0,
            last_fired: None,
            playing: false,
            frames_to_next: 0.0,
        }
    }

    /// Takes effect from the next step boundary on; the wait for the
    /// already scheduled boundary is left alone.
    pub fn set_bpm(&mut self, bpm: f32) -> f32 {
        self.bpm = clamp_bpm(bpm);
        self.bpm
    }

    pub fn set_bars(&mut self, bars: i32) -> u16 {
        self.bars = clamp_bars(bars);
        let total = self.total_steps();
        if self.current_step >= total {
            self.current_step %= total;
        }
        self.bars
    }

    pub fn play(&mut self) {
        if self.playing {
            return;
        }
        self.playing = true;
        self.frames_to_next = 0.0; // the resumed step fires right away
    }

    /// Keeps the position; `play` resumes from it.
    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn clear(&mut self) {
        self.playing = false;
        self.current_step = 0;
        self.last_fired = None;
        self.frames_to_next = 0.0;
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn bars(&self) -> u16 {
        self.bars
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_step(&self) -> u16 {
        self.current_step
    }

    pub fn last_fired(&self) -> Option<u16> {
        self.last_fired
    }

    pub fn total_steps(&self) -> u16 {
        STEPS_PER_PATTERN as u16 * self.bars
    }

    pub fn step_interval_secs(&self) -> f64 {
        60.0 / self.bpm as f64 / STEPS_PER_BEAT
    }

    /// Move the clock forward by `frames`, calling `on_step` for every
    /// boundary crossed with its offset into the block.
    pub fn advance(&mut self, frames: u32, sample_rate: f32, pattern: &Pattern, mut on_step: impl FnMut(StepEvent)) {
        if !self.playing || frames == 0 {
            return;
        }
        let block = frames as f64;
        let mut cursor = 0.0f64;
        loop {
            let remaining = block - cursor;
            if self.frames_to_next >= remaining {
                self.frames_to_next -= remaining;
                break;
            }
            cursor += self.frames_to_next;

            let step = self.current_step;
            let column = step as usize % STEPS_PER_PATTERN;
            on_step(StepEvent {
                step,
                tracks: pattern.tracks_at(column),
                frame_offset: (cursor as u32).min(frames - 1),
            });
            self.last_fired = Some(step);
            self.current_step = (step + 1) % self.total_steps();
            self.frames_to_next = self.step_interval_secs() * sample_rate as f64;
        }
    }
}
