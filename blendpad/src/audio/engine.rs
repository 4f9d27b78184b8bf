use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::frame::StereoFrame;
use super::synth::{MasterGain, VoiceSynthesizer};
use crate::audio_api::AudioCommand;
use crate::pipeline::pattern::ActivePattern;
use crate::pipeline::transport::TransportClock;

const NO_STEP: u32 = u32::MAX;

/// What the callback publishes for the UI after every block.
#[derive(Debug)]
pub struct EngineStatus {
    playing: AtomicBool,
    current_step: AtomicU32,
    last_fired: AtomicU32,
    total_steps: AtomicU32,
    pending_voices: AtomicU32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportSnapshot {
    pub playing: bool,
    pub current_step: u16,
    pub last_fired: Option<u16>,
    pub total_steps: u16,
    pub pending_voices: usize,
}

impl EngineStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            playing: AtomicBool::new(false),
            current_step: AtomicU32::new(0),
            last_fired: AtomicU32::new(NO_STEP),
            total_steps: AtomicU32::new(0),
            pending_voices: AtomicU32::new(0),
        })
    }

    fn publish(&self, transport: &TransportClock, pending: usize) {
        self.playing.store(transport.is_playing(), Ordering::Relaxed);
        self.current_step.store(transport.current_step() as u32, Ordering::Relaxed);
        self.last_fired
            .store(transport.last_fired().map_or(NO_STEP, |s| s as u32), Ordering::Relaxed);
        self.total_steps.store(transport.total_steps() as u32, Ordering::Relaxed);
        self.pending_voices.store(pending as u32, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        let last = self.last_fired.load(Ordering::Relaxed);
        TransportSnapshot {
            playing: self.playing.load(Ordering::Relaxed),
            current_step: self.current_step.load(Ordering::Relaxed) as u16,
            last_fired: (last != NO_STEP).then_some(last as u16),
            total_steps: self.total_steps.load(Ordering::Relaxed) as u16,
            pending_voices: self.pending_voices.load(Ordering::Relaxed) as usize,
        }
    }
}

/// Owned by the audio callback: the step clock drives the synthesizer from
/// whatever pattern is active at the start of each block.
pub struct Engine {
    sample_rate: f32,
    clock: u64, // absolute frame count
    transport: TransportClock,
    synth: VoiceSynthesizer,
    active: Arc<ActivePattern>,
    status: Arc<EngineStatus>,
}

impl Engine {
    pub fn new(
        sample_rate: u32,
        active: Arc<ActivePattern>,
        master: MasterGain,
        noise: bool,
        status: Arc<EngineStatus>,
    ) -> Self {
        let sample_rate = sample_rate as f32;
        let transport = TransportClock::new();
        status.publish(&transport, 0);
        Self {
            sample_rate,
            clock: 0,
            transport,
            synth: VoiceSynthesizer::new(sample_rate, noise, master),
            active,
            status,
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Play => self.transport.play(),
            AudioCommand::Stop => self.transport.stop(),
            AudioCommand::Clear => self.transport.clear(),
            AudioCommand::SetBpm(bpm) => {
                self.transport.set_bpm(bpm);
            }
            AudioCommand::SetBars(bars) => {
                self.transport.set_bars(bars as i32);
            }
            AudioCommand::Audition(track) => {
                self.synth.trigger(track, self.clock);
            }
            AudioCommand::Flush => {
                let n = self.synth.flush();
                log::debug!("flushed {n} voices");
            }
        }
        self.status.publish(&self.transport, self.synth.pending());
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        out.fill(StereoFrame::zero());

        let block_start = self.clock;
        let pattern = self.active.snapshot();
        let synth = &mut self.synth;
        self.transport.advance(out.len() as u32, self.sample_rate, &pattern, |event| {
            for track in event.tracks.iter() {
                synth.trigger(track, block_start + event.frame_offset as u64);
            }
        });
        self.synth.render(out, block_start);
        self.clock += out.len() as u64;

        self.status.publish(&self.transport, self.synth.pending());
    }

    #[cfg(test)]
    pub fn transport(&self) -> &TransportClock {
        &self.transport
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.synth.flush();
    }
}
