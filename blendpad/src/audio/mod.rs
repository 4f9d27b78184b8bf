use std::sync::Arc;

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio_api::AudioCommand;
use crate::error::BlendError;
use crate::pipeline::pattern::ActivePattern;

mod engine;
mod filter;
mod frame;
mod param;
mod source;
mod synth;
mod voice;

pub use engine::TransportSnapshot;
use engine::{Engine, EngineStatus};
pub use frame::StereoFrame;
pub use synth::{MasterGain, VoiceSynthesizer};

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    status: Arc<EngineStatus>,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    pub fn send(&self, cmd: AudioCommand) {
        let _ = self.tx.try_send(cmd);
    }

    pub fn status(&self) -> TransportSnapshot {
        self.status.snapshot()
    }
}

pub fn start_audio(active: Arc<ActivePattern>, master: MasterGain, noise: bool) -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;
    let status = EngineStatus::new();

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let engine = Engine::new(sample_rate, active, master, noise, status.clone());
            let output_stream = build_output_stream_f32(&device, &config.into(), rx, engine, channels)?;
            output_stream.play().context("failed to play output stream")?;
            log::info!("audio started: {sample_rate} Hz, {channels} channels");

            Ok(AudioHandle {
                tx,
                status,
                _output_stream: output_stream,
            })
        }
        other => anyhow::bail!("unsupported sample format {other:?} (only f32 supported)"),
    }
}

// ── Output stream ─────────────────────────────────────────────────

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    mut engine: Engine,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    // grown once, outside steady state, if the host ever hands us a bigger buffer
    let mut scratch: Vec<StereoFrame> = vec![StereoFrame::zero(); 4096];

    let err_fn = |err| log::error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }

            let n_frames = data.len() / channels.max(1);
            if scratch.len() < n_frames {
                scratch.resize(n_frames, StereoFrame::zero());
            }
            let frames = &mut scratch[..n_frames];
            engine.render_block(frames);

            // stereo into the first two channels; mono gets the left side
            for (out, f) in data.chunks_exact_mut(channels.max(1)).zip(frames.iter()) {
                out.fill(0.0);
                out[0] = f.left;
                if out.len() > 1 {
                    out[1] = f.right;
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Lazily started audio output. Nothing touches the device until the first
/// play; a failed start is reported and retried on the next attempt.
pub struct AudioContext {
    active: Arc<ActivePattern>,
    master: MasterGain,
    noise: bool,
    handle: Option<AudioHandle>,
}

impl AudioContext {
    pub fn new(active: Arc<ActivePattern>, master: MasterGain, noise: bool) -> Self {
        Self { active, master, noise, handle: None }
    }

    /// Idempotent: the second call returns the running handle.
    pub fn ensure_started(&mut self) -> Result<&AudioHandle, BlendError> {
        if self.handle.is_none() {
            let handle = start_audio(self.active.clone(), self.master.clone(), self.noise)
                .map_err(|e| BlendError::AudioGraphError(format!("{e:#}")))?;
            self.handle = Some(handle);
        }
        self.handle
            .as_ref()
            .ok_or_else(|| BlendError::AudioGraphError("audio handle missing".into()))
    }

    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// Sends to the running engine; dropped when audio never started.
    pub fn send(&self, cmd: AudioCommand) {
        if let Some(h) = &self.handle {
            h.send(cmd);
        }
    }

    pub fn status(&self) -> Option<TransportSnapshot> {
        self.handle.as_ref().map(|h| h.status())
    }

    /// Flushes pending voices and closes the stream.
    pub fn shutdown(&mut self) {
        if let Some(h) = self.handle.take() {
            h.send(AudioCommand::Stop);
            h.send(AudioCommand::Flush);
            // give the callback a block to drain the flush before the stream goes away
            std::thread::sleep(std::time::Duration::from_millis(30));
            drop(h);
            log::info!("audio shut down");
        }
    }
}
