// Offline bounce of the active pattern: the same clock and voices the live
// engine uses, driven block by block into a buffer, then written as 16-bit WAV.
use std::path::Path;

use anyhow::Context;

use super::pattern::Pattern;
use super::transport::TransportClock;
use crate::audio::{MasterGain, StereoFrame, VoiceSynthesizer};

const BLOCK: usize = 512;
const TAIL_SECS: f64 = 0.35; // longest voice grace period

#[derive(Clone, Copy, Debug)]
pub struct ExportSettings {
    pub bpm: f32,
    pub bars: u16,
    pub volume_db: f32,
    pub noise: bool,
    pub sample_rate: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExportSummary {
    pub frames: usize,
    pub seconds: f64,
}

/// Plays `bars` bars once from step 0 and lets the last hits ring out.
pub fn render_pattern(pattern: &Pattern, settings: &ExportSettings) -> Vec<StereoFrame> {
    let sr = settings.sample_rate as f32;
    let mut transport = TransportClock::new();
    transport.set_bpm(settings.bpm);
    transport.set_bars(settings.bars as i32);
    transport.play();

    let pattern_frames =
        (transport.total_steps() as f64 * transport.step_interval_secs() * settings.sample_rate as f64).ceil() as usize;
    let total = pattern_frames + (TAIL_SECS * settings.sample_rate as f64).ceil() as usize;

    let total_steps = transport.total_steps() as usize;
    let mut fired = 0usize;

    let mut synth = VoiceSynthesizer::new(sr, settings.noise, MasterGain::from_db(settings.volume_db));
    let mut out = vec![StereoFrame::zero(); total];
    let mut clock = 0usize;
    while clock < total {
        let len = if clock < pattern_frames {
            BLOCK.min(pattern_frames - clock)
        } else {
            BLOCK.min(total - clock)
        };
        if clock < pattern_frames {
            let start = clock as u64;
            transport.advance(len as u32, sr, pattern, |event| {
                // the rounded-up pattern length can reach the wrap back to step 0
                if fired == total_steps {
                    return;
                }
                fired += 1;
                for track in event.tracks.iter() {
                    synth.trigger(track, start + event.frame_offset as u64);
                }
            });
        }
        synth.render(&mut out[clock..clock + len], clock as u64);
        clock += len;
    }
    synth.flush();
    out
}

pub fn write_wav(path: &Path, frames: &[StereoFrame], sample_rate: u32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    let to_i16 = |s: f32| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
    for f in frames {
        writer.write_sample(to_i16(f.left))?;
        writer.write_sample(to_i16(f.right))?;
    }
    writer.finalize().context("finalizing wav")?;
    Ok(())
}

pub fn export_wav(path: &Path, pattern: &Pattern, settings: &ExportSettings) -> anyhow::Result<ExportSummary> {
    let frames = render_pattern(pattern, settings);
    write_wav(path, &frames, settings.sample_rate)?;
    let summary = ExportSummary {
        frames: frames.len(),
        seconds: frames.len() as f64 / settings.sample_rate as f64,
    };
    log::info!("exported {:.2}s to {}", summary.seconds, path.display());
    Ok(summary)
}
