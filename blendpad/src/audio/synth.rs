// Voice registry. Every triggered hit is tracked until its grace period
// ends, then disposed; teardown flushes whatever is left.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use super::frame::StereoFrame;
use super::voice::{Voice, VoiceId, VoiceSpec};
use crate::shared::{MAX_VOLUME_DB, MIN_VOLUME_DB, TrackId};

pub const MAX_VOICES: usize = 64; // reserved up front, the callback never grows the pool

pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Master volume shared between the UI and the audio callback.
#[derive(Clone, Debug)]
pub struct MasterGain(Arc<AtomicU32>);

impl MasterGain {
    pub fn from_db(db: f32) -> Self {
        let g = Self(Arc::new(AtomicU32::new(0)));
        g.set_db(db);
        g
    }

    pub fn set_db(&self, db: f32) -> f32 {
        let db = db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB);
        self.0.store(db_to_gain(db).to_bits(), Ordering::Relaxed);
        db
    }

    pub fn linear(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

pub struct VoiceSynthesizer {
    sample_rate: f32,
    noise: bool,
    master: MasterGain,
    voices: Vec<Voice>,
    next_id: u64,
}

impl VoiceSynthesizer {
    pub fn new(sample_rate: f32, noise: bool, master: MasterGain) -> Self {
        Self {
            sample_rate,
            noise,
            master,
            voices: Vec::with_capacity(MAX_VOICES),
            next_id: 1,
        }
    }

    /// Schedule a hit starting at absolute frame `at`.
    pub fn trigger(&mut self, track: TrackId, at: u64) -> VoiceId {
        if self.voices.len() >= MAX_VOICES {
            // steal the oldest hit
            let oldest = (0..self.voices.len()).min_by_key(|&i| self.voices[i].start_at());
            if let Some(oldest) = oldest {
                let mut v = self.voices.swap_remove(oldest);
                release(&mut v);
            }
        }
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        let spec = VoiceSpec::for_track(track, self.noise);
        self.voices.push(Voice::new(id, &spec, at, self.sample_rate, id.0));
        id
    }

    /// Mix all live voices into `out` (which must start zeroed), apply the
    /// master gain, then dispose voices whose grace period has run out.
    pub fn render(&mut self, out: &mut [StereoFrame], block_start: u64) {
        for v in &mut self.voices {
            v.render_into(out, block_start, self.sample_rate);
        }
        let gain = self.master.linear();
        out.iter_mut().for_each(|f| f.scale(gain));

        let block_end = block_start + out.len() as u64;
        let mut i = 0;
        while i < self.voices.len() {
            if self.voices[i].dispose_at() <= block_end {
                let mut v = self.voices.swap_remove(i);
                release(&mut v);
            } else {
                i += 1;
            }
        }
    }

    /// Dispose every tracked voice now. Returns how many there were.
    pub fn flush(&mut self) -> usize {
        let n = self.voices.len();
        for mut v in self.voices.drain(..) {
            release(&mut v);
        }
        n
    }

    pub fn pending(&self) -> usize {
        self.voices.len()
    }

    #[cfg(test)]
    pub fn is_live(&self, id: VoiceId) -> bool {
        self.voices.iter().any(|v| v.id == id)
    }

    #[cfg(test)]
    pub fn dispose_at(&self, id: VoiceId) -> Option<u64> {
        self.voices.iter().find(|v| v.id == id).map(|v| v.dispose_at())
    }
}

fn release(voice: &mut Voice) {
    if let Err(e) = voice.dispose() {
        log::debug!("voice {}: ignoring dispose failure: {e}", voice.id.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn synth() -> VoiceSynthesizer {
        VoiceSynthesizer::new(SR, true, MasterGain::from_db(0.0))
    }

    fn peak(frames: &[StereoFrame]) -> f32 {
        frames.iter().map(|f| f.left.abs()).fold(0.0, f32::max)
    }

    #[test]
    fn db_conversion() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_gain(-6.0) - 0.501).abs() < 1e-3);
        let g = MasterGain::from_db(-100.0);
        assert!((g.linear() - db_to_gain(-60.0)).abs() < 1e-9);
        assert_eq!(g.set_db(20.0), 6.0);
    }

    #[test]
    fn voice_is_disposed_after_grace() {
        let mut s = synth();
        let id = s.trigger(TrackId::Kick, 1000);
        let dispose_at = s.dispose_at(id).unwrap();
        assert!(dispose_at - 1000 >= (0.25 * SR) as u64);

        let mut block = vec![StereoFrame::zero(); 512];
        let mut clock = 0u64;
        let mut heard = false;
        while clock < dispose_at + 512 {
            block.iter_mut().for_each(|f| *f = StereoFrame::zero());
            s.render(&mut block, clock);
            heard |= peak(&block) > 0.01;
            clock += 512;
            if clock < dispose_at.saturating_sub(512) {
                assert!(s.is_live(id));
            }
        }
        assert!(heard);
        assert!(!s.is_live(id));
        assert_eq!(s.pending(), 0);

        block.iter_mut().for_each(|f| *f = StereoFrame::zero());
        s.render(&mut block, clock);
        assert_eq!(peak(&block), 0.0);
    }

    #[test]
    fn flush_disposes_everything() {
        let mut s = synth();
        for track in TrackId::ALL {
            s.trigger(track, 0);
        }
        assert_eq!(s.pending(), 3);
        assert_eq!(s.flush(), 3);
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn pool_is_capped() {
        let mut s = synth();
        let first = s.trigger(TrackId::Hat, 0);
        for i in 1..=MAX_VOICES as u64 {
            s.trigger(TrackId::Hat, i);
        }
        assert_eq!(s.pending(), MAX_VOICES);
        assert!(!s.is_live(first));
    }

    #[test]
    fn master_gain_scales_output() {
        let loud = {
            let mut s = synth();
            s.trigger(TrackId::Kick, 0);
            let mut b = vec![StereoFrame::zero(); 2048];
            s.render(&mut b, 0);
            peak(&b)
        };
        let quiet = {
            let mut s = VoiceSynthesizer::new(SR, true, MasterGain::from_db(-20.0));
            s.trigger(TrackId::Kick, 0);
            let mut b = vec![StereoFrame::zero(); 2048];
            s.render(&mut b, 0);
            peak(&b)
        };
        assert!((quiet / loud - 0.1).abs() < 1e-3);
    }
}
