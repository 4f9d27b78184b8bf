use super::filter::{Biquad, FilterKind};
use super::frame::StereoFrame;
use super::param::Param;
use super::source::{Source, Waveform};
use crate::error::BlendError;
use crate::shared::TrackId;

// envelopes start here and decay to TAIL_GAIN; exponential ramps can't touch zero
const FLOOR_GAIN: f32 = 0.001;
const TAIL_GAIN: f32 = 0.0001;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SourceSpec {
    /// Sine with an exponential pitch drop over `glide` seconds.
    Sine { start_hz: f32, end_hz: f32, glide: f32 },
    Square { hz: f32 },
    Noise,
}

/// Recipe for one hit. Times are seconds after the trigger.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceSpec {
    pub source: SourceSpec,
    pub filters: [Option<(FilterKind, f32)>; 2],
    pub peak: f32,
    pub attack: f32,
    pub decay: f32,
    pub stop: f32,
    pub grace: f32,
}

impl VoiceSpec {
    /// `noise` false swaps snare and hat to square-wave substitutes.
    pub fn for_track(track: TrackId, noise: bool) -> Self {
        match (track, noise) {
            (TrackId::Kick, _) => VoiceSpec {
                source: SourceSpec::Sine { start_hz: 120.0, end_hz: 50.0, glide: 0.18 },
                filters: [None, None],
                peak: 0.9,
                attack: 0.004,
                decay: 0.18,
                stop: 0.25,
                grace: 0.35,
            },
            (TrackId::Snare, true) => VoiceSpec {
                source: SourceSpec::Noise,
                filters: [Some((FilterKind::Highpass, 800.0)), Some((FilterKind::Bandpass, 1800.0))],
                peak: 0.8,
                attack: 0.003,
                decay: 0.12,
                stop: 0.15,
                grace: 0.30,
            },
            (TrackId::Snare, false) => VoiceSpec {
                source: SourceSpec::Square { hz: 1000.0 },
                filters: [Some((FilterKind::Highpass, 800.0)), None],
                peak: 0.6,
                attack: 0.003,
                decay: 0.09,
                stop: 0.12,
                grace: 0.25,
            },
            (TrackId::Hat, true) => VoiceSpec {
                source: SourceSpec::Noise,
                filters: [Some((FilterKind::Highpass, 7000.0)), None],
                peak: 0.5,
                attack: 0.001,
                decay: 0.05,
                stop: 0.06,
                grace: 0.18,
            },
            (TrackId::Hat, false) => VoiceSpec {
                source: SourceSpec::Square { hz: 8000.0 },
                filters: [None, None],
                peak: 0.4,
                attack: 0.001,
                decay: 0.03,
                stop: 0.04,
                grace: 0.12,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

/// One scheduled hit: source, filter chain and gain envelope, all timed in
/// absolute frames.
#[derive(Clone, Debug)]
pub struct Voice {
    pub id: VoiceId,
    source: Source,
    filters: [Option<Biquad>; 2],
    gain: Param,
    start: u64,
    stop: u64,
    dispose_at: u64,
    disposed: bool,
}

fn secs_to_frames(secs: f32, sample_rate: f32) -> u64 {
    (secs * sample_rate).round().max(0.0) as u64
}

impl Voice {
    pub fn new(id: VoiceId, spec: &VoiceSpec, start: u64, sample_rate: f32, seed: u64) -> Self {
        let at = |secs: f32| start + secs_to_frames(secs, sample_rate);

        let source = match spec.source {
            SourceSpec::Sine { start_hz, end_hz, glide } => {
                let mut freq = Param::new(start_hz);
                freq.set_value_at_time(start_hz, start);
                freq.exponential_ramp_to_value_at_time(end_hz, at(glide));
                Source::oscillator(Waveform::Sine, freq)
            }
            SourceSpec::Square { hz } => Source::oscillator(Waveform::Square, Param::new(hz)),
            SourceSpec::Noise => Source::white_noise(seed),
        };

        let filters = spec
            .filters
            .map(|f| f.map(|(kind, cutoff)| Biquad::new(kind, cutoff, sample_rate)));

        let mut gain = Param::new(0.0);
        gain.set_value_at_time(FLOOR_GAIN, start);
        gain.exponential_ramp_to_value_at_time(spec.peak, at(spec.attack));
        gain.exponential_ramp_to_value_at_time(TAIL_GAIN, at(spec.decay));

        Self {
            id,
            source,
            filters,
            gain,
            start,
            stop: at(spec.stop),
            dispose_at: at(spec.stop.max(spec.grace)),
            disposed: false,
        }
    }

    pub fn start_at(&self) -> u64 {
        self.start
    }

    #[cfg(test)]
    pub fn stop_at(&self) -> u64 {
        self.stop
    }

    pub fn dispose_at(&self) -> u64 {
        self.dispose_at
    }

    /// Mix this voice into `out`, whose first frame sits at `block_start`.
    pub fn render_into(&mut self, out: &mut [StereoFrame], block_start: u64, sample_rate: f32) {
        if self.disposed {
            return;
        }
        for (i, frame) in out.iter_mut().enumerate() {
            let t = block_start + i as u64;
            if t < self.start {
                continue;
            }
            if t >= self.stop {
                break;
            }
            let mut s = self.source.next_sample(t, sample_rate);
            for f in self.filters.iter_mut().flatten() {
                s = f.process(s);
            }
            frame.add_mono(s * self.gain.value_at(t));
        }
    }

    pub fn dispose(&mut self) -> Result<(), BlendError> {
        if self.disposed {
            return Err(BlendError::AudioGraphError(format!("voice {} already disposed", self.id.0)));
        }
        self.disposed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn energy(frames: &[StereoFrame]) -> f32 {
        frames.iter().map(|f| f.left * f.left).sum()
    }

    #[test]
    fn fallback_specs_swap_sources() {
        let snare = VoiceSpec::for_track(TrackId::Snare, false);
        assert_eq!(snare.source, SourceSpec::Square { hz: 1000.0 });
        assert_eq!(snare.peak, 0.6);
        assert_eq!(snare.decay, 0.09);
        let hat = VoiceSpec::for_track(TrackId::Hat, true);
        assert_eq!(hat.source, SourceSpec::Noise);
        assert_eq!(hat.grace, 0.18);
    }

    #[test]
    fn grace_never_shorter_than_stop() {
        for track in TrackId::ALL {
            for noise in [true, false] {
                let spec = VoiceSpec::for_track(track, noise);
                assert!(spec.grace >= spec.stop, "{track:?} noise={noise}");
                assert!(spec.attack < spec.decay && spec.decay <= spec.stop);
            }
        }
    }

    #[test]
    fn silent_before_start_and_after_stop() {
        let spec = VoiceSpec::for_track(TrackId::Kick, true);
        let mut v = Voice::new(VoiceId(1), &spec, 1000, SR, 1);

        let mut early = vec![StereoFrame::zero(); 1000];
        v.render_into(&mut early, 0, SR);
        assert_eq!(energy(&early), 0.0);

        let mut hit = vec![StereoFrame::zero(); 1024];
        v.render_into(&mut hit, 1000, SR);
        assert!(energy(&hit) > 1.0);

        let mut late = vec![StereoFrame::zero(); 256];
        v.render_into(&mut late, v.stop_at(), SR);
        assert_eq!(energy(&late), 0.0);
    }

    #[test]
    fn snare_timings_in_frames() {
        let spec = VoiceSpec::for_track(TrackId::Snare, true);
        let v = Voice::new(VoiceId(2), &spec, 480, SR, 3);
        assert_eq!(v.start_at(), 480);
        assert_eq!(v.stop_at(), 480 + 7200); // 0.15 s
        assert_eq!(v.dispose_at(), 480 + 14400); // 0.30 s
    }

    #[test]
    fn double_dispose_is_an_error() {
        let spec = VoiceSpec::for_track(TrackId::Hat, false);
        let mut v = Voice::new(VoiceId(3), &spec, 0, SR, 0);
        assert!(v.dispose().is_ok());
        assert!(matches!(v.dispose(), Err(BlendError::AudioGraphError(_))));

        let mut out = vec![StereoFrame::zero(); 64];
        v.render_into(&mut out, 0, SR);
        assert_eq!(energy(&out), 0.0);
    }
}
