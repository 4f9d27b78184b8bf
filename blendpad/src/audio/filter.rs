// Biquad filters, Audio EQ Cookbook coefficients, transposed direct form II.

use std::f64::consts::PI;

// Q of a freshly made filter node
const DEFAULT_Q: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Highpass,
    Bandpass,
}

#[derive(Clone, Debug)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    pub fn new(kind: FilterKind, cutoff: f32, sample_rate: f32) -> Self {
        let nyquist = sample_rate as f64 * 0.5;
        let f0 = (cutoff as f64).clamp(10.0, nyquist * 0.99);
        let omega = 2.0 * PI * f0 / sample_rate as f64;
        let (sin_w, cos_w) = omega.sin_cos();
        let alpha = sin_w / (2.0 * DEFAULT_Q);

        let (b0, b1, b2) = match kind {
            FilterKind::Highpass => ((1.0 + cos_w) / 2.0, -(1.0 + cos_w), (1.0 + cos_w) / 2.0),
            FilterKind::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let x = x as f64;
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y as f32
    }
}
