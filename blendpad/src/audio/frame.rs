// One stereo frame. Voices are mono and land on both sides equally.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub fn zero() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_mono(&mut self, s: f32) {
        self.left += s;
        self.right += s;
    }

    #[inline]
    pub fn scale(&mut self, gain: f32) {
        self.left *= gain;
        self.right *= gain;
    }
}
