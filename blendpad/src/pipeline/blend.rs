// Bilinear corner blending. Pure functions, no async anywhere near here;
// this is what plays whenever the latent path can't answer.

use super::pattern::{Corners, Pattern};
use crate::shared::{CornerId, STEPS_PER_PATTERN, TrackId};

// slack for float accumulation, so a cell sitting exactly on the threshold stays on
const THRESHOLD_EPSILON: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendWeights {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl BlendWeights {
    pub fn get(&self, id: CornerId) -> f32 {
        match id {
            CornerId::A => self.a,
            CornerId::B => self.b,
            CornerId::C => self.c,
            CornerId::D => self.d,
        }
    }

    #[cfg(test)]
    pub fn sum(&self) -> f32 {
        self.a + self.b + self.c + self.d
    }
}

/// Corner weights for a pad position. Callers pass values already in [0, 1].
pub fn weights(x: f32, y: f32) -> BlendWeights {
    BlendWeights {
        a: (1.0 - x) * (1.0 - y),
        b: x * (1.0 - y),
        c: (1.0 - x) * y,
        d: x * y,
    }
}

/// A cell is on iff the weighted vote of the corners reaches `threshold`.
pub fn blend(corners: &Corners, w: &BlendWeights, threshold: f32) -> Pattern {
    let mut out = Pattern::empty();
    for track in TrackId::ALL {
        let dst = out.track_mut(track);
        for (step, cell) in dst.iter_mut().enumerate().take(STEPS_PER_PATTERN) {
            let vote: f32 = CornerId::ALL
                .iter()
                .map(|&id| if corners.get(id).is_on(track, step) { w.get(id) } else { 0.0 })
                .sum();
            *cell = vote >= threshold - THRESHOLD_EPSILON;
        }
    }
    out
}

pub fn blend_at(corners: &Corners, x: f32, y: f32, threshold: f32) -> Pattern {
    blend(corners, &weights(x, y), threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::presets;
    use crate::pipeline::test_fixture::{corner_fixture, scenario_corners};
    use crate::shared::DEFAULT_THRESHOLD;

    #[test]
    fn weights_sum_to_one_across_the_pad() {
        for i in 0..=20 {
            for j in 0..=20 {
                let (x, y) = (i as f32 / 20.0, j as f32 / 20.0);
                let w = weights(x, y);
                assert!((w.sum() - 1.0).abs() < 1e-5, "({x},{y}) -> {}", w.sum());
                assert!(w.a >= 0.0 && w.b >= 0.0 && w.c >= 0.0 && w.d >= 0.0);
            }
        }
    }

    #[test]
    fn pad_corners_reproduce_corner_patterns() {
        for corners in [corner_fixture(), scenario_corners()] {
            assert_eq!(blend_at(&corners, 0.0, 0.0, DEFAULT_THRESHOLD), corners.a);
            assert_eq!(blend_at(&corners, 1.0, 0.0, DEFAULT_THRESHOLD), corners.b);
            assert_eq!(blend_at(&corners, 0.0, 1.0, DEFAULT_THRESHOLD), corners.c);
            assert_eq!(blend_at(&corners, 1.0, 1.0, DEFAULT_THRESHOLD), corners.d);
        }
    }

    #[test]
    fn center_is_a_two_of_four_majority() {
        let corners = corner_fixture();
        let out = blend_at(&corners, 0.5, 0.5, DEFAULT_THRESHOLD);
        for track in TrackId::ALL {
            for step in 0..STEPS_PER_PATTERN {
                let votes = CornerId::ALL
                    .iter()
                    .filter(|&&id| corners.get(id).is_on(track, step))
                    .count();
                assert_eq!(out.is_on(track, step), votes >= 2, "{track:?} step {step}");
            }
        }
    }

    #[test]
    fn leaning_toward_a_corner_follows_it() {
        let corners = corner_fixture();
        // weight of A alone is 0.81 here
        assert_eq!(blend_at(&corners, 0.1, 0.1, DEFAULT_THRESHOLD), corners.a);
    }

    #[test]
    fn threshold_above_one_silences_everything() {
        let (_, corners) = presets::corners_from_names(&presets::DEFAULT_CORNERS.map(String::from));
        let out = blend_at(&corners, 0.3, 0.7, 1.5);
        assert_eq!(out.count_on(), 0);
    }
}
