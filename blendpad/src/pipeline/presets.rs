// Built-in preset library; corner swaps pick from here.

use super::pattern::{Corners, Pattern};
use crate::shared::NUM_CORNERS;

pub const PRESET_NAMES: [&str; 7] = [
    "Four on the Floor",
    "Boom Bap",
    "Breakbeat",
    "Half-time",
    "Trap",
    "Shuffle",
    "Empty",
];

pub const DEFAULT_CORNERS: [&str; NUM_CORNERS] = ["Four on the Floor", "Boom Bap", "Breakbeat", "Half-time"];

pub fn preset(name: &str) -> Option<Pattern> {
    let p = match name {
        "Four on the Floor" => Pattern::from_steps(
            &[0, 4, 8, 12],
            &[4, 12],
            &[2, 6, 10, 14],
        ),
        "Boom Bap" => Pattern::from_steps(
            &[0, 7, 10],
            &[4, 12],
            &[0, 2, 4, 6, 8, 10, 12, 14],
        ),
        "Breakbeat" => Pattern::from_steps(
            &[0, 2, 10],
            &[4, 7, 12, 15],
            &[0, 2, 4, 6, 8, 10, 12, 14],
        ),
        "Half-time" => Pattern::from_steps(
            &[0, 11],
            &[8],
            &[0, 4, 8, 12],
        ),
        "Trap" => Pattern::from_steps(
            &[0, 6, 11],
            &[8],
            &[0, 1, 2, 3, 4, 6, 8, 9, 10, 11, 12, 14, 15],
        ),
        "Shuffle" => Pattern::from_steps(
            &[0, 3, 8, 11],
            &[4, 12],
            &[0, 3, 4, 7, 8, 11, 12, 15],
        ),
        "Empty" => Pattern::empty(),
        _ => return None,
    };
    Some(p)
}

pub fn preset_index(name: &str) -> Option<usize> {
    PRESET_NAMES.iter().position(|&n| n == name)
}

/// Step through the library, wrapping at both ends.
pub fn cycle(index: usize, delta: i32) -> usize {
    let len = PRESET_NAMES.len() as i64;
    (index as i64 + delta as i64).rem_euclid(len) as usize
}

/// Corners from preset names; unknown names fall back to that corner's default.
pub fn corners_from_names(names: &[String; NUM_CORNERS]) -> ([usize; NUM_CORNERS], Corners) {
    let indices: [usize; NUM_CORNERS] = std::array::from_fn(|i| {
        preset_index(&names[i])
            .or_else(|| {
                log::warn!("unknown preset '{}' for corner {}, using default", names[i], i);
                preset_index(DEFAULT_CORNERS[i])
            })
            .unwrap_or(0)
    });
    let corners = Corners::new(std::array::from_fn(|i| {
        preset(PRESET_NAMES[indices[i]]).unwrap_or_default()
    }));
    (indices, corners)
}
