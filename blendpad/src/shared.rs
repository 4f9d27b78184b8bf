// The input plan:
//
// Mouse:
//   press on the pad       //  PuckDown(column, row)
//   drag anywhere          //  PuckMove(column, row), only while a drag is live
//   release anywhere       //  PuckUp
//   click on the grid      //  ToggleStep(track, step)
//
// Keys:
//   Space                  //  PlayPress
//   c                      //  Clear
//   1 2 3 4                //  SelectCorner(A..D)
//   [ / ]                  //  CyclePreset(-1 or 1) on the selected corner
//   , / .                  //  NudgeBpm(-1 or 1)
//   < / >                  //  NudgeBpm(-10 or 10)
//   ; / '                  //  NudgeBars(-1 or 1)
//   - / =                  //  NudgeVolume(-1.0 or 1.0) in dB
//   m                      //  ToggleMl
//   e                      //  Export
//   Esc                    //  Quit
//
// Same split as always: the middle layer owns the blend engine and the
// transport mirror, the TUI renders whatever `DisplayState` says.

use std::sync::Arc;

use crate::pipeline::coordinator::BlendStatus;
use crate::pipeline::pattern::Pattern;

pub const STEPS_PER_PATTERN: usize = 16;
pub const NUM_TRACKS: usize = 3;
pub const NUM_CORNERS: usize = 4;

pub const DEFAULT_BPM: f32 = 96.0;
pub const MIN_BPM: f32 = 40.0;
pub const MAX_BPM: f32 = 240.0;
pub const DEFAULT_BARS: u16 = 2;
pub const MIN_BARS: u16 = 1;
pub const MAX_BARS: u16 = 16;

pub const DEFAULT_VOLUME_DB: f32 = -6.0;
pub const MIN_VOLUME_DB: f32 = -60.0;
pub const MAX_VOLUME_DB: f32 = 6.0;

pub const DEBOUNCE_MS: u64 = 120;
pub const DECODE_TEMPERATURE: f32 = 0.85;
pub const DEFAULT_THRESHOLD: f32 = 0.5;

pub const EXPORT_SAMPLE_RATE: u32 = 44100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackId {
    Kick,
    Snare,
    Hat,
}

impl TrackId {
    pub const ALL: [TrackId; NUM_TRACKS] = [TrackId::Kick, TrackId::Snare, TrackId::Hat];

    pub fn index(self) -> usize {
        match self {
            TrackId::Kick => 0,
            TrackId::Snare => 1,
            TrackId::Hat => 2,
        }
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            TrackId::Kick => "kick",
            TrackId::Snare => "snare",
            TrackId::Hat => "hat",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CornerId {
    A,
    B,
    C,
    D,
}

impl CornerId {
    pub const ALL: [CornerId; NUM_CORNERS] = [CornerId::A, CornerId::B, CornerId::C, CornerId::D];

    pub fn index(self) -> usize {
        match self {
            CornerId::A => 0,
            CornerId::B => 1,
            CornerId::C => 2,
            CornerId::D => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CornerId::A => "A",
            CornerId::B => "B",
            CornerId::C => "C",
            CornerId::D => "D",
        }
    }
}

/// A point on the blend pad, both axes in [0, 1].
/// (0,0) is corner A (top left), (1,1) is corner D (bottom right).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(0.2, 0.3) // where the puck sits on startup
    }
}

// NaN lands on 0 rather than poisoning the blend
pub fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    // pointer, in terminal cells
    PuckDown { column: u16, row: u16 },
    PuckMove { column: u16, row: u16 },
    PuckUp,
    ToggleStep { track: TrackId, step: u8 },

    // transport
    PlayPress,
    Clear,
    NudgeBpm(i32),
    NudgeBars(i32),
    NudgeVolume(f32),

    // corners
    SelectCorner(CornerId),
    CyclePreset(i32),

    ToggleMl,
    Export,
    Quit,
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub pattern: Arc<Pattern>,
    pub playing_column: Option<usize>, // grid column of the last fired step
    pub current_step: u16,
    pub total_steps: u16,
    pub playing: bool,
    pub bpm: f32,
    pub bars: u16,
    pub volume_db: f32,
    pub puck: Position,
    pub dragging: bool,
    pub status: BlendStatus,
    pub selected_corner: CornerId,
    pub corner_presets: [&'static str; NUM_CORNERS],
    pub audio_online: bool,
    pub display_text: String, // last message: export path, errors, preset swaps
}
