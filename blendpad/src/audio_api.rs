use crate::shared::TrackId;

// Everything the UI thread can ask of the audio callback. Commands are
// drained at the top of each block, so they land on block boundaries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AudioCommand {
    Play,
    Stop, // pauses, keeps the step position
    Clear,
    SetBpm(f32),
    SetBars(u16),

    // a single hit outside the sequence, e.g. when a grid cell is switched on
    Audition(TrackId),

    // dispose every pending voice at once
    Flush,
}
