use ratatui::layout::Rect;

// state local to the tui: where things were drawn last frame, so mouse
// events can be resolved against them, and whether a pad drag is live
#[derive(Clone, Debug, Default)]
pub struct TuiState {
    pub pad_area: Rect,
    pub grid_area: Rect,
    // set on press inside the pad, cleared on release anywhere
    pub dragging: bool,
}
