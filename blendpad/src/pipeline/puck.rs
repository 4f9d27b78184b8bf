// Maps pointer gestures over the pad onto a normalized position. Knows
// nothing about blending; the caller forwards positions to the coordinator.

use crate::shared::{Position, clamp_unit};

/// Where the pad sits on screen, in whatever units pointer events use.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PadGeometry {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl PadGeometry {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    #[cfg(test)]
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.left && px < self.left + self.width && py >= self.top && py < self.top + self.height
    }

    fn normalize(&self, px: f32, py: f32) -> Position {
        let axis = |p: f32, origin: f32, size: f32| if size > 0.0 { clamp_unit((p - origin) / size) } else { 0.0 };
        Position::new(axis(px, self.left, self.width), axis(py, self.top, self.height))
    }
}

#[derive(Debug, Default)]
pub struct PuckController {
    geometry: PadGeometry,
    position: Position,
    dragging: bool,
}

impl PuckController {
    pub fn new(geometry: PadGeometry, position: Position) -> Self {
        Self { geometry, position, dragging: false }
    }

    /// Layout changes (e.g. a terminal resize) take effect on the next event.
    pub fn set_geometry(&mut self, geometry: PadGeometry) {
        self.geometry = geometry;
    }

    pub fn on_drag_start(&mut self, px: f32, py: f32) -> Position {
        self.dragging = true;
        self.position = self.geometry.normalize(px, py);
        self.position
    }

    /// Ignored unless a drag is in progress.
    pub fn on_drag_move(&mut self, px: f32, py: f32) -> Option<Position> {
        if !self.dragging {
            return None;
        }
        self.position = self.geometry.normalize(px, py);
        Some(self.position)
    }

    pub fn on_drag_end(&mut self) {
        self.dragging = false;
    }

    pub fn teardown(&mut self) {
        self.dragging = false;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    #[cfg(test)]
    pub fn position(&self) -> Position {
        self.position
    }
}
