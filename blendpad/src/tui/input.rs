use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use super::grid::cell_at;
use super::mode::TuiState;
use crate::shared::{CornerId, InputEvent};

// poll for input from the terminal and resolve keys and mouse gestures into
// input events for the middle layer
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    let events = match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(key.code),
        Event::Mouse(mouse) => handle_mouse(mouse, ts),
        // the pointer went somewhere we can't see; treat it as a release
        Event::FocusLost => release(ts),
        _ => vec![],
    };
    Ok(events)
}

fn handle_key(code: KeyCode) -> Vec<InputEvent> {
    let event = match code {
        KeyCode::Esc => InputEvent::Quit,
        KeyCode::Char(' ') => InputEvent::PlayPress,
        KeyCode::Char('c') => InputEvent::Clear,

        // corners and presets
        KeyCode::Char('1') => InputEvent::SelectCorner(CornerId::A),
        KeyCode::Char('2') => InputEvent::SelectCorner(CornerId::B),
        KeyCode::Char('3') => InputEvent::SelectCorner(CornerId::C),
        KeyCode::Char('4') => InputEvent::SelectCorner(CornerId::D),
        KeyCode::Char('[') => InputEvent::CyclePreset(-1),
        KeyCode::Char(']') => InputEvent::CyclePreset(1),

        // transport, lowercase = fine and shifted = coarse
        KeyCode::Char(',') => InputEvent::NudgeBpm(-1),
        KeyCode::Char('.') => InputEvent::NudgeBpm(1),
        KeyCode::Char('<') => InputEvent::NudgeBpm(-10),
        KeyCode::Char('>') => InputEvent::NudgeBpm(10),
        KeyCode::Char(';') => InputEvent::NudgeBars(-1),
        KeyCode::Char('\'') => InputEvent::NudgeBars(1),
        KeyCode::Char('-') => InputEvent::NudgeVolume(-1.0),
        KeyCode::Char('=' | '+') => InputEvent::NudgeVolume(1.0),

        KeyCode::Char('m') => InputEvent::ToggleMl,
        KeyCode::Char('e') => InputEvent::Export,
        _ => return vec![],
    };
    vec![event]
}

fn contains(area: Rect, column: u16, row: u16) -> bool {
    area.contains(ratatui::layout::Position { x: column, y: row })
}

fn handle_mouse(mouse: MouseEvent, ts: &mut TuiState) -> Vec<InputEvent> {
    let (column, row) = (mouse.column, mouse.row);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if contains(ts.pad_area, column, row) {
                ts.dragging = true;
                vec![InputEvent::PuckDown { column, row }]
            } else if let Some((track, step)) = cell_at(ts.grid_area, column, row) {
                vec![InputEvent::ToggleStep { track, step }]
            } else {
                vec![]
            }
        }
        // drags keep tracking outside the pad; the puck clamps to the edge
        MouseEventKind::Drag(MouseButton::Left) if ts.dragging => vec![InputEvent::PuckMove { column, row }],
        MouseEventKind::Up(_) => release(ts),
        _ => vec![],
    }
}

fn release(ts: &mut TuiState) -> Vec<InputEvent> {
    if ts.dragging {
        ts.dragging = false;
        vec![InputEvent::PuckUp]
    } else {
        vec![]
    }
}
