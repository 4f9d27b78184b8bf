use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::pipeline::pattern::Pattern;
use crate::shared::{STEPS_PER_PATTERN, TrackId};

const LABEL_W: u16 = 7;
const CELL_W: u16 = 3;

// 3 x 16 beat grid, one track per row. `area` is the inner area, without border.
pub fn draw_beat_grid(frame: &mut Frame, area: Rect, pattern: &Pattern, playing_column: Option<usize>) {
    let lines: Vec<Line> = TrackId::ALL
        .iter()
        .map(|&track| {
            let mut spans = vec![Span::styled(
                format!("{:<width$}", track.name(), width = LABEL_W as usize),
                Style::default().fg(Color::Gray),
            )];
            for step in 0..STEPS_PER_PATTERN {
                let on = pattern.is_on(track, step);
                let mut style = if on {
                    Style::default().fg(Color::LightMagenta).add_modifier(Modifier::BOLD)
                } else if step % 4 == 0 {
                    Style::default().fg(Color::Gray)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                if playing_column == Some(step) {
                    style = style.bg(Color::Rgb(60, 60, 60));
                }
                spans.push(Span::styled(if on { " ■ " } else { " · " }, style));
            }
            Line::from(spans)
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

// which cell a click at (column, row) lands on, if any
pub fn cell_at(area: Rect, column: u16, row: u16) -> Option<(TrackId, u8)> {
    if row < area.y || column < area.x + LABEL_W {
        return None;
    }
    let track = TrackId::from_index((row - area.y) as usize)?;
    let step = (column - area.x - LABEL_W) / CELL_W;
    if step as usize >= STEPS_PER_PATTERN || column >= area.x + area.width {
        return None;
    }
    Some((track, step as u8))
}
