use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::shared::{CornerId, DisplayState, Position};

// where the puck lands inside `area` (inner area of the pad)
pub fn puck_cell(area: Rect, pos: Position) -> (u16, u16) {
    let span = |size: u16, v: f32| (v * size.saturating_sub(1) as f32).round() as u16;
    (area.x + span(area.width, pos.x), area.y + span(area.height, pos.y))
}

fn corner_label(state: &DisplayState, corner: CornerId) -> Span<'static> {
    let text = format!(" {} {} ", corner.label(), state.corner_presets[corner.index()]);
    let style = if state.selected_corner == corner {
        Style::default().fg(Color::Black).bg(Color::Yellow)
    } else {
        Style::default().fg(Color::Yellow)
    };
    Span::styled(text, style)
}

pub fn draw_pad(frame: &mut Frame, area: Rect, state: &DisplayState) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    // faint dot lattice
    let dots: Vec<Line> = (0..area.height)
        .map(|row| {
            let s: String = (0..area.width)
                .map(|col| if row % 2 == 0 && col % 4 == 0 { '·' } else { ' ' })
                .collect();
            Line::styled(s, Style::default().fg(Color::DarkGray))
        })
        .collect();
    frame.render_widget(Paragraph::new(dots), area);

    let top = Rect::new(area.x, area.y, area.width, 1);
    let bottom = Rect::new(area.x, area.y + area.height - 1, area.width, 1);
    frame.render_widget(Paragraph::new(Line::from(corner_label(state, CornerId::A))), top);
    frame.render_widget(
        Paragraph::new(Line::from(corner_label(state, CornerId::B))).alignment(Alignment::Right),
        top,
    );
    frame.render_widget(Paragraph::new(Line::from(corner_label(state, CornerId::C))), bottom);
    frame.render_widget(
        Paragraph::new(Line::from(corner_label(state, CornerId::D))).alignment(Alignment::Right),
        bottom,
    );

    let (x, y) = puck_cell(area, state.puck);
    let puck_style = if state.dragging {
        Style::default().fg(Color::LightMagenta).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Magenta)
    };
    frame.buffer_mut()[(x, y)].set_symbol("●").set_style(puck_style);
}
