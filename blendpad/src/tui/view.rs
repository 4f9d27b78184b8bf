use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use super::grid::draw_beat_grid;
use super::pad::draw_pad;
use crate::pipeline::coordinator::BlendStatus;
use crate::shared::DisplayState;

const HELP: &str =
    "space play/stop  c clear  1-4 corner  [ ] preset  , . bpm  ; ' bars  - = vol  m ml  e export  esc quit";

/// Inner areas of the interactive widgets, for resolving mouse input.
#[derive(Clone, Copy, Debug, Default)]
pub struct ViewAreas {
    pub pad: Rect,
    pub grid: Rect,
}

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState) -> ViewAreas {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // transport + status
            Constraint::Min(8),    // blend pad
            Constraint::Length(5), // beat grid
            Constraint::Length(1), // key help
        ])
        .split(area);

    draw_screen(frame, sections[0], state);

    let pad_block = Block::default().borders(Borders::ALL).title(" blend pad ");
    let pad = pad_block.inner(sections[1]);
    frame.render_widget(pad_block, sections[1]);
    draw_pad(frame, pad, state);

    let grid_block = Block::default().borders(Borders::ALL).title(" pattern ");
    let grid = grid_block.inner(sections[2]);
    frame.render_widget(grid_block, sections[2]);
    draw_beat_grid(frame, grid, &state.pattern, state.playing_column);

    frame.render_widget(
        Paragraph::new(HELP).style(Style::default().fg(Color::DarkGray)),
        sections[3],
    );

    ViewAreas { pad, grid }
}

fn status_style(status: BlendStatus) -> Style {
    match status {
        BlendStatus::Ready => Style::default().fg(Color::Green),
        BlendStatus::Computing => Style::default().fg(Color::Cyan),
        BlendStatus::Loading => Style::default().fg(Color::Yellow),
        BlendStatus::Unavailable => Style::default().fg(Color::Red),
        BlendStatus::Disabled => Style::default().fg(Color::DarkGray),
    }
}

fn draw_screen(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let play = if state.playing {
        Span::styled("▶ playing", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
    } else {
        Span::styled("■ stopped", Style::default().fg(Color::Gray))
    };
    let transport = Line::from(vec![
        play,
        Span::raw(format!(
            "   bpm {:>3.0}   bars {:>2}   step {:>3}/{:<3}   vol {:+.0} dB",
            state.bpm,
            state.bars,
            state.current_step,
            state.total_steps,
            state.volume_db
        )),
    ]);

    let audio = if state.audio_online { "audio on" } else { "audio idle" };
    let status = Line::from(vec![
        Span::styled(state.status.label(), status_style(state.status)),
        Span::styled(format!("   {audio}   "), Style::default().fg(Color::DarkGray)),
        Span::raw(state.display_text.clone()),
    ]);

    let block = Block::default().borders(Borders::ALL).title(" blendpad ");
    frame.render_widget(Paragraph::new(vec![transport, status]).block(block), area);
}
