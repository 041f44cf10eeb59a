//! Modal dialog rendering
//!
//! One function per dialog kind:
//! - Quit (detach or kill everything)
//! - Delete confirmation for sessions and worktrees
//! - Single-line text input (new worktree, new session, rename)
//! - Error

use ratatui::{
    layout::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::DeleteTarget;
use crate::model::Model;

use super::help::centered_rect;

const DIALOG_WIDTH: u16 = 56;

fn dialog_block(title: &str, color: Color) -> Block<'_> {
    Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

fn show(frame: &mut Frame, lines: Vec<Line>, block: Block, alignment: Alignment) {
    // Rows after wrapping, plus the border
    let inner = DIALOG_WIDTH.saturating_sub(2).max(1) as usize;
    let rows: usize = lines.iter().map(|l| l.width().max(1).div_ceil(inner)).sum();
    let height = rows as u16 + 2;
    let area = centered_rect(DIALOG_WIDTH, height, frame.area());
    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .alignment(alignment)
        .wrap(Wrap { trim: true });

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

pub fn render_quit_dialog(frame: &mut Frame, model: &Model) {
    let lines = vec![
        Line::from(format!("{} session(s) running", model.sessions.len())),
        Line::raw(""),
        Line::from("[d]etach and keep them running"),
        Line::styled(
            "[k]ill every session and exit",
            Style::default().fg(Color::Red),
        ),
        Line::raw(""),
        Line::styled("esc cancel", Style::default().fg(Color::DarkGray)),
    ];
    show(frame, lines, dialog_block("Quit", Color::Cyan), Alignment::Center);
}

pub fn render_delete_dialog(frame: &mut Frame, model: &Model, target: &DeleteTarget) {
    let mut lines = Vec::new();
    match target {
        DeleteTarget::Session(id) => {
            let title = model.session(id).map(|s| s.title.as_str()).unwrap_or("?");
            lines.push(Line::from(format!("Delete session '{}'?", title)));
            let terminals = model.session(id).map_or(0, |s| s.terminals.len());
            if terminals > 0 {
                lines.push(Line::styled(
                    format!("Its {} terminal(s) are closed too.", terminals),
                    Style::default().fg(Color::Yellow),
                ));
            }
        }
        DeleteTarget::Worktree(id) => {
            let worktree = model.worktree(id);
            let branch = worktree.map(|w| w.branch.as_str()).unwrap_or("?");
            let path = worktree
                .map(|w| w.path.display().to_string())
                .unwrap_or_default();
            lines.push(Line::from(format!("Delete worktree '{}' at:", branch)));
            lines.push(Line::styled(
                format!("  {}", path),
                Style::default().fg(Color::Yellow),
            ));
            let sessions = model.sessions_of(id).len();
            if sessions > 0 {
                lines.push(Line::from(format!("and its {} session(s)", sessions)));
            }
            lines.push(Line::raw(""));
            lines.push(Line::styled(
                "⚠ This removes the directory!",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
        }
    }
    lines.push(Line::raw(""));
    lines.push(Line::from("[Y]es  [n]o"));

    show(frame, lines, dialog_block("Confirm", Color::Red), Alignment::Center);
}

/// Single text field with a trailing cursor
pub fn render_input_dialog(frame: &mut Frame, title: &str, label: &str, value: &str, note: Option<&str>) {
    let label_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{}: ", label), label_style),
        Span::raw(value),
        Span::raw("_"),
    ])];
    if let Some(note) = note {
        lines.push(Line::raw(""));
        lines.push(Line::styled(note, Style::default().fg(Color::DarkGray)));
    }

    show(frame, lines, dialog_block(title, Color::Cyan), Alignment::Left);
}

pub fn render_error_dialog(frame: &mut Frame, message: &str) {
    let lines = vec![
        Line::styled(message, Style::default().fg(Color::White)),
        Line::raw(""),
        Line::styled("⏎ close", Style::default().fg(Color::DarkGray)),
    ];
    show(frame, lines, dialog_block("Error", Color::Red), Alignment::Center);
}
