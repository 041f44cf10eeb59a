//! Sidebar rendering
//!
//! This module draws the controller pane:
//! - Header, worktree/session list, status bar, key hints
//! - Modal dialogs (the sidebar fills the window while one is open)
//! - Message overlay

mod dialogs;
mod help;

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Modal, Row};
use crate::git::Worktrees;
use crate::status::AgentStatus;
use crate::tmux::Multiplexer;

/// Screen row of the first list entry
pub const LIST_TOP: u16 = 1;

/// Rows taken by everything but the list (header, status, footer)
const CHROME_ROWS: u16 = 3;

/// Number of list rows visible in a sidebar `height` rows tall
pub fn visible_rows(height: u16) -> usize {
    height.saturating_sub(CHROME_ROWS) as usize
}

/// First row shown so that `selected` stays visible
pub fn list_offset(selected: usize, visible: usize) -> usize {
    if visible == 0 {
        return selected;
    }
    selected.saturating_sub(visible - 1)
}

/// Render the controller UI
pub fn render<M: Multiplexer, G: Worktrees>(frame: &mut Frame, app: &App<M, G>) {
    let area = frame.area();

    let layout = Layout::vertical([
        Constraint::Length(LIST_TOP), // Header
        Constraint::Min(1),           // Worktrees and sessions
        Constraint::Length(1),        // Status bar
        Constraint::Length(1),        // Footer
    ])
    .split(area);

    render_header(frame, app, layout[0]);
    render_list(frame, app, layout[1]);
    render_status_bar(frame, app, layout[2]);
    render_footer(frame, app, layout[3]);

    match &app.modal {
        Modal::QuitConfirm => dialogs::render_quit_dialog(frame, &app.model),
        Modal::DeleteConfirm { target } => dialogs::render_delete_dialog(frame, &app.model, target),
        Modal::NewWorktree { branch } => dialogs::render_input_dialog(
            frame,
            "New Worktree",
            "Branch",
            branch,
            Some("Creates the worktree next to the repository and starts a session in it"),
        ),
        Modal::NewSession { worktree_id, input } => {
            let branch = app
                .model
                .worktree(worktree_id)
                .map(|w| format!("on {}", w.branch));
            dialogs::render_input_dialog(frame, "New Session", "Title", input, branch.as_deref());
        }
        Modal::Rename { input, .. } => {
            dialogs::render_input_dialog(frame, "Rename Session", "Title", input, None)
        }
        Modal::Error { message } => dialogs::render_error_dialog(frame, message),
        Modal::None => {}
    }

    if let Some(ref message) = app.message {
        help::render_message(frame, message, Color::Green);
    }
}

fn render_header<M: Multiplexer, G: Worktrees>(frame: &mut Frame, app: &App<M, G>, area: Rect) {
    let active = app
        .model
        .active()
        .map(|s| format!(" {} ", s.title))
        .unwrap_or_default();

    let prefix = "─ claude-panes ─";
    let fill = (area.width as usize).saturating_sub(prefix.width());
    let title = format!("{}{:─>width$}", prefix, active, width = fill);

    let header = Paragraph::new(title)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

    frame.render_widget(header, area);
}

fn status_color(status: AgentStatus, is_selected: bool) -> Color {
    // Brighter colors when selected so text stays readable on the highlight
    match (status, is_selected) {
        (AgentStatus::Working, _) => Color::Green,
        (AgentStatus::Waiting, _) => Color::Yellow,
        (AgentStatus::Idle, true) => Color::White,
        (AgentStatus::Idle, false) => Color::DarkGray,
        (AgentStatus::Unknown, true) => Color::Gray,
        (AgentStatus::Unknown, false) => Color::DarkGray,
    }
}

fn render_list<M: Multiplexer, G: Worktrees>(frame: &mut Frame, app: &App<M, G>, area: Rect) {
    let rows = app.rows();
    if rows.is_empty() {
        let paragraph = Paragraph::new("No worktrees found.")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
        return;
    }

    let visible = area.height as usize;
    let offset = list_offset(app.selected, visible);
    let mut items: Vec<ListItem> = Vec::new();

    for (i, row) in rows.iter().enumerate().skip(offset).take(visible) {
        let is_selected = i == app.selected;
        let marker = if is_selected { "▸" } else { " " };

        let line = match row {
            Row::Worktree(id) => {
                let Some(worktree) = app.model.worktree(id) else {
                    continue;
                };
                let color = if worktree.is_primary {
                    Color::Cyan
                } else {
                    Color::Magenta
                };
                Line::from(vec![
                    Span::raw(format!("{} ", marker)),
                    Span::styled("⎇ ", Style::default().fg(color)),
                    Span::styled(
                        worktree.branch.clone(),
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    ),
                ])
            }
            Row::Session(id) => {
                let Some(session) = app.model.session(id) else {
                    continue;
                };
                let status = app.status(id);
                let title_style = if app.model.is_active(id) {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                let mut spans = vec![
                    Span::raw(format!("{}   ", marker)),
                    Span::styled(status.symbol(), Style::default().fg(status_color(status, is_selected))),
                    Span::raw(" "),
                    Span::styled(session.title.clone(), title_style),
                ];
                if !session.terminals.is_empty() {
                    spans.push(Span::styled(
                        format!(" [{}]", session.terminals.len()),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                Line::from(spans)
            }
        };

        let style = if is_selected {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        items.push(ListItem::new(line).style(style));
    }

    frame.render_widget(List::new(items), area);
}

fn render_status_bar<M: Multiplexer, G: Worktrees>(frame: &mut Frame, app: &App<M, G>, area: Rect) {
    let sessions = &app.model.sessions;
    let working = sessions
        .iter()
        .filter(|s| app.status(&s.id) == AgentStatus::Working)
        .count();
    let waiting = sessions
        .iter()
        .filter(|s| app.status(&s.id) == AgentStatus::Waiting)
        .count();

    let mut parts = vec![format!("{} sessions", sessions.len())];
    if working > 0 {
        parts.push(format!("{} working", working));
    }
    if waiting > 0 {
        parts.push(format!("{} waiting", waiting));
    }

    let bar = Paragraph::new(format!(" {}", parts.join(" │ ")))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(bar, area);
}

fn render_footer<M: Multiplexer, G: Worktrees>(frame: &mut Frame, app: &App<M, G>, area: Rect) {
    let footer = Paragraph::new(help::footer_hints(&app.modal))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_offset_keeps_selection_visible() {
        assert_eq!(list_offset(0, 10), 0);
        assert_eq!(list_offset(9, 10), 0);
        assert_eq!(list_offset(12, 10), 3);
        assert_eq!(list_offset(4, 0), 4);
    }

    #[test]
    fn test_visible_rows() {
        assert_eq!(visible_rows(40), 37);
        assert_eq!(visible_rows(2), 0);
    }
}
