//! Changed-files panel below the sidebar
//!
//! Re-scans `git status` of the pushed worktree every few seconds. Opening a
//! file asks the controller for a file-diff view.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, Paragraph},
    Frame,
};
use tracing::warn;

use crate::git::{self, ChangedFile};
use crate::relay::{Namespace, RelayMessage};
use crate::satellite::DiffListState;

use super::{initial_state, Action, Satellite};

const RESCAN_INTERVAL: Duration = Duration::from_secs(2);

/// Rows above the file list (title line)
const LIST_TOP: u16 = 1;

pub struct DiffList {
    state: DiffListState,
    files: Vec<ChangedFile>,
    selected: usize,
    last_scan: Option<Instant>,
    error: Option<String>,
}

impl DiffList {
    pub fn new(json: Option<&str>) -> Result<Self> {
        Ok(Self {
            state: initial_state(json)?,
            files: Vec::new(),
            selected: 0,
            last_scan: None,
            error: None,
        })
    }

    fn rescan(&mut self, now: Instant) {
        self.last_scan = Some(now);
        let Some(path) = self.state.worktree_path.as_deref() else {
            self.files.clear();
            return;
        };
        match git::changed_files(path) {
            Ok(files) => {
                self.files = files;
                self.error = None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "git status failed");
                self.error = Some(format!("{:#}", e));
                self.files.clear();
            }
        }
        if self.selected >= self.files.len() {
            self.selected = self.files.len().saturating_sub(1);
        }
    }

    fn open_selected(&self) -> Action {
        match self.files.get(self.selected) {
            Some(file) => Action::Send(RelayMessage::with_data(
                Namespace::Diff,
                "open",
                &file.path,
            )),
            None => Action::None,
        }
    }

    fn file_color(file: &ChangedFile) -> Color {
        match (file.status, file.staged) {
            ('?', _) => Color::DarkGray,
            ('D', _) => Color::Red,
            (_, true) => Color::Green,
            _ => Color::Yellow,
        }
    }
}

impl Satellite for DiffList {
    fn apply_render(&mut self, json: &str) -> Result<()> {
        let state: DiffListState =
            serde_json::from_str(json).context("Failed to parse diff list state")?;
        if state.worktree_path != self.state.worktree_path {
            self.selected = 0;
            self.files.clear();
        }
        self.state = state;
        // Scan on the next tick
        self.last_scan = None;
        Ok(())
    }

    fn on_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if self.selected + 1 < self.files.len() {
                    self.selected += 1;
                }
                Action::None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                Action::None
            }
            KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => self.open_selected(),
            KeyCode::Char('r') => {
                self.last_scan = None;
                Action::None
            }
            KeyCode::Esc | KeyCode::Char('q') => {
                Action::Send(RelayMessage::new(Namespace::Diff, "escape"))
            }
            _ => Action::None,
        }
    }

    fn on_mouse(&mut self, mouse: MouseEvent, _area: Rect) -> Action {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) if mouse.row >= LIST_TOP => {
                let index = (mouse.row - LIST_TOP) as usize;
                if index < self.files.len() {
                    self.selected = index;
                    return self.open_selected();
                }
                Action::None
            }
            MouseEventKind::ScrollDown => self.on_key(KeyEvent::from(KeyCode::Down)),
            MouseEventKind::ScrollUp => self.on_key(KeyEvent::from(KeyCode::Up)),
            _ => Action::None,
        }
    }

    fn tick(&mut self, now: Instant) {
        let due = self
            .last_scan
            .map_or(true, |last| now.duration_since(last) >= RESCAN_INTERVAL);
        if due {
            self.rescan(now);
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let layout = Layout::vertical([Constraint::Length(LIST_TOP), Constraint::Min(0)])
            .split(frame.area());

        let title = match self.state.worktree_path {
            Some(_) => format!(" {} · {} changed", self.state.branch, self.files.len()),
            None => " no session".to_string(),
        };
        frame.render_widget(
            Paragraph::new(title)
                .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            layout[0],
        );

        if let Some(ref error) = self.error {
            frame.render_widget(
                Paragraph::new(format!(" {}", error)).style(Style::default().fg(Color::Red)),
                layout[1],
            );
            return;
        }

        let items: Vec<ListItem> = self
            .files
            .iter()
            .enumerate()
            .map(|(i, file)| {
                let line = Line::from(vec![
                    Span::styled(
                        format!(" {} ", file.status),
                        Style::default().fg(Self::file_color(file)),
                    ),
                    Span::raw(file.path.clone()),
                ]);
                let style = if i == self.selected {
                    Style::default().bg(Color::DarkGray)
                } else {
                    Style::default()
                };
                ListItem::new(line).style(style)
            })
            .collect();
        frame.render_widget(List::new(items), layout[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_with(paths: &[&str]) -> DiffList {
        let mut list = DiffList::new(Some(
            r#"{"sessionId":"s1","worktreePath":"/nonexistent","branch":"main"}"#,
        ))
        .unwrap();
        list.files = paths
            .iter()
            .map(|p| ChangedFile {
                path: p.to_string(),
                status: 'M',
                staged: false,
            })
            .collect();
        list
    }

    #[test]
    fn test_enter_opens_selected_file() {
        let mut list = list_with(&["a.rs", "b/c:d.rs"]);
        list.on_key(KeyEvent::from(KeyCode::Down));
        let Action::Send(message) = list.on_key(KeyEvent::from(KeyCode::Enter)) else {
            panic!("expected a message");
        };
        assert_eq!(message.namespace, Namespace::Diff);
        assert_eq!(message.action, "open");
        assert_eq!(message.data.as_deref(), Some("b/c:d.rs"));
    }

    #[test]
    fn test_selection_is_bounded() {
        let mut list = list_with(&["a.rs"]);
        list.on_key(KeyEvent::from(KeyCode::Down));
        list.on_key(KeyEvent::from(KeyCode::Down));
        assert_eq!(list.selected, 0);
        assert_eq!(list_with(&[]).open_selected(), Action::None);
    }

    #[test]
    fn test_render_push_switches_worktree() {
        let mut list = list_with(&["a.rs", "b.rs"]);
        list.selected = 1;
        list.apply_render(r#"{"sessionId":"s2","worktreePath":"/other","branch":"dev"}"#)
            .unwrap();
        assert_eq!(list.selected, 0);
        assert!(list.files.is_empty());
        assert_eq!(list.state.branch, "dev");
    }

    #[test]
    fn test_no_session_scans_nothing() {
        let mut list = DiffList::new(None).unwrap();
        list.tick(Instant::now());
        assert!(list.files.is_empty());
        assert!(list.error.is_none());
    }

    #[test]
    fn test_scans_real_worktree() {
        let dir = tempfile::tempdir().unwrap();
        git2::Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("new.txt"), "hi").unwrap();

        let json = serde_json::json!({
            "sessionId": "s1",
            "worktreePath": dir.path(),
            "branch": "main",
        })
        .to_string();
        let mut list = DiffList::new(Some(&json)).unwrap();
        list.tick(Instant::now());
        assert_eq!(list.files.len(), 1);
        assert_eq!(list.files[0].status, '?');
    }
}
