//! File-diff view: a one-row header above the scrollable diff content

use anyhow::{Context, Result};
use ansi_to_tui::IntoText;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::Paragraph,
    Frame,
};
use tracing::warn;

use crate::git;
use crate::relay::{Namespace, RelayMessage};
use crate::satellite::FileDiffState;

use super::{initial_state, Action, Satellite};

fn close() -> Action {
    Action::Send(RelayMessage::new(Namespace::FileDiff, "close"))
}

fn escape() -> Action {
    Action::Send(RelayMessage::new(Namespace::FileDiff, "escape"))
}

pub struct FileDiffHeader {
    state: FileDiffState,
}

impl FileDiffHeader {
    pub fn new(json: Option<&str>) -> Result<Self> {
        Ok(Self {
            state: initial_state(json)?,
        })
    }
}

impl Satellite for FileDiffHeader {
    fn apply_render(&mut self, json: &str) -> Result<()> {
        self.state = serde_json::from_str(json).context("Failed to parse file diff state")?;
        Ok(())
    }

    fn on_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('x') => close(),
            KeyCode::Esc => escape(),
            _ => Action::None,
        }
    }

    fn on_mouse(&mut self, mouse: MouseEvent, area: Rect) -> Action {
        // The `✕` sits in the last columns
        if matches!(mouse.kind, MouseEventKind::Down(_)) && mouse.column + 3 >= area.width {
            return close();
        }
        Action::None
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let hint = " q close ✕ ";
        let path = format!(" {}", self.state.file);
        let fill = (area.width as usize).saturating_sub(path.chars().count() + hint.chars().count());

        let line = Line::from(vec![
            Span::styled(path, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::raw(" ".repeat(fill)),
            Span::styled(hint, Style::default().fg(Color::DarkGray)),
        ]);
        frame.render_widget(
            Paragraph::new(line).style(Style::default().bg(Color::Black)),
            area,
        );
    }
}

pub struct FileDiffContent {
    state: FileDiffState,
    text: Text<'static>,
    scroll: u16,
    /// Rows visible at the last draw, for paging
    page: u16,
}

impl FileDiffContent {
    pub fn new(json: Option<&str>) -> Result<Self> {
        let mut content = Self {
            state: initial_state(json)?,
            text: Text::default(),
            scroll: 0,
            page: 20,
        };
        content.reload();
        Ok(content)
    }

    fn reload(&mut self) {
        if self.state.file.is_empty() {
            self.text = Text::raw("No file selected");
            return;
        }
        self.text = match git::diff_text(&self.state.worktree_path, &self.state.file) {
            Ok(diff) if diff.trim().is_empty() => Text::raw("No changes"),
            Ok(diff) => diff.into_text().unwrap_or_else(|_| Text::raw(diff)),
            Err(e) => {
                warn!(file = %self.state.file, error = %e, "git diff failed");
                Text::raw(format!("{:#}", e))
            }
        };
        self.clamp_scroll();
    }

    fn max_scroll(&self) -> u16 {
        (self.text.lines.len() as u16).saturating_sub(1)
    }

    fn clamp_scroll(&mut self) {
        self.scroll = self.scroll.min(self.max_scroll());
    }

    fn scroll_by(&mut self, delta: i32) {
        let next = (self.scroll as i32 + delta).max(0);
        self.scroll = (next as u16).min(self.max_scroll());
    }
}

impl Satellite for FileDiffContent {
    fn apply_render(&mut self, json: &str) -> Result<()> {
        let state: FileDiffState =
            serde_json::from_str(json).context("Failed to parse file diff state")?;
        if state != self.state {
            self.state = state;
            self.scroll = 0;
        }
        self.reload();
        Ok(())
    }

    fn on_key(&mut self, key: KeyEvent) -> Action {
        let page = self.page.max(1) as i32;
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.scroll_by(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_by(-1),
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.scroll_by(page / 2)
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.scroll_by(-page / 2)
            }
            KeyCode::PageDown | KeyCode::Char(' ') => self.scroll_by(page),
            KeyCode::PageUp => self.scroll_by(-page),
            KeyCode::Char('g') | KeyCode::Home => self.scroll = 0,
            KeyCode::Char('G') | KeyCode::End => self.scroll = self.max_scroll(),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('h') | KeyCode::Left => {
                return Action::Send(RelayMessage::new(Namespace::Diff, "focus"))
            }
            KeyCode::Char('q') => return close(),
            KeyCode::Esc => return escape(),
            _ => {}
        }
        Action::None
    }

    fn on_mouse(&mut self, mouse: MouseEvent, _area: Rect) -> Action {
        match mouse.kind {
            MouseEventKind::ScrollDown => self.scroll_by(3),
            MouseEventKind::ScrollUp => self.scroll_by(-3),
            _ => {}
        }
        Action::None
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        self.page = area.height;
        let paragraph = Paragraph::new(self.text.clone()).scroll((self.scroll, 0));
        frame.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_with_lines(n: usize) -> FileDiffContent {
        let mut content = FileDiffContent::new(None).unwrap();
        content.text = Text::raw(
            (0..n)
                .map(|i| format!("line {}", i))
                .collect::<Vec<_>>()
                .join("\n"),
        );
        content
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut content = content_with_lines(10);
        content.on_key(KeyEvent::from(KeyCode::Up));
        assert_eq!(content.scroll, 0);
        content.on_key(KeyEvent::from(KeyCode::Char('G')));
        assert_eq!(content.scroll, 9);
        content.on_key(KeyEvent::from(KeyCode::PageDown));
        assert_eq!(content.scroll, 9);
        content.on_key(KeyEvent::from(KeyCode::Char('g')));
        assert_eq!(content.scroll, 0);
    }

    #[test]
    fn test_close_and_escape_messages() {
        let mut content = content_with_lines(1);
        let Action::Send(message) = content.on_key(KeyEvent::from(KeyCode::Char('q'))) else {
            panic!("expected close");
        };
        assert_eq!(message.encode(), "\u{E000}FDIFF:close");

        let mut header = FileDiffHeader::new(None).unwrap();
        let Action::Send(message) = header.on_key(KeyEvent::from(KeyCode::Esc)) else {
            panic!("expected escape");
        };
        assert_eq!(message.action, "escape");
    }

    #[test]
    fn test_diff_of_untracked_file() {
        let dir = tempfile::tempdir().unwrap();
        git2::Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\n").unwrap();

        let json = serde_json::json!({ "worktreePath": dir.path(), "file": "a.txt" }).to_string();
        let content = FileDiffContent::new(Some(&json)).unwrap();
        let rendered: String = content
            .text
            .lines
            .iter()
            .flat_map(|l| l.spans.iter().map(|s| s.content.to_string()))
            .collect();
        assert!(rendered.contains("two"));
    }
}
