//! Terminal tab bar
//!
//! One row of tabs above the visible terminal. Every change is requested
//! from the controller; the bar only redraws what the controller pushes.

use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::relay::{Namespace, RelayMessage};
use crate::satellite::TermBarState;

use super::{initial_state, Action, Satellite};

const SEPARATOR: &str = "│";
const NEW_TAB: &str = " + ";

/// What a click at a column hits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hit {
    Tab(usize),
    New,
}

pub struct TermBar {
    state: TermBarState,
}

impl TermBar {
    pub fn new(json: Option<&str>) -> Result<Self> {
        Ok(Self {
            state: initial_state(json)?,
        })
    }

    #[cfg(test)]
    pub fn state(&self) -> &TermBarState {
        &self.state
    }

    fn label(index: usize, title: &str) -> String {
        format!(" {} {} ", index + 1, title)
    }

    /// Column ranges of each tab, then the `+` button
    fn hit(&self, column: u16) -> Option<Hit> {
        let column = column as usize;
        let mut x = 0;
        for (i, tab) in self.state.terminals.iter().enumerate() {
            let width = Self::label(i, &tab.title).width();
            if column >= x && column < x + width {
                return Some(Hit::Tab(i));
            }
            x += width + SEPARATOR.width();
        }
        (column >= x && column < x + NEW_TAB.width()).then_some(Hit::New)
    }

    fn send(action: &str) -> Action {
        Action::Send(RelayMessage::new(Namespace::Term, action))
    }

    fn send_index(action: &str, index: usize) -> Action {
        Action::Send(RelayMessage::with_data(Namespace::Term, action, index))
    }

    fn switch(&self, index: usize) -> Action {
        if index < self.state.terminals.len() && index != self.state.active_index {
            Self::send_index("switch", index)
        } else {
            Action::None
        }
    }
}

impl Satellite for TermBar {
    fn apply_render(&mut self, json: &str) -> Result<()> {
        self.state = serde_json::from_str(json).context("Failed to parse tab state")?;
        Ok(())
    }

    fn on_key(&mut self, key: KeyEvent) -> Action {
        let count = self.state.terminals.len();
        let active = self.state.active_index;
        match key.code {
            KeyCode::Char(c @ '1'..='9') => self.switch(c as usize - '1' as usize),
            KeyCode::Char('h') | KeyCode::Left if count > 0 => {
                self.switch((active + count - 1) % count)
            }
            KeyCode::Char('l') | KeyCode::Right if count > 0 => self.switch((active + 1) % count),
            KeyCode::Char('n') => Self::send("new"),
            KeyCode::Char('x') if count > 0 => Self::send_index("delete", active),
            KeyCode::Enter | KeyCode::Char('j') | KeyCode::Down => Self::send("focus"),
            KeyCode::Esc => Self::send("escape"),
            _ => Action::None,
        }
    }

    fn on_mouse(&mut self, mouse: MouseEvent, _area: Rect) -> Action {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return Action::None;
        }
        match self.hit(mouse.column) {
            Some(Hit::Tab(i)) if i == self.state.active_index => Self::send("focus"),
            Some(Hit::Tab(i)) => self.switch(i),
            Some(Hit::New) => Self::send("new"),
            None => Action::None,
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let mut spans = Vec::new();
        for (i, tab) in self.state.terminals.iter().enumerate() {
            let style = if i == self.state.active_index {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            spans.push(Span::styled(Self::label(i, &tab.title), style));
            spans.push(Span::styled(SEPARATOR, Style::default().fg(Color::DarkGray)));
        }
        spans.push(Span::styled(NEW_TAB, Style::default().fg(Color::Green)));

        frame.render_widget(Paragraph::new(Line::from(spans)), frame.area());
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyModifiers;

    use super::*;

    fn bar(count: usize, active: usize) -> TermBar {
        let terminals: Vec<String> = (0..count)
            .map(|i| format!(r#"{{"id":"t{}","title":"sh"}}"#, i))
            .collect();
        let json = format!(
            r#"{{"terminals":[{}],"activeIndex":{}}}"#,
            terminals.join(","),
            active
        );
        TermBar::new(Some(&json)).unwrap()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn sent(action: Action) -> Option<String> {
        match action {
            Action::Send(message) => Some(message.encode().chars().skip(1).collect()),
            _ => None,
        }
    }

    #[test]
    fn test_number_keys_switch() {
        let mut bar = bar(3, 0);
        assert_eq!(sent(bar.on_key(key(KeyCode::Char('3')))).as_deref(), Some("TERM:switch:2"));
        assert_eq!(bar.on_key(key(KeyCode::Char('1'))), Action::None);
        assert_eq!(bar.on_key(key(KeyCode::Char('9'))), Action::None);
    }

    #[test]
    fn test_cycling_wraps() {
        let mut bar = bar(3, 0);
        assert_eq!(sent(bar.on_key(key(KeyCode::Char('h')))).as_deref(), Some("TERM:switch:2"));
        assert_eq!(sent(bar.on_key(key(KeyCode::Right))).as_deref(), Some("TERM:switch:1"));
    }

    #[test]
    fn test_new_delete_focus_escape() {
        let mut bar = bar(2, 1);
        assert_eq!(sent(bar.on_key(key(KeyCode::Char('n')))).as_deref(), Some("TERM:new"));
        assert_eq!(sent(bar.on_key(key(KeyCode::Char('x')))).as_deref(), Some("TERM:delete:1"));
        assert_eq!(sent(bar.on_key(key(KeyCode::Enter))).as_deref(), Some("TERM:focus"));
        assert_eq!(sent(bar.on_key(key(KeyCode::Esc))).as_deref(), Some("TERM:escape"));
    }

    #[test]
    fn test_empty_bar_ignores_delete() {
        let mut bar = bar(0, 0);
        assert_eq!(bar.on_key(key(KeyCode::Char('x'))), Action::None);
        assert_eq!(bar.on_key(key(KeyCode::Char('h'))), Action::None);
    }

    #[test]
    fn test_click_hit_testing() {
        // " 1 sh " (6) "│" " 2 sh " (6) "│" " + "
        let bar = bar(2, 0);
        assert_eq!(bar.hit(0), Some(Hit::Tab(0)));
        assert_eq!(bar.hit(5), Some(Hit::Tab(0)));
        assert_eq!(bar.hit(7), Some(Hit::Tab(1)));
        assert_eq!(bar.hit(14), Some(Hit::New));
        assert_eq!(bar.hit(30), None);
    }

    #[test]
    fn test_click_sends_switch() {
        let mut bar = bar(2, 0);
        let click = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 8,
            row: 0,
            modifiers: KeyModifiers::NONE,
        };
        let area = Rect::new(0, 0, 80, 1);
        assert_eq!(sent(bar.on_mouse(click, area)).as_deref(), Some("TERM:switch:1"));
        let on_active = MouseEvent { column: 1, ..click };
        assert_eq!(sent(bar.on_mouse(on_active, area)).as_deref(), Some("TERM:focus"));
    }
}
