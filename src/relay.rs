//! Keystroke-relay protocol
//!
//! Satellites have no channel to the controller other than typing into its
//! pane. A message is three injections: `C-u` (clear the input line), the
//! literal line `\u{E000}NAMESPACE:action[:data]`, then `Enter`. The controller
//! pushes render state back the same way with `\u{E000}RENDER:<json>`.
//!
//! Every line starts with `SENTINEL`, a private-use code point no keyboard
//! produces. The decoder only captures after seeing it, so a human typing
//! `TERM:switch:2` into the sidebar is never mistaken for a message.

use std::fmt;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

use crate::tmux::{Multiplexer, MuxResult};

/// First character of every relayed line
pub const SENTINEL: char = '\u{E000}';

/// Key injected before a line to clear whatever was typed so far
pub const CLEAR_LINE_KEY: &str = "C-u";

const RENDER_TAG: &str = "RENDER";

/// Lines longer than this abort capture
const MAX_LINE_LEN: usize = 64 * 1024;

/// Satellite family a message comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Diff list (per-session changed files)
    Diff,
    /// Terminal tab bar
    Term,
    /// File-diff header/content view
    FileDiff,
}

impl Namespace {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Diff => "DIFF",
            Self::Term => "TERM",
            Self::FileDiff => "FDIFF",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "DIFF" => Some(Self::Diff),
            "TERM" => Some(Self::Term),
            "FDIFF" => Some(Self::FileDiff),
            _ => None,
        }
    }
}

/// A decoded satellite → controller message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    pub namespace: Namespace,
    pub action: String,
    pub data: Option<String>,
}

impl RelayMessage {
    pub fn new(namespace: Namespace, action: &str) -> Self {
        Self {
            namespace,
            action: action.to_string(),
            data: None,
        }
    }

    pub fn with_data(namespace: Namespace, action: &str, data: impl fmt::Display) -> Self {
        Self {
            namespace,
            action: action.to_string(),
            data: Some(data.to_string()),
        }
    }

    /// Parse a line body (sentinel already stripped): `NAMESPACE:action[:data]`.
    ///
    /// `data` may itself contain `:` (file paths).
    pub fn parse(body: &str) -> Option<Self> {
        let mut parts = body.splitn(3, ':');
        let namespace = Namespace::from_tag(parts.next()?)?;
        let action = parts.next().filter(|a| !a.is_empty())?;
        let data = parts.next().map(str::to_string);
        Some(Self {
            namespace,
            action: action.to_string(),
            data,
        })
    }

    /// The literal line to inject, sentinel included
    pub fn encode(&self) -> String {
        match self.data {
            Some(ref data) => format!("{}{}:{}:{}", SENTINEL, self.namespace.tag(), self.action, data),
            None => format!("{}{}:{}", SENTINEL, self.namespace.tag(), self.action),
        }
    }

    /// `data` parsed as an index, for `switch:<i>` / `delete:<i>`
    pub fn index(&self) -> Option<usize> {
        self.data.as_deref()?.trim().parse().ok()
    }
}

/// Encode a controller → satellite render push
pub fn render_line(json: &str) -> String {
    format!("{}{}:{}", SENTINEL, RENDER_TAG, json)
}

/// Extract the JSON payload of a render push body (sentinel already stripped)
pub fn render_payload(body: &str) -> Option<&str> {
    body.strip_prefix(RENDER_TAG)?.strip_prefix(':')
}

/// Deliver one line into `pane` as clear-line, literal text, Enter
pub fn inject<M: Multiplexer + ?Sized>(mux: &M, pane: &str, line: &str) -> MuxResult<()> {
    mux.send_key(pane, CLEAR_LINE_KEY)?;
    mux.send_literal(pane, line, false)?;
    mux.send_key(pane, "Enter")
}

/// Send a message to the controller, dropping it if the controller pane is gone.
///
/// There is no acknowledgement and no retry.
pub fn notify<M: Multiplexer + ?Sized>(mux: &M, controller: &str, message: &RelayMessage) {
    if let Err(e) = inject(mux, controller, &message.encode()) {
        debug!(%controller, error = %e, "dropping relay message");
    }
}

/// Result of feeding one key into a `LineDecoder`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Not part of a relayed line, handle as a normal keystroke
    Pass,
    /// Swallowed into the line being captured
    Pending,
    /// A complete line body, sentinel stripped
    Line(String),
}

#[derive(Debug, Default)]
enum Capture {
    #[default]
    Idle,
    Line(String),
    /// Line exceeded `MAX_LINE_LEN`; its remaining keys are dropped until
    /// the line ends
    Overflowed,
}

/// Reassembles relayed lines out of a key event stream
#[derive(Debug, Default)]
pub struct LineDecoder {
    capture: Capture,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a line is currently being captured
    pub fn is_capturing(&self) -> bool {
        !matches!(self.capture, Capture::Idle)
    }

    pub fn feed(&mut self, key: &KeyEvent) -> Decoded {
        let clear_line =
            matches!(key.code, KeyCode::Char('u')) && key.modifiers.contains(KeyModifiers::CONTROL);

        match &mut self.capture {
            Capture::Idle => match key.code {
                KeyCode::Char(SENTINEL) => {
                    self.capture = Capture::Line(String::new());
                    Decoded::Pending
                }
                _ => Decoded::Pass,
            },
            Capture::Overflowed => {
                if key.code == KeyCode::Esc || clear_line {
                    self.capture = Capture::Idle;
                    return Decoded::Pass;
                }
                if key.code == KeyCode::Enter {
                    self.capture = Capture::Idle;
                }
                Decoded::Pending
            }
            Capture::Line(buffer) => match key.code {
                KeyCode::Enter => match std::mem::take(&mut self.capture) {
                    Capture::Line(line) => Decoded::Line(line),
                    _ => Decoded::Pending,
                },
                KeyCode::Esc => {
                    self.capture = Capture::Idle;
                    Decoded::Pass
                }
                KeyCode::Char(_) if clear_line => {
                    self.capture = Capture::Idle;
                    Decoded::Pass
                }
                KeyCode::Char(c) => {
                    buffer.push(c);
                    if buffer.len() > MAX_LINE_LEN {
                        debug!("relay line too long, dropping the rest of it");
                        self.capture = Capture::Overflowed;
                    }
                    Decoded::Pending
                }
                _ => Decoded::Pending,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmux::fake::{FakeTmux, Op};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_line(decoder: &mut LineDecoder, line: &str) -> Vec<Decoded> {
        let mut out: Vec<Decoded> = line
            .chars()
            .map(|c| decoder.feed(&key(KeyCode::Char(c))))
            .collect();
        out.push(decoder.feed(&key(KeyCode::Enter)));
        out
    }

    #[test]
    fn test_parse_term_switch() {
        let msg = RelayMessage::parse("TERM:switch:2").unwrap();
        assert_eq!(msg.namespace, Namespace::Term);
        assert_eq!(msg.action, "switch");
        assert_eq!(msg.data.as_deref(), Some("2"));
        assert_eq!(msg.index(), Some(2));
    }

    #[test]
    fn test_parse_without_data() {
        let msg = RelayMessage::parse("TERM:new").unwrap();
        assert_eq!(msg.action, "new");
        assert_eq!(msg.data, None);
    }

    #[test]
    fn test_data_keeps_colons() {
        let msg = RelayMessage::parse("DIFF:open:src/a:b.rs").unwrap();
        assert_eq!(msg.namespace, Namespace::Diff);
        assert_eq!(msg.data.as_deref(), Some("src/a:b.rs"));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(RelayMessage::parse("NOPE:switch:1"), None);
        assert_eq!(RelayMessage::parse("TERM"), None);
        assert_eq!(RelayMessage::parse("TERM:"), None);
    }

    #[test]
    fn test_round_trip_through_decoder() {
        for namespace in [Namespace::Term, Namespace::Diff, Namespace::FileDiff] {
            let sent = RelayMessage::with_data(namespace, "switch", 2);
            let mut decoder = LineDecoder::new();
            let decoded = type_line(&mut decoder, &sent.encode());
            let Some(Decoded::Line(body)) = decoded.last().cloned() else {
                panic!("no line decoded");
            };
            assert_eq!(RelayMessage::parse(&body), Some(sent));
        }
    }

    #[test]
    fn test_human_typing_passes_through() {
        let mut decoder = LineDecoder::new();
        let decoded = type_line(&mut decoder, "TERM:switch:2");
        assert!(decoded.iter().all(|d| *d == Decoded::Pass));
        assert!(!decoder.is_capturing());
    }

    #[test]
    fn test_escape_aborts_capture() {
        let mut decoder = LineDecoder::new();
        decoder.feed(&key(KeyCode::Char(SENTINEL)));
        decoder.feed(&key(KeyCode::Char('T')));
        assert_eq!(decoder.feed(&key(KeyCode::Esc)), Decoded::Pass);
        assert_eq!(decoder.feed(&key(KeyCode::Char('j'))), Decoded::Pass);
    }

    #[test]
    fn test_oversize_line_is_swallowed_until_enter() {
        let mut decoder = LineDecoder::new();
        decoder.feed(&key(KeyCode::Char(SENTINEL)));
        for _ in 0..=MAX_LINE_LEN {
            assert_eq!(decoder.feed(&key(KeyCode::Char('a'))), Decoded::Pending);
        }
        assert!(decoder.is_capturing());

        // Tail of the relayed line must not reach the key handlers
        assert_eq!(decoder.feed(&key(KeyCode::Char('x'))), Decoded::Pending);
        assert_eq!(decoder.feed(&key(KeyCode::Char('k'))), Decoded::Pending);
        assert_eq!(decoder.feed(&key(KeyCode::Enter)), Decoded::Pending);

        assert!(!decoder.is_capturing());
        assert_eq!(decoder.feed(&key(KeyCode::Char('j'))), Decoded::Pass);
        let line = type_line(&mut decoder, &RelayMessage::new(Namespace::Term, "new").encode());
        assert_eq!(line.last(), Some(&Decoded::Line("TERM:new".to_string())));
    }

    #[test]
    fn test_escape_ends_oversize_line() {
        let mut decoder = LineDecoder::new();
        decoder.feed(&key(KeyCode::Char(SENTINEL)));
        for _ in 0..=MAX_LINE_LEN {
            decoder.feed(&key(KeyCode::Char('a')));
        }
        assert_eq!(decoder.feed(&key(KeyCode::Esc)), Decoded::Pass);
        assert_eq!(decoder.feed(&key(KeyCode::Char('q'))), Decoded::Pass);
    }

    #[test]
    fn test_clear_line_resets_partial_capture() {
        let mut decoder = LineDecoder::new();
        decoder.feed(&key(KeyCode::Char(SENTINEL)));
        decoder.feed(&key(KeyCode::Char('x')));
        let clear = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL);
        assert_eq!(decoder.feed(&clear), Decoded::Pass);

        let line = type_line(&mut decoder, &RelayMessage::new(Namespace::Term, "new").encode());
        assert_eq!(line.last(), Some(&Decoded::Line("TERM:new".to_string())));
    }

    #[test]
    fn test_render_payload() {
        let line = render_line(r#"{"activeIndex":1}"#);
        let body = line.strip_prefix(SENTINEL).unwrap();
        assert_eq!(render_payload(body), Some(r#"{"activeIndex":1}"#));
        assert_eq!(render_payload("TERM:new"), None);
    }

    #[test]
    fn test_inject_is_three_sends_in_order() {
        let (fake, pane) = FakeTmux::with_sidebar();
        inject(&fake, &pane, "\u{E000}TERM:focus").unwrap();
        assert_eq!(
            fake.ops(),
            vec![
                Op::Key {
                    pane: pane.clone(),
                    key: "C-u".to_string()
                },
                Op::Literal {
                    pane: pane.clone(),
                    text: "\u{E000}TERM:focus".to_string()
                },
                Op::Key {
                    pane,
                    key: "Enter".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_notify_swallows_missing_controller() {
        let (fake, _) = FakeTmux::with_sidebar();
        notify(&fake, "%99", &RelayMessage::new(Namespace::Term, "new"));
        assert_eq!(fake.ops().len(), 1);
    }
}
