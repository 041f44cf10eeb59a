//! Satellite programs
//!
//! Small single-purpose TUIs that run in their own panes:
//! - `term_bar`: terminal tabs of one session
//! - `diff_list`: changed files of the active worktree
//! - `file_diff`: one-row header and scrollable content of a file diff
//!
//! They share one event loop. Input that is not part of a relayed `RENDER`
//! line goes to the satellite, which answers with an `Action`; messages for
//! the controller are sent with the relay protocol.

mod diff_list;
mod file_diff;
mod term_bar;

use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyEvent, KeyEventKind, MouseEvent,
    },
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{layout::Rect, prelude::CrosstermBackend, Frame, Terminal};
use tracing::{debug, info, warn};

use crate::relay::{self, Decoded, LineDecoder, RelayMessage};
use crate::satellite::SatelliteKind;
use crate::signals;
use crate::tmux::Tmux;

use diff_list::DiffList;
use file_diff::{FileDiffContent, FileDiffHeader};
use term_bar::TermBar;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What the event loop should do after an input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Send(RelayMessage),
    Quit,
}

pub trait Satellite {
    /// Replace the render state with a pushed JSON payload
    fn apply_render(&mut self, json: &str) -> Result<()>;

    fn on_key(&mut self, key: KeyEvent) -> Action;

    fn on_mouse(&mut self, _mouse: MouseEvent, _area: Rect) -> Action {
        Action::None
    }

    /// Periodic work (polling git, ...)
    fn tick(&mut self, _now: Instant) {}

    fn draw(&mut self, frame: &mut Frame);
}

/// Raw mode, alternate screen and mouse reporting for as long as it lives
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn enter() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let guard = Self;
        stdout().execute(EnterAlternateScreen)?;
        stdout().execute(EnableMouseCapture)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = stdout().execute(DisableMouseCapture);
        let _ = stdout().execute(LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Entry point for `<binary> <subcommand> <controller-pane> <owner> [json]`
pub fn run(kind: SatelliteKind, args: &[String]) -> Result<()> {
    let [controller, owner, rest @ ..] = args else {
        bail!(
            "usage: claude-panes {} <controller-pane> <owner> [state-json]",
            kind.subcommand()
        );
    };
    let state = rest.first().map(String::as_str);
    info!(kind = kind.subcommand(), %controller, %owner, "satellite starting");

    match kind {
        SatelliteKind::TermBar => event_loop(TermBar::new(state)?, controller),
        SatelliteKind::DiffList => event_loop(DiffList::new(state)?, controller),
        SatelliteKind::FileDiffHeader => event_loop(FileDiffHeader::new(state)?, controller),
        SatelliteKind::FileDiffContent => event_loop(FileDiffContent::new(state)?, controller),
    }
}

fn event_loop<S: Satellite>(mut satellite: S, controller: &str) -> Result<()> {
    let _guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let result = drive(&mut satellite, &mut terminal, controller);
    info!("satellite exiting");
    result
}

fn drive<S: Satellite>(
    satellite: &mut S,
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    controller: &str,
) -> Result<()> {
    let mux = Tmux;
    let mut decoder = LineDecoder::new();

    while !signals::requested() {
        satellite.tick(Instant::now());
        terminal.draw(|frame| satellite.draw(frame))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let action = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => match decoder.feed(&key) {
                Decoded::Line(body) => {
                    apply_line(satellite, &body);
                    Action::None
                }
                Decoded::Pending => Action::None,
                Decoded::Pass => satellite.on_key(key),
            },
            Event::Mouse(mouse) => {
                let size = terminal.size()?;
                satellite.on_mouse(mouse, Rect::new(0, 0, size.width, size.height))
            }
            _ => Action::None,
        };

        match action {
            Action::None => {}
            Action::Send(message) => relay::notify(&mux, controller, &message),
            Action::Quit => break,
        }
    }
    Ok(())
}

fn apply_line<S: Satellite>(satellite: &mut S, body: &str) {
    let Some(json) = relay::render_payload(body) else {
        debug!(%body, "ignoring non-render line");
        return;
    };
    if let Err(e) = satellite.apply_render(json) {
        warn!(error = %e, "bad render push");
    }
}

/// Parse an optional startup state, defaulting when absent
fn initial_state<T: serde::de::DeserializeOwned + Default>(json: Option<&str>) -> Result<T> {
    match json {
        Some(json) if !json.trim().is_empty() => {
            serde_json::from_str(json).context("Failed to parse startup state")
        }
        _ => Ok(T::default()),
    }
}
