//! Multiplexer command layer
//!
//! Thin, stateless wrappers around the multiplexer's pane operations:
//! - `Multiplexer`: the operations orchestration needs, keyed by opaque pane ids
//! - `Tmux`: the `tmux` CLI backend
//! - `MuxError` / `Tolerate`: "pane already gone" is an expected outcome, only
//!   a missing multiplexer binary is fatal

mod cli;
#[cfg(test)]
pub mod fake;

use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

pub use cli::Tmux;

/// Pane identifier assigned by the multiplexer (`%12` for tmux)
pub type PaneId = String;

/// Failure of a single multiplexer command
#[derive(Debug, Error)]
pub enum MuxError {
    /// The target pane/window was already cleaned up by a concurrent transition
    #[error("target {0} no longer exists")]
    TargetGone(String),
    /// The multiplexer refused the command for another reason (e.g. pane too small)
    #[error("`tmux {command}` failed: {stderr}")]
    Rejected { command: String, stderr: String },
    /// The multiplexer binary could not be executed at all
    #[error("tmux is unavailable: {0}")]
    ToolUnavailable(#[from] std::io::Error),
}

pub type MuxResult<T> = Result<T, MuxError>;

/// Downgrade the expected failure kinds to `None`, keeping only the fatal one.
pub trait Tolerate<T> {
    fn tolerate(self) -> MuxResult<Option<T>>;
}

impl<T> Tolerate<T> for MuxResult<T> {
    fn tolerate(self) -> MuxResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(MuxError::TargetGone(target)) => {
                debug!(%target, "ignoring operation on vanished target");
                Ok(None)
            }
            Err(MuxError::Rejected { command, stderr }) => {
                warn!(%command, %stderr, "tmux rejected command");
                Ok(None)
            }
            Err(e @ MuxError::ToolUnavailable(_)) => Err(e),
        }
    }
}

/// Axis along which a new pane is placed next to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Side by side (`-h`)
    Horizontal,
    /// Stacked (`-v`)
    Vertical,
}

/// Size of a newly placed pane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    Percent(u16),
    Cells(u16),
}

/// Where a split or join puts the pane relative to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub direction: Direction,
    pub size: Option<Size>,
    /// Place before (left of / above) the target instead of after it
    pub before: bool,
    /// Span the whole window edge instead of only the target's cell (`-f`)
    pub full_span: bool,
}

impl Placement {
    pub fn right(size: Option<Size>) -> Self {
        Self {
            direction: Direction::Horizontal,
            size,
            before: false,
            full_span: false,
        }
    }

    pub fn below(size: Option<Size>) -> Self {
        Self {
            direction: Direction::Vertical,
            size,
            before: false,
            full_span: false,
        }
    }

    pub fn above(size: Option<Size>) -> Self {
        Self {
            direction: Direction::Vertical,
            size,
            before: true,
            full_span: false,
        }
    }

    /// Split against the full window height (or width) rather than the
    /// target's cell, so panes stacked next to the target stay in their column
    pub fn full_span(mut self) -> Self {
        self.full_span = true;
        self
    }
}

/// Pane operations the orchestrator issues against the multiplexer.
///
/// Every call is synchronous and targets ids the multiplexer assigned. No
/// operation is transactional; callers treat `TargetGone` as a normal outcome.
pub trait Multiplexer {
    /// Create a pane in a new, detached background window
    fn create_pane(&self, cwd: &Path, command: Option<&str>) -> MuxResult<PaneId>;

    /// Split `target`, returning the id of the new sibling pane
    fn split_pane(
        &self,
        target: &str,
        placement: Placement,
        cwd: Option<&Path>,
        command: Option<&str>,
    ) -> MuxResult<PaneId>;

    fn resize_pane(&self, pane: &str, width: Option<u16>, height: Option<u16>) -> MuxResult<()>;

    fn select_pane(&self, pane: &str) -> MuxResult<()>;

    /// Type `text` literally into `pane`, optionally followed by Enter
    fn send_literal(&self, pane: &str, text: &str, enter: bool) -> MuxResult<()>;

    /// Send a single named key (`C-u`, `Enter`, ...)
    fn send_key(&self, pane: &str, key: &str) -> MuxResult<()>;

    /// Move `pane` into its own background window. The id is kept.
    fn break_pane(&self, pane: &str) -> MuxResult<()>;

    /// Move a background pane next to `target` in target's window
    fn join_pane(&self, source: &str, target: &str, placement: Placement) -> MuxResult<()>;

    fn kill_pane(&self, pane: &str) -> MuxResult<()>;

    /// Replace whatever runs in `pane` with `command`
    fn respawn_pane(&self, pane: &str, command: &str) -> MuxResult<()>;

    fn set_hook(&self, hook: &str, command: &str) -> MuxResult<()>;

    fn remove_hook(&self, hook: &str) -> MuxResult<()>;

    fn bind_key(&self, table: &str, key: &str, command: &str) -> MuxResult<()>;

    fn unbind_key(&self, table: &str, key: &str) -> MuxResult<()>;

    /// Current (width, height) of a pane
    fn pane_size(&self, pane: &str) -> MuxResult<(u16, u16)>;

    fn global_option(&self, name: &str) -> MuxResult<Option<String>>;

    fn set_global_option(&self, name: &str, value: &str) -> MuxResult<()>;

    fn unset_global_option(&self, name: &str) -> MuxResult<()>;

    /// Last `lines` non-empty lines of a pane's visible content
    fn capture_pane(&self, pane: &str, lines: usize) -> MuxResult<String>;

    fn detach_client(&self) -> MuxResult<()>;

    /// Kill the multiplexer session the caller runs in
    fn kill_session(&self) -> MuxResult<()>;
}
