//! Satellite process lifecycle
//!
//! Satellites are subcommands of this same binary started inside their own
//! panes. They get their initial state as a JSON startup argument; later
//! state is pushed by typing a `RENDER:<json>` line into their pane.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::relay;
use crate::tmux::{Multiplexer, MuxResult, PaneId, Tolerate};

/// Which companion program runs in a pane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatelliteKind {
    TermBar,
    DiffList,
    FileDiffHeader,
    FileDiffContent,
}

impl SatelliteKind {
    pub fn subcommand(self) -> &'static str {
        match self {
            Self::TermBar => "term-bar",
            Self::DiffList => "diff-list",
            Self::FileDiffHeader => "file-diff-header",
            Self::FileDiffContent => "file-diff",
        }
    }

    pub fn from_subcommand(name: &str) -> Option<Self> {
        match name {
            "term-bar" => Some(Self::TermBar),
            "diff-list" => Some(Self::DiffList),
            "file-diff-header" => Some(Self::FileDiffHeader),
            "file-diff" => Some(Self::FileDiffContent),
            _ => None,
        }
    }
}

/// One tab in the terminal bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermTab {
    pub id: String,
    pub title: String,
}

/// Tab-bar state: `{ terminals, activeIndex }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermBarState {
    pub terminals: Vec<TermTab>,
    pub active_index: usize,
}

/// Diff-list state: which worktree to scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffListState {
    pub session_id: Option<String>,
    pub worktree_path: Option<PathBuf>,
    pub branch: String,
}

/// File-diff header/content state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiffState {
    pub worktree_path: PathBuf,
    pub file: String,
}

/// Starts satellites in panes and pushes state into them
#[derive(Debug, Clone)]
pub struct Satellites {
    /// Path of this binary, if it could be resolved
    program: Option<PathBuf>,
    /// Pane satellites relay their messages to
    controller_pane: PaneId,
}

impl Satellites {
    pub fn new(program: Option<PathBuf>, controller_pane: &str) -> Self {
        Self {
            program,
            controller_pane: controller_pane.to_string(),
        }
    }

    pub fn controller_pane(&self) -> &str {
        &self.controller_pane
    }

    /// Shell command line that starts `kind` for `owner` with `state`
    pub fn command_line<S: Serialize>(
        &self,
        kind: SatelliteKind,
        owner: &str,
        state: &S,
    ) -> Option<String> {
        let program = self.program.as_ref().filter(|p| p.exists())?;
        let json = match serde_json::to_string(state) {
            Ok(json) => json,
            Err(e) => {
                error!(kind = kind.subcommand(), error = %e, "failed to serialize satellite state");
                return None;
            }
        };
        let program = program.to_string_lossy();
        Some(shell_words::join([
            &*program,
            kind.subcommand(),
            self.controller_pane.as_str(),
            owner,
            json.as_str(),
        ]))
    }

    /// Start `kind` in `pane`. Returns false if the satellite is unavailable.
    pub fn spawn<M: Multiplexer + ?Sized, S: Serialize>(
        &self,
        mux: &M,
        pane: &str,
        kind: SatelliteKind,
        owner: &str,
        state: &S,
    ) -> MuxResult<bool> {
        let Some(command) = self.command_line(kind, owner, state) else {
            error!(
                kind = kind.subcommand(),
                program = ?self.program,
                "satellite program not found, not spawning"
            );
            return Ok(false);
        };
        Ok(mux.respawn_pane(pane, &command).tolerate()?.is_some())
    }

    /// Push fresh render state into a running satellite
    pub fn push<M: Multiplexer + ?Sized, S: Serialize>(
        &self,
        mux: &M,
        pane: &str,
        state: &S,
    ) -> MuxResult<()> {
        let json = match serde_json::to_string(state) {
            Ok(json) => json,
            Err(e) => {
                warn!(%pane, error = %e, "failed to serialize render state");
                return Ok(());
            }
        };
        relay::inject(mux, pane, &relay::render_line(&json)).tolerate()?;
        Ok(())
    }
}
