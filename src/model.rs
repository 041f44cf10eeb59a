//! Controller's in-memory model of worktrees, sessions and terminals

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::satellite::{TermBarState, TermTab};
use crate::tmux::PaneId;

/// A working copy checked out on its own branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worktree {
    pub id: String,
    pub path: PathBuf,
    pub branch: String,
    /// The original checkout; never deleted
    pub is_primary: bool,
}

/// An auxiliary shell pane belonging to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    pub id: String,
    pub session_id: String,
    pub pane_id: PaneId,
    pub title: String,
    pub created: u64,
}

/// One coding-agent conversation bound to a worktree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub worktree_id: String,
    /// Pane running the agent
    pub pane_id: PaneId,
    pub title: String,
    pub created: u64,
    pub terminals: Vec<Terminal>,
    pub active_terminal: usize,
    /// Tab-bar satellite pane, present once the first terminal exists
    pub bar_pane: Option<PaneId>,
}

impl Session {
    pub fn active_terminal(&self) -> Option<&Terminal> {
        self.terminals.get(self.active_terminal)
    }

    pub fn active_terminal_pane(&self) -> Option<PaneId> {
        self.active_terminal().map(|t| t.pane_id.clone())
    }

    /// Render state for the tab-bar satellite
    pub fn tab_state(&self) -> TermBarState {
        TermBarState {
            terminals: self
                .terminals
                .iter()
                .map(|t| TermTab {
                    id: t.id.clone(),
                    title: t.title.clone(),
                })
                .collect(),
            active_index: self.active_terminal,
        }
    }
}

/// Seconds since the epoch, for creation timestamps
pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Authoritative state owned by the controller
#[derive(Debug, Default)]
pub struct Model {
    pub worktrees: Vec<Worktree>,
    pub sessions: Vec<Session>,
    /// Session whose panes are (or will be, on modal exit) next to the sidebar
    pub active_session: Option<String>,
    next_id: u64,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id like `s3` / `t4` / `w1`
    pub fn next_id(&mut self, prefix: char) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }

    pub fn worktree(&self, id: &str) -> Option<&Worktree> {
        self.worktrees.iter().find(|w| w.id == id)
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn session_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    pub fn active(&self) -> Option<&Session> {
        self.active_session.as_deref().and_then(|id| self.session(id))
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.active_session.as_deref() == Some(session_id)
    }

    /// Ids of every session bound to a worktree, in creation order
    pub fn sessions_of(&self, worktree_id: &str) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|s| s.worktree_id == worktree_id)
            .map(|s| s.id.clone())
            .collect()
    }

    /// Worktree a session runs in
    pub fn worktree_of(&self, session_id: &str) -> Option<&Worktree> {
        self.session(session_id)
            .and_then(|s| self.worktree(&s.worktree_id))
    }

    /// Add a worktree discovered or created by the git collaborator
    pub fn add_worktree(&mut self, path: PathBuf, branch: String, is_primary: bool) -> String {
        let id = self.next_id('w');
        self.worktrees.push(Worktree {
            id: id.clone(),
            path,
            branch,
            is_primary,
        });
        id
    }

    /// Default title for the next session on a worktree
    pub fn default_session_title(&self, worktree_id: &str) -> String {
        let branch = self
            .worktree(worktree_id)
            .map(|w| w.branch.as_str())
            .unwrap_or("session");
        match self.sessions_of(worktree_id).len() {
            0 => branch.to_string(),
            n => format!("{} {}", branch, n + 1),
        }
    }
}
