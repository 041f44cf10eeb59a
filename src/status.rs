//! Agent status polling
//!
//! The agent's state is read off the bottom of its pane: an input box (a
//! border row directly above the `❯` prompt) means it accepts input, an
//! interrupt hint inside that screen means it is still working, and a
//! `[y/n]` question means it waits for a decision.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::model::Model;
use crate::tmux::{Multiplexer, MuxResult, Tolerate};

/// Lines captured from the bottom of an agent pane
const CAPTURE_LINES: usize = 15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AgentStatus {
    Working,
    Idle,
    /// Asking a yes/no question
    Waiting,
    #[default]
    Unknown,
}

impl AgentStatus {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Working => "●",
            Self::Idle => "○",
            Self::Waiting => "◐",
            Self::Unknown => "?",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Idle => "idle",
            Self::Waiting => "waiting",
            Self::Unknown => "unknown",
        }
    }
}

fn has_prompt_box(content: &str) -> bool {
    let lines: Vec<&str> = content.lines().collect();
    lines
        .windows(2)
        .any(|pair| pair[0].contains('─') && pair[1].contains('❯'))
}

/// Classify captured pane content
pub fn detect(content: &str) -> AgentStatus {
    if has_prompt_box(content) {
        if content.contains("to interrupt") {
            AgentStatus::Working
        } else {
            AgentStatus::Idle
        }
    } else if content.contains("[y/n]") || content.contains("[Y/n]") {
        AgentStatus::Waiting
    } else {
        AgentStatus::Unknown
    }
}

/// Re-captures every session's agent pane once per interval
#[derive(Debug)]
pub struct StatusPoller {
    interval: Duration,
    last: Option<Instant>,
    statuses: HashMap<String, AgentStatus>,
}

impl StatusPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            statuses: HashMap::new(),
        }
    }

    pub fn get(&self, session_id: &str) -> AgentStatus {
        self.statuses.get(session_id).copied().unwrap_or_default()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.last
            .map_or(true, |last| now.duration_since(last) >= self.interval)
    }

    /// Poll if the interval elapsed. Returns whether any status changed.
    pub fn poll<M: Multiplexer + ?Sized>(
        &mut self,
        mux: &M,
        model: &Model,
        now: Instant,
    ) -> MuxResult<bool> {
        if !self.is_due(now) {
            return Ok(false);
        }
        self.last = Some(now);

        let mut changed = false;
        let mut next = HashMap::with_capacity(model.sessions.len());
        for session in &model.sessions {
            let status = mux
                .capture_pane(&session.pane_id, CAPTURE_LINES)
                .tolerate()?
                .map(|content| detect(&content))
                .unwrap_or_default();
            if self.get(&session.id) != status {
                debug!(session = %session.id, status = status.label(), "agent status changed");
                changed = true;
            }
            next.insert(session.id.clone(), status);
        }
        changed |= next.len() != self.statuses.len();
        self.statuses = next;
        Ok(changed)
    }
}
