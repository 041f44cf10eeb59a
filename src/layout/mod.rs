//! Pane layout orchestrator
//!
//! Owns the visible window next to the sidebar. Parked panes live in their own
//! background windows and are joined back on demand:
//! - session switch, fullscreen modal, session/worktree deletion (this file)
//! - `terminals`: per-session terminal area (tab bar + one visible terminal)
//! - `diff`: diff-list panel and the file-diff view
//!
//! Every structural operation raises the shared resize lock for its duration
//! and re-asserts fixed sizes afterwards, because joins and breaks perturb
//! neighboring panes.

mod diff;
mod terminals;


use std::path::PathBuf;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::git::Worktrees;
use crate::model::{now, Model, Session};
use crate::resize::{ResizeEnforcer, SharedFlag, LOCK_OPTION};
use crate::satellite::Satellites;
use crate::tmux::{Multiplexer, MuxResult, PaneId, Placement, Size, Tolerate};

pub use diff::DiffView;

/// Process-wide layout state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutMode {
    /// Active session (or placeholder) attached next to the sidebar
    Normal,
    /// Everything parked; the sidebar fills the window for a dialog
    FullscreenModal { hidden_pane: PaneId },
}

/// Sizes and commands the orchestrator needs from the config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutConfig {
    pub agent_command: String,
    pub sidebar_width: u16,
    pub terminal_percent: u16,
    pub bar_height: u16,
    pub diff_list_percent: u16,
    pub placeholder_hint: String,
}

impl From<&Config> for LayoutConfig {
    fn from(config: &Config) -> Self {
        Self {
            agent_command: config.agent_command.clone(),
            sidebar_width: config.sidebar_width,
            terminal_percent: config.terminal_percent,
            bar_height: config.tab_bar_height,
            diff_list_percent: config.diff_list_percent,
            placeholder_hint: config.placeholder_hint.clone(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Size for a pane joined below a bar inside a `container`-row area
fn body_size(container: u16, bar: u16) -> Size {
    match container.checked_sub(bar + 1) {
        Some(rows) if rows > 0 => Size::Cells(rows),
        _ => Size::Percent(50),
    }
}

pub struct PaneLayout<M: Multiplexer> {
    mux: Rc<M>,
    sidebar: PaneId,
    /// Directory the placeholder pane starts in
    cwd: PathBuf,
    config: LayoutConfig,
    mode: LayoutMode,
    /// Main pane shown while no session exists
    placeholder: Option<PaneId>,
    resize: ResizeEnforcer,
    lock: SharedFlag,
    satellites: Satellites,
    diff_list: Option<PaneId>,
    diff_view: Option<DiffView>,
}

impl<M: Multiplexer> PaneLayout<M> {
    pub fn new(
        mux: M,
        sidebar: PaneId,
        cwd: PathBuf,
        config: LayoutConfig,
        satellites: Satellites,
        script_dir: PathBuf,
    ) -> Self {
        let resize = ResizeEnforcer::new(script_dir, config.bar_height);
        Self {
            mux: Rc::new(mux),
            sidebar,
            cwd,
            config,
            mode: LayoutMode::Normal,
            placeholder: None,
            resize,
            lock: SharedFlag::new(LOCK_OPTION),
            satellites,
            diff_list: None,
            diff_view: None,
        }
    }

    pub fn mux(&self) -> &M {
        &self.mux
    }

    pub fn sidebar(&self) -> &str {
        &self.sidebar
    }

    pub fn mode(&self) -> &LayoutMode {
        &self.mode
    }

    pub fn is_fullscreen(&self) -> bool {
        matches!(self.mode, LayoutMode::FullscreenModal { .. })
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    pub fn resize(&self) -> &ResizeEnforcer {
        &self.resize
    }

    pub fn diff_list(&self) -> Option<&str> {
        self.diff_list.as_deref()
    }

    pub fn diff_view(&self) -> Option<&DiffView> {
        self.diff_view.as_ref()
    }

    // =========================================================================
    // Startup / bookkeeping
    // =========================================================================

    /// Clear stale hook state and put the placeholder next to the sidebar
    pub fn startup(&mut self) -> MuxResult<()> {
        let mux = Rc::clone(&self.mux);
        self.resize.reset(&*mux)?;

        let _lock = self.lock.raise(&*mux);
        self.placeholder = mux
            .split_pane(
                &self.sidebar,
                Placement::right(None).full_span(),
                Some(&self.cwd),
                Some(&self.placeholder_command()),
            )
            .tolerate()?;
        self.reassert(&*mux)?;
        mux.select_pane(&self.sidebar).tolerate()?;
        info!(sidebar = %self.sidebar, placeholder = ?self.placeholder, "layout ready");
        Ok(())
    }

    /// Drop the resize hook, drag binding and lock when the controller exits
    /// while its panes stay behind
    pub fn shutdown(&mut self) -> MuxResult<()> {
        let mux = Rc::clone(&self.mux);
        self.resize.reset(&*mux)?;
        info!("resize enforcement removed");
        Ok(())
    }

    fn placeholder_command(&self) -> String {
        format!(
            "printf '\\n  %s\\n' {}; exec tail -f /dev/null",
            shell_words::quote(&self.config.placeholder_hint)
        )
    }

    /// Re-apply the sidebar width and every pinned height
    pub fn reassert_sizes(&self) -> MuxResult<()> {
        self.reassert(&*self.mux)
    }

    fn reassert(&self, mux: &M) -> MuxResult<()> {
        if self.is_fullscreen() {
            return Ok(());
        }
        mux.resize_pane(&self.sidebar, Some(self.config.sidebar_width), None)
            .tolerate()?;
        if let Some(triple) = self.resize.installed() {
            self.resize.pin(mux, &triple.bar)?;
        }
        if let Some(view) = &self.diff_view {
            mux.resize_pane(&view.header, None, Some(1)).tolerate()?;
        }
        Ok(())
    }

    fn worktree_dir(&self, model: &Model, session_id: &str) -> PathBuf {
        model
            .worktree_of(session_id)
            .map(|w| w.path.clone())
            .unwrap_or_else(|| self.cwd.clone())
    }

    pub fn focus_sidebar(&self) -> MuxResult<()> {
        self.mux.select_pane(&self.sidebar).tolerate()?;
        Ok(())
    }

    pub fn focus_main(&self, model: &Model) -> MuxResult<()> {
        if self.is_fullscreen() {
            return Ok(());
        }
        if let Some(session) = model.active() {
            self.mux.select_pane(&session.pane_id).tolerate()?;
        }
        Ok(())
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Break a session's visible panes into the background.
    ///
    /// The hook goes first so it never fires for a triple that is no longer
    /// visible.
    fn park_session(&mut self, mux: &M, session: &Session) -> MuxResult<()> {
        if let Some(bar) = &session.bar_pane {
            self.resize.remove_for_bar(mux, bar)?;
        }
        if let Some(term) = session.active_terminal_pane() {
            mux.break_pane(&term).tolerate()?;
        }
        if let Some(bar) = &session.bar_pane {
            mux.break_pane(bar).tolerate()?;
        }
        mux.break_pane(&session.pane_id).tolerate()?;
        debug!(session = %session.id, "parked session");
        Ok(())
    }

    /// Join the active session's panes next to the sidebar
    fn attach_active(&mut self, mux: &M, model: &Model) -> MuxResult<()> {
        let Some(session) = model.active() else {
            return Ok(());
        };
        mux.join_pane(&session.pane_id, &self.sidebar, Placement::right(None).full_span())
            .tolerate()?;
        if !session.terminals.is_empty() {
            self.attach_terminal_area(mux, session)?;
        }
        self.push_diff_list(mux, model)?;
        debug!(session = %session.id, "attached session");
        Ok(())
    }

    /// Make `id` the active session
    pub fn switch_session(&mut self, model: &mut Model, id: &str) -> MuxResult<()> {
        if model.is_active(id) {
            return Ok(());
        }
        let Some(target) = model.session(id).map(|s| s.pane_id.clone()) else {
            warn!(session = %id, "switch to unknown session");
            return Ok(());
        };

        let mux = Rc::clone(&self.mux);
        let _lock = self.lock.raise(&*mux);

        if let LayoutMode::FullscreenModal { hidden_pane } = &self.mode {
            // Everything is parked already; only the pane restored on exit changes
            if self.placeholder.as_deref() == Some(hidden_pane.as_str()) {
                if let Some(placeholder) = self.placeholder.take() {
                    mux.kill_pane(&placeholder).tolerate()?;
                }
            }
            self.mode = LayoutMode::FullscreenModal { hidden_pane: target };
            model.active_session = Some(id.to_string());
            return Ok(());
        }

        self.close_view(&*mux)?;
        match model.active().cloned() {
            Some(previous) => self.park_session(&*mux, &previous)?,
            None => {
                if let Some(placeholder) = self.placeholder.take() {
                    mux.kill_pane(&placeholder).tolerate()?;
                }
            }
        }

        model.active_session = Some(id.to_string());
        self.attach_active(&*mux, model)?;
        self.reassert(&*mux)?;
        info!(session = %id, "switched session");
        Ok(())
    }

    /// Start an agent pane for a worktree and switch to it
    pub fn create_session(
        &mut self,
        model: &mut Model,
        worktree_id: &str,
        title: &str,
    ) -> MuxResult<Option<String>> {
        let Some(path) = model.worktree(worktree_id).map(|w| w.path.clone()) else {
            warn!(worktree = %worktree_id, "new session for unknown worktree");
            return Ok(None);
        };

        let command = self.config.agent_command.clone();
        let Some(pane) = self.mux.create_pane(&path, Some(&command)).tolerate()? else {
            return Ok(None);
        };

        let id = model.next_id('s');
        model.sessions.push(Session {
            id: id.clone(),
            worktree_id: worktree_id.to_string(),
            pane_id: pane,
            title: title.to_string(),
            created: now(),
            terminals: Vec::new(),
            active_terminal: 0,
            bar_pane: None,
        });
        info!(session = %id, worktree = %worktree_id, "created session");

        self.switch_session(model, &id)?;
        Ok(Some(id))
    }

    /// Kill every pane of `ids` and drop them from the model.
    ///
    /// Returns whether the active session was among them. Per session the
    /// order is terminals, tab bar (hook removed first), main pane.
    fn teardown_sessions(&mut self, mux: &M, model: &mut Model, ids: &[String]) -> MuxResult<bool> {
        let mut removed_active = false;
        for id in ids {
            let Some(session) = model.session(id).cloned() else {
                continue;
            };
            if self.diff_view.as_ref().is_some_and(|v| v.session_id == *id) {
                self.close_view(mux)?;
            }
            if let Some(bar) = &session.bar_pane {
                self.resize.remove_for_bar(mux, bar)?;
            }
            for terminal in &session.terminals {
                mux.kill_pane(&terminal.pane_id).tolerate()?;
            }
            if let Some(bar) = &session.bar_pane {
                mux.kill_pane(bar).tolerate()?;
            }
            mux.kill_pane(&session.pane_id).tolerate()?;

            removed_active |= model.is_active(id);
            model.sessions.retain(|s| s.id != *id);
            info!(session = %id, "deleted session");
        }
        if removed_active {
            model.active_session = None;
        }
        Ok(removed_active)
    }

    /// Fill the main slot after the active session went away: the first
    /// remaining session, else a fresh placeholder
    fn attach_replacement(&mut self, mux: &M, model: &mut Model) -> MuxResult<()> {
        model.active_session = model.sessions.first().map(|s| s.id.clone());
        let next = model.active().map(|s| s.pane_id.clone());

        match (self.is_fullscreen(), next) {
            (false, Some(_)) => self.attach_active(mux, model)?,
            (false, None) => {
                self.placeholder = mux
                    .split_pane(
                        &self.sidebar,
                        Placement::right(None).full_span(),
                        Some(&self.cwd),
                        Some(&self.placeholder_command()),
                    )
                    .tolerate()?;
                self.push_diff_list(mux, model)?;
            }
            (true, Some(hidden_pane)) => {
                self.mode = LayoutMode::FullscreenModal { hidden_pane };
            }
            (true, None) => {
                let pane = mux
                    .create_pane(&self.cwd, Some(&self.placeholder_command()))
                    .tolerate()?;
                if let Some(pane) = pane {
                    self.placeholder = Some(pane.clone());
                    self.mode = LayoutMode::FullscreenModal { hidden_pane: pane };
                }
            }
        }
        Ok(())
    }

    pub fn delete_session(&mut self, model: &mut Model, id: &str) -> MuxResult<()> {
        if model.session(id).is_none() {
            return Ok(());
        }
        let mux = Rc::clone(&self.mux);
        let _lock = self.lock.raise(&*mux);

        if self.teardown_sessions(&*mux, model, &[id.to_string()])? {
            self.attach_replacement(&*mux, model)?;
        }
        self.reassert(&*mux)?;
        Ok(())
    }

    /// Delete every session on a worktree, then the worktree itself.
    ///
    /// The primary checkout is refused before any pane is touched. If git
    /// fails the worktree stays listed and the error is returned.
    pub fn delete_worktree<G: Worktrees + ?Sized>(
        &mut self,
        model: &mut Model,
        git: &G,
        id: &str,
    ) -> anyhow::Result<()> {
        let Some(worktree) = model.worktree(id).cloned() else {
            anyhow::bail!("Unknown worktree");
        };
        if worktree.is_primary {
            anyhow::bail!("The primary checkout cannot be deleted");
        }

        let mux = Rc::clone(&self.mux);
        let _lock = self.lock.raise(&*mux);

        let doomed = model.sessions_of(id);
        let removed_active = self.teardown_sessions(&*mux, model, &doomed)?;

        let removed = git.remove(&worktree.path);
        if removed.is_ok() {
            model.worktrees.retain(|w| w.id != id);
            info!(worktree = %worktree.path.display(), "deleted worktree");
        }

        if removed_active {
            self.attach_replacement(&*mux, model)?;
        }
        self.reassert(&*mux)?;
        removed
    }

    /// Kill every pane this controller created
    pub fn kill_all(&mut self, model: &mut Model) -> MuxResult<()> {
        let mux = Rc::clone(&self.mux);
        let _lock = self.lock.raise(&*mux);

        self.close_view(&*mux)?;
        if let Some(pane) = self.diff_list.take() {
            mux.kill_pane(&pane).tolerate()?;
        }
        let ids: Vec<String> = model.sessions.iter().map(|s| s.id.clone()).collect();
        self.teardown_sessions(&*mux, model, &ids)?;
        if let Some(pane) = self.placeholder.take() {
            mux.kill_pane(&pane).tolerate()?;
        }
        self.resize.reset(&*mux)?;
        self.mode = LayoutMode::Normal;
        Ok(())
    }

    // =========================================================================
    // Fullscreen modal
    // =========================================================================

    /// Park everything so the sidebar fills the window. No-op if already there.
    pub fn enter_fullscreen(&mut self, model: &Model) -> MuxResult<()> {
        if self.is_fullscreen() {
            return Ok(());
        }
        let mux = Rc::clone(&self.mux);
        let _lock = self.lock.raise(&*mux);

        self.close_view(&*mux)?;
        if let Some(pane) = &self.diff_list {
            mux.break_pane(pane).tolerate()?;
        }

        let hidden = match model.active().cloned() {
            Some(session) => {
                self.park_session(&*mux, &session)?;
                Some(session.pane_id)
            }
            None => match self.placeholder.clone() {
                Some(pane) => {
                    mux.break_pane(&pane).tolerate()?;
                    Some(pane)
                }
                None => {
                    let pane = mux
                        .create_pane(&self.cwd, Some(&self.placeholder_command()))
                        .tolerate()?;
                    self.placeholder = pane.clone();
                    pane
                }
            },
        };

        match hidden {
            Some(hidden_pane) => {
                debug!(%hidden_pane, "entered fullscreen");
                self.mode = LayoutMode::FullscreenModal { hidden_pane };
            }
            None => warn!("no main pane to hide, staying in normal layout"),
        }
        Ok(())
    }

    /// Restore the hidden pane next to the sidebar. No-op if not fullscreen.
    pub fn exit_fullscreen(&mut self, model: &Model) -> MuxResult<()> {
        let LayoutMode::FullscreenModal { hidden_pane } = self.mode.clone() else {
            return Ok(());
        };
        let mux = Rc::clone(&self.mux);
        let _lock = self.lock.raise(&*mux);

        mux.join_pane(&hidden_pane, &self.sidebar, Placement::right(None).full_span())
            .tolerate()?;
        self.mode = LayoutMode::Normal;

        if let Some(session) = model.active() {
            if session.pane_id == hidden_pane && !session.terminals.is_empty() {
                self.attach_terminal_area(&*mux, session)?;
            }
        }

        if let Some(pane) = &self.diff_list {
            let size = Some(Size::Percent(self.config.diff_list_percent));
            mux.join_pane(pane, &self.sidebar, Placement::below(size))
                .tolerate()?;
        }
        self.push_diff_list(&*mux, model)?;

        self.reassert(&*mux)?;
        mux.select_pane(&self.sidebar).tolerate()?;
        debug!(%hidden_pane, "left fullscreen");
        Ok(())
    }
}
