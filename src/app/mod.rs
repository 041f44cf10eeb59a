//! Controller state and dispatch
//!
//! This module contains the sidebar's state machine:
//! - `App` struct: model, layout, selection and the active modal
//! - Modal flows (new worktree, new session, rename, delete, quit)
//! - Relay dispatch for messages typed in by satellites

mod helpers;
mod mode;

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::git::{self, Worktrees};
use crate::layout::PaneLayout;
use crate::model::Model;
use crate::relay::{Decoded, LineDecoder, Namespace, RelayMessage};
use crate::status::{AgentStatus, StatusPoller};
use crate::tmux::{Multiplexer, MuxError, MuxResult, Tolerate};

pub use mode::{DeleteTarget, Modal, Row};

use helpers::{default_worktree_path, validate_title};

/// Main application state
pub struct App<M: Multiplexer, G: Worktrees> {
    pub model: Model,
    pub layout: PaneLayout<M>,
    git: G,
    /// Current dialog
    pub modal: Modal,
    /// Index into `rows()`
    pub selected: usize,
    /// Whether the event loop should stop
    pub should_quit: bool,
    /// Set when the user chose to kill every session on quit
    pub kill_requested: bool,
    /// Transient status-line message (clears on next key)
    pub message: Option<String>,
    /// Fatal multiplexer error that ended the loop
    pub fatal: Option<MuxError>,
    statuses: StatusPoller,
    decoder: LineDecoder,
}

impl<M: Multiplexer, G: Worktrees> App<M, G> {
    // =========================================================================
    // Initialization and core lifecycle
    // =========================================================================

    /// Build the model from the repository's worktrees
    pub fn new(layout: PaneLayout<M>, git: G, config: &Config) -> anyhow::Result<Self> {
        let mut model = Model::new();
        for worktree in git.list()? {
            model.add_worktree(worktree.path, worktree.branch, worktree.is_primary);
        }
        info!(worktrees = model.worktrees.len(), "discovered worktrees");

        Ok(Self {
            model,
            layout,
            git,
            modal: Modal::None,
            selected: 0,
            should_quit: false,
            kill_requested: false,
            message: None,
            fatal: None,
            statuses: StatusPoller::new(Duration::from_millis(config.status_interval_ms)),
            decoder: LineDecoder::new(),
        })
    }

    /// Lay out the initial panes
    pub fn start(&mut self) -> MuxResult<()> {
        self.layout.startup()
    }

    /// Record the outcome of a layout operation; only a fatal error stops the loop
    fn check(&mut self, result: MuxResult<()>) {
        if let Err(e) = result {
            error!(error = %e, "multiplexer unavailable, stopping");
            self.fatal = Some(e);
            self.should_quit = true;
        }
    }

    pub fn clear_message(&mut self) {
        self.message = None;
    }

    /// Poll agent statuses if due. Returns whether a redraw is needed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.statuses.poll(self.layout.mux(), &self.model, now) {
            Ok(changed) => changed,
            Err(e) => {
                self.check(Err(e));
                true
            }
        }
    }

    pub fn status(&self, session_id: &str) -> AgentStatus {
        self.statuses.get(session_id)
    }

    /// Feed a key through the relay decoder first
    pub fn decode_key(&mut self, key: &crossterm::event::KeyEvent) -> Decoded {
        self.decoder.feed(key)
    }

    /// Terminal resized: re-pin everything
    pub fn on_resize(&mut self) {
        let result = self.layout.reassert_sizes();
        self.check(result);
    }

    // =========================================================================
    // Sidebar rows and selection
    // =========================================================================

    /// Worktrees, each followed by its sessions
    pub fn rows(&self) -> Vec<Row> {
        let mut rows = Vec::new();
        for worktree in &self.model.worktrees {
            rows.push(Row::Worktree(worktree.id.clone()));
            rows.extend(
                self.model
                    .sessions_of(&worktree.id)
                    .into_iter()
                    .map(Row::Session),
            );
        }
        rows
    }

    pub fn selected_row(&self) -> Option<Row> {
        self.rows().get(self.selected).cloned()
    }

    /// Worktree the selected row belongs to
    fn selected_worktree(&self) -> Option<String> {
        match self.selected_row()? {
            Row::Worktree(id) => Some(id),
            Row::Session(id) => self.model.session(&id).map(|s| s.worktree_id.clone()),
        }
    }

    pub fn select_next(&mut self) {
        let count = self.rows().len();
        if count > 0 && self.selected < count - 1 {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_row(&mut self, index: usize) {
        if index < self.rows().len() {
            self.selected = index;
        }
    }

    fn clamp_selection(&mut self) {
        let count = self.rows().len();
        if self.selected >= count {
            self.selected = count.saturating_sub(1);
        }
    }

    /// Enter: show a session, or start a new one on a worktree row
    pub fn activate_selected(&mut self) {
        match self.selected_row() {
            Some(Row::Session(id)) => {
                let result = self.layout.switch_session(&mut self.model, &id);
                self.check(result);
            }
            Some(Row::Worktree(_)) => self.start_new_session(),
            None => {}
        }
    }

    // =========================================================================
    // Modal transitions
    // =========================================================================

    /// Show a dialog, parking every pane first
    pub fn open_modal(&mut self, modal: Modal) {
        if !modal.is_open() {
            self.close_modal();
            return;
        }
        let result = self.layout.enter_fullscreen(&self.model);
        self.check(result);
        self.modal = modal;
    }

    /// Dismiss the dialog and restore the layout
    pub fn close_modal(&mut self) {
        self.modal = Modal::None;
        let result = self.layout.exit_fullscreen(&self.model);
        self.check(result);
    }

    pub fn show_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(%message, "showing error");
        self.open_modal(Modal::Error { message });
    }

    pub fn start_quit(&mut self) {
        self.open_modal(Modal::QuitConfirm);
    }

    pub fn start_new_worktree(&mut self) {
        self.open_modal(Modal::NewWorktree {
            branch: String::new(),
        });
    }

    pub fn start_new_session(&mut self) {
        let Some(worktree_id) = self.selected_worktree() else {
            return;
        };
        let input = self.model.default_session_title(&worktree_id);
        self.open_modal(Modal::NewSession { worktree_id, input });
    }

    pub fn start_rename(&mut self) {
        if let Some(Row::Session(id)) = self.selected_row() {
            let input = self
                .model
                .session(&id)
                .map(|s| s.title.clone())
                .unwrap_or_default();
            self.open_modal(Modal::Rename {
                session_id: id,
                input,
            });
        }
    }

    pub fn start_delete(&mut self) {
        match self.selected_row() {
            Some(Row::Session(id)) => self.open_modal(Modal::DeleteConfirm {
                target: DeleteTarget::Session(id),
            }),
            Some(Row::Worktree(id)) => {
                if self.model.worktree(&id).is_some_and(|w| w.is_primary) {
                    self.show_error("The primary checkout cannot be deleted");
                } else {
                    self.open_modal(Modal::DeleteConfirm {
                        target: DeleteTarget::Worktree(id),
                    });
                }
            }
            None => {}
        }
    }

    /// Enter in a text dialog
    pub fn submit(&mut self) {
        match self.modal.clone() {
            Modal::NewWorktree { branch } => self.submit_new_worktree(&branch),
            Modal::NewSession { worktree_id, input } => self.submit_new_session(&worktree_id, &input),
            Modal::Rename { session_id, input } => self.submit_rename(&session_id, &input),
            Modal::DeleteConfirm { target } => self.confirm_delete(target),
            Modal::Error { .. } => self.close_modal(),
            Modal::QuitConfirm | Modal::None => {}
        }
    }

    fn submit_new_worktree(&mut self, branch: &str) {
        let branch = branch.trim();
        if let Err(e) = git::validate_branch_name(branch) {
            self.show_error(e.to_string());
            return;
        }

        let path = default_worktree_path(self.git.root(), branch);
        let created = match self.git.create(branch, &path) {
            Ok(created) => created,
            Err(e) => {
                self.show_error(format!("{:#}", e));
                return;
            }
        };

        let worktree_id = self
            .model
            .add_worktree(created.path, created.branch, false);
        let title = self.model.default_session_title(&worktree_id);
        self.create_session(&worktree_id, &title);
    }

    fn submit_new_session(&mut self, worktree_id: &str, input: &str) {
        match validate_title(input) {
            Ok(title) => self.create_session(worktree_id, &title),
            Err(message) => self.show_error(message),
        }
    }

    /// Start a session (the layout is fullscreen here) and show it on close
    fn create_session(&mut self, worktree_id: &str, title: &str) {
        let result = self
            .layout
            .create_session(&mut self.model, worktree_id, title);
        match result {
            Ok(Some(id)) => {
                self.select_session_row(&id);
                self.message = Some(format!("Started {}", title));
            }
            Ok(None) => self.message = Some("Could not start the session".to_string()),
            Err(e) => return self.check(Err(e)),
        }
        self.close_modal();
    }

    fn select_session_row(&mut self, id: &str) {
        if let Some(index) = self
            .rows()
            .iter()
            .position(|r| *r == Row::Session(id.to_string()))
        {
            self.selected = index;
        }
    }

    fn submit_rename(&mut self, session_id: &str, input: &str) {
        match validate_title(input) {
            Ok(title) => {
                if let Some(session) = self.model.session_mut(session_id) {
                    session.title = title;
                }
                self.close_modal();
            }
            Err(message) => self.show_error(message),
        }
    }

    fn confirm_delete(&mut self, target: DeleteTarget) {
        match target {
            DeleteTarget::Session(id) => {
                let result = self.layout.delete_session(&mut self.model, &id);
                self.check(result);
            }
            DeleteTarget::Worktree(id) => {
                let result = self
                    .layout
                    .delete_worktree(&mut self.model, &self.git, &id);
                if let Err(e) = result {
                    self.clamp_selection();
                    match e.downcast::<MuxError>() {
                        Ok(fatal) => self.check(Err(fatal)),
                        Err(e) => self.show_error(format!("{:#}", e)),
                    }
                    return;
                }
            }
        }
        self.clamp_selection();
        self.close_modal();
    }

    /// Quit modal `d`: leave everything running and detach the client
    pub fn detach(&mut self) {
        self.close_modal();
        let result = self.layout.mux().detach_client().tolerate().map(drop);
        self.check(result);
    }

    /// Quit modal `k`: kill every session and stop
    pub fn kill_all(&mut self) {
        self.modal = Modal::None;
        let result = self.layout.kill_all(&mut self.model);
        self.check(result);
        self.kill_requested = true;
        self.should_quit = true;
    }

    // =========================================================================
    // Sidebar shortcuts
    // =========================================================================

    pub fn new_terminal(&mut self) {
        if self.model.active().is_none() {
            self.message = Some("No active session".to_string());
            return;
        }
        let result = self.layout.new_terminal(&mut self.model).map(drop);
        self.check(result);
    }

    pub fn cycle_terminal(&mut self, step: isize) {
        let result = self.layout.cycle_terminal(&mut self.model, step);
        self.check(result);
    }

    /// Close the active session's visible terminal
    pub fn delete_visible_terminal(&mut self) {
        let Some((id, index)) = self
            .model
            .active()
            .filter(|s| !s.terminals.is_empty())
            .map(|s| (s.id.clone(), s.active_terminal))
        else {
            return;
        };
        let result = self.layout.delete_terminal(&mut self.model, &id, index);
        self.check(result);
    }

    pub fn toggle_diff_list(&mut self) {
        let result = self.layout.toggle_diff_list(&self.model);
        self.check(result);
    }

    pub fn focus_main(&mut self) {
        let result = self.layout.focus_main(&self.model);
        self.check(result);
    }

    // =========================================================================
    // Relay dispatch
    // =========================================================================

    /// Handle one relayed line (sentinel stripped)
    pub fn handle_relay(&mut self, body: &str) {
        let Some(message) = RelayMessage::parse(body) else {
            debug!(%body, "ignoring malformed relay line");
            return;
        };
        debug!(namespace = message.namespace.tag(), action = %message.action, "relay message");

        let result = match (message.namespace, message.action.as_str()) {
            (Namespace::Term, "switch") => match message.index() {
                Some(index) => self.layout.switch_terminal(&mut self.model, index),
                None => Ok(()),
            },
            (Namespace::Term, "new") => self.layout.new_terminal(&mut self.model).map(drop),
            (Namespace::Term, "delete") => {
                match (self.model.active_session.clone(), message.index()) {
                    (Some(session), Some(index)) => {
                        self.layout
                            .delete_terminal(&mut self.model, &session, index)
                    }
                    _ => Ok(()),
                }
            }
            (Namespace::Term, "focus") => self.layout.focus_terminal(&self.model),
            (Namespace::Diff, "open") => match message.data.as_deref() {
                Some(file) if !file.is_empty() => self.layout.open_file_diff(&self.model, file),
                _ => Ok(()),
            },
            (Namespace::Diff, "focus") => self.layout.focus_diff_list(),
            (Namespace::FileDiff, "close") => self.layout.close_file_diff(),
            (_, "escape") => self.layout.focus_sidebar(),
            (namespace, action) => {
                warn!(namespace = namespace.tag(), %action, "unknown relay action");
                Ok(())
            }
        };
        self.check(result);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::git::WorktreeInfo;
    use crate::layout::{LayoutConfig, LayoutMode};
    use crate::satellite::Satellites;
    use crate::tmux::fake::{FakeTmux, Op};

    struct StubGit {
        root: PathBuf,
        created: RefCell<Vec<String>>,
    }

    impl Worktrees for StubGit {
        fn list(&self) -> anyhow::Result<Vec<WorktreeInfo>> {
            Ok(vec![
                WorktreeInfo {
                    path: self.root.clone(),
                    branch: "main".to_string(),
                    is_primary: true,
                },
                WorktreeInfo {
                    path: self.root.with_file_name("repo-feature"),
                    branch: "feature".to_string(),
                    is_primary: false,
                },
            ])
        }

        fn create(&self, branch: &str, path: &Path) -> anyhow::Result<WorktreeInfo> {
            if branch == "taken" {
                anyhow::bail!("branch already checked out");
            }
            self.created.borrow_mut().push(branch.to_string());
            Ok(WorktreeInfo {
                path: path.to_path_buf(),
                branch: branch.to_string(),
                is_primary: false,
            })
        }

        fn remove(&self, _path: &Path) -> anyhow::Result<()> {
            Ok(())
        }

        fn root(&self) -> &Path {
            &self.root
        }
    }

    fn app() -> (App<FakeTmux, StubGit>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let (fake, sidebar) = FakeTmux::with_sidebar();
        let satellites = Satellites::new(Some(std::env::current_exe().unwrap()), &sidebar);
        let layout = PaneLayout::new(
            fake,
            sidebar,
            dir.path().to_path_buf(),
            LayoutConfig::default(),
            satellites,
            dir.path().join("scripts"),
        );
        let git = StubGit {
            root: dir.path().join("repo"),
            created: RefCell::new(Vec::new()),
        };
        let mut app = App::new(layout, git, &Config::default()).unwrap();
        app.start().unwrap();
        (app, dir)
    }

    fn type_into_modal(app: &mut App<FakeTmux, StubGit>, text: &str) {
        let input = app.modal.input_mut().unwrap();
        input.clear();
        input.push_str(text);
    }

    #[test]
    fn test_rows_nest_sessions_under_worktrees() {
        let (mut app, _dir) = app();
        assert_eq!(
            app.rows(),
            vec![Row::Worktree("w1".to_string()), Row::Worktree("w2".to_string())]
        );

        app.select_row(1);
        app.start_new_session();
        app.submit();
        let rows = app.rows();
        assert_eq!(rows.len(), 3);
        assert!(matches!(rows[2], Row::Session(_)));
        assert_eq!(app.selected, 2);
    }

    #[test]
    fn test_modal_enters_and_leaves_fullscreen() {
        let (mut app, _dir) = app();
        app.start_quit();
        assert!(app.layout.is_fullscreen());
        assert_eq!(app.modal, Modal::QuitConfirm);
        app.close_modal();
        assert_eq!(app.layout.mode(), &LayoutMode::Normal);
    }

    #[test]
    fn test_new_session_flow_attaches_on_close() {
        let (mut app, _dir) = app();
        app.start_new_session();
        assert_eq!(
            app.modal,
            Modal::NewSession {
                worktree_id: "w1".to_string(),
                input: "main".to_string()
            }
        );
        type_into_modal(&mut app, "fix login");
        app.submit();

        assert_eq!(app.modal, Modal::None);
        let session = app.model.active().unwrap();
        assert_eq!(session.title, "fix login");
        assert!(app.layout.mux().is_attached(&session.pane_id));
    }

    #[test]
    fn test_invalid_title_shows_error_without_pane_ops() {
        let (mut app, _dir) = app();
        app.start_new_session();
        type_into_modal(&mut app, "   ");
        app.layout.mux().clear_ops();
        app.submit();

        assert!(matches!(app.modal, Modal::Error { .. }));
        assert!(app.model.sessions.is_empty());
        assert!(!app
            .layout
            .mux()
            .ops()
            .iter()
            .any(|op| matches!(op, Op::Create(_))));
    }

    #[test]
    fn test_new_worktree_creates_worktree_and_session() {
        let (mut app, dir) = app();
        app.start_new_worktree();
        type_into_modal(&mut app, "feature/login");
        app.submit();

        assert_eq!(app.modal, Modal::None);
        let worktree = app.model.worktrees.last().unwrap();
        assert_eq!(worktree.branch, "feature/login");
        assert_eq!(worktree.path, dir.path().join("repo-login"));
        assert_eq!(app.model.sessions_of(&worktree.id).len(), 1);
    }

    #[test]
    fn test_new_worktree_rejects_bad_branch_before_git() {
        let (mut app, _dir) = app();
        app.start_new_worktree();
        type_into_modal(&mut app, "bad name");
        app.submit();
        assert!(matches!(app.modal, Modal::Error { .. }));
        assert!(app.git.created.borrow().is_empty());
    }

    #[test]
    fn test_git_failure_surfaces_in_error_modal() {
        let (mut app, _dir) = app();
        app.start_new_worktree();
        type_into_modal(&mut app, "taken");
        app.submit();
        let Modal::Error { message } = &app.modal else {
            panic!("expected error modal");
        };
        assert!(message.contains("already checked out"));
        assert_eq!(app.model.worktrees.len(), 2);

        app.submit();
        assert_eq!(app.modal, Modal::None);
        assert!(!app.layout.is_fullscreen());
    }

    #[test]
    fn test_primary_worktree_delete_is_refused() {
        let (mut app, _dir) = app();
        app.select_row(0);
        app.start_delete();
        assert!(matches!(app.modal, Modal::Error { .. }));
    }

    #[test]
    fn test_delete_worktree_via_modal() {
        let (mut app, _dir) = app();
        app.select_row(1);
        app.start_new_session();
        app.submit();
        app.select_row(1);
        app.start_delete();
        assert_eq!(
            app.modal,
            Modal::DeleteConfirm {
                target: DeleteTarget::Worktree("w2".to_string())
            }
        );
        app.submit();
        assert_eq!(app.modal, Modal::None);
        assert!(app.model.sessions.is_empty());
        assert_eq!(app.rows(), vec![Row::Worktree("w1".to_string())]);
        assert!(app.layout.placeholder().is_some());
    }

    #[test]
    fn test_rename() {
        let (mut app, _dir) = app();
        app.start_new_session();
        app.submit();
        app.select_row(1);
        app.start_rename();
        type_into_modal(&mut app, "renamed");
        app.submit();
        assert_eq!(app.model.sessions[0].title, "renamed");
    }

    #[test]
    fn test_relay_dispatches_terminal_actions() {
        let (mut app, _dir) = app();
        app.start_new_session();
        app.submit();

        app.handle_relay("TERM:new");
        app.handle_relay("TERM:new");
        assert_eq!(app.model.active().unwrap().terminals.len(), 2);
        assert_eq!(app.model.active().unwrap().active_terminal, 1);

        app.handle_relay("TERM:switch:0");
        assert_eq!(app.model.active().unwrap().active_terminal, 0);

        app.handle_relay("TERM:delete:0");
        assert_eq!(app.model.active().unwrap().terminals.len(), 1);

        app.handle_relay("TERM:escape");
        assert_eq!(
            app.layout.mux().ops().last(),
            Some(&Op::Select(app.layout.sidebar().to_string()))
        );
    }

    #[test]
    fn test_relay_round_trip_through_decoder() {
        use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

        let (mut app, _dir) = app();
        app.start_new_session();
        app.submit();

        let line = RelayMessage::new(Namespace::Term, "new").encode();
        let mut decoded = Vec::new();
        for c in line.chars() {
            decoded.push(app.decode_key(&KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)));
        }
        let last = app.decode_key(&KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        assert!(decoded.iter().all(|d| *d == Decoded::Pending));
        let Decoded::Line(body) = last else {
            panic!("no line");
        };
        app.handle_relay(&body);
        assert_eq!(app.model.active().unwrap().terminals.len(), 1);
    }

    #[test]
    fn test_kill_all_requests_exit() {
        let (mut app, _dir) = app();
        app.start_new_session();
        app.submit();
        app.start_quit();
        app.kill_all();
        assert!(app.should_quit && app.kill_requested);
        assert!(app.model.sessions.is_empty());
    }

    #[test]
    fn test_detach_restores_layout_first() {
        let (mut app, _dir) = app();
        app.start_quit();
        app.detach();
        assert_eq!(app.modal, Modal::None);
        assert_eq!(app.layout.mux().ops().last(), Some(&Op::Detach));
        assert!(!app.should_quit);
    }
}
