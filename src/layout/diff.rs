//! Diff-list panel under the sidebar and the two-pane file-diff view

use std::rc::Rc;

use tracing::{debug, info};

use super::PaneLayout;
use crate::model::Model;
use crate::satellite::{DiffListState, FileDiffState, SatelliteKind};
use crate::tmux::{Multiplexer, MuxResult, PaneId, Placement, Size, Tolerate};

/// Owner id the diff list is spawned with while no session exists
const NO_SESSION: &str = "-";

/// An open file-diff view: one-row header above the content pane, both to
/// the right of the owning session's main pane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffView {
    pub session_id: String,
    pub file: String,
    pub header: PaneId,
    pub content: PaneId,
}

impl<M: Multiplexer> PaneLayout<M> {
    /// What the diff list should show for the current active session
    pub fn diff_list_state(&self, model: &Model) -> DiffListState {
        match model.active() {
            Some(session) => {
                let worktree = model.worktree(&session.worktree_id);
                DiffListState {
                    session_id: Some(session.id.clone()),
                    worktree_path: worktree.map(|w| w.path.clone()),
                    branch: worktree.map(|w| w.branch.clone()).unwrap_or_default(),
                }
            }
            None => DiffListState::default(),
        }
    }

    pub(super) fn push_diff_list(&self, mux: &M, model: &Model) -> MuxResult<()> {
        if let Some(pane) = &self.diff_list {
            self.satellites
                .push(mux, pane, &self.diff_list_state(model))?;
        }
        Ok(())
    }

    /// Show or hide the diff list below the sidebar
    pub fn toggle_diff_list(&mut self, model: &Model) -> MuxResult<()> {
        if self.is_fullscreen() {
            return Ok(());
        }
        let mux = Rc::clone(&self.mux);
        let _lock = self.lock.raise(&*mux);

        if let Some(pane) = self.diff_list.take() {
            mux.kill_pane(&pane).tolerate()?;
            info!("closed diff list");
        } else {
            let placement = Placement::below(Some(Size::Percent(self.config.diff_list_percent)));
            let Some(pane) = mux
                .split_pane(&self.sidebar, placement, Some(&self.cwd), None)
                .tolerate()?
            else {
                return Ok(());
            };
            let owner = model.active_session.as_deref().unwrap_or(NO_SESSION);
            let state = self.diff_list_state(model);
            if self
                .satellites
                .spawn(&*mux, &pane, SatelliteKind::DiffList, owner, &state)?
            {
                info!(%pane, "opened diff list");
                self.diff_list = Some(pane);
            } else {
                mux.kill_pane(&pane).tolerate()?;
            }
        }

        self.reassert(&*mux)?;
        mux.select_pane(&self.sidebar).tolerate()?;
        Ok(())
    }

    pub fn focus_diff_list(&self) -> MuxResult<()> {
        if let Some(pane) = &self.diff_list {
            if !self.is_fullscreen() {
                self.mux.select_pane(pane).tolerate()?;
            }
        }
        Ok(())
    }

    /// Open `file` of the active session's worktree in the file-diff view,
    /// replacing any view already open
    pub fn open_file_diff(&mut self, model: &Model, file: &str) -> MuxResult<()> {
        if self.is_fullscreen() {
            return Ok(());
        }
        let Some(session) = model.active() else {
            return Ok(());
        };
        let Some(worktree) = model.worktree(&session.worktree_id) else {
            return Ok(());
        };

        let mux = Rc::clone(&self.mux);
        let _lock = self.lock.raise(&*mux);
        self.close_view(&*mux)?;

        let Some(content) = mux
            .split_pane(
                &session.pane_id,
                Placement::right(Some(Size::Percent(50))),
                Some(&worktree.path),
                None,
            )
            .tolerate()?
        else {
            return Ok(());
        };
        let Some(header) = mux
            .split_pane(
                &content,
                Placement::above(Some(Size::Cells(1))),
                Some(&worktree.path),
                None,
            )
            .tolerate()?
        else {
            mux.kill_pane(&content).tolerate()?;
            return Ok(());
        };

        let state = FileDiffState {
            worktree_path: worktree.path.clone(),
            file: file.to_string(),
        };
        let header_ok = self.satellites.spawn(
            &*mux,
            &header,
            SatelliteKind::FileDiffHeader,
            &session.id,
            &state,
        )?;
        let content_ok = self.satellites.spawn(
            &*mux,
            &content,
            SatelliteKind::FileDiffContent,
            &session.id,
            &state,
        )?;
        if !(header_ok && content_ok) {
            mux.kill_pane(&header).tolerate()?;
            mux.kill_pane(&content).tolerate()?;
            return Ok(());
        }

        self.diff_view = Some(DiffView {
            session_id: session.id.clone(),
            file: file.to_string(),
            header,
            content: content.clone(),
        });
        self.reassert(&*mux)?;
        mux.select_pane(&content).tolerate()?;
        info!(session = %session.id, %file, "opened file diff");
        Ok(())
    }

    /// Close the file-diff view, if open, and focus the sidebar
    pub fn close_file_diff(&mut self) -> MuxResult<()> {
        if self.diff_view.is_none() {
            return Ok(());
        }
        let mux = Rc::clone(&self.mux);
        let _lock = self.lock.raise(&*mux);
        self.close_view(&*mux)?;
        self.reassert(&*mux)?;
        mux.select_pane(&self.sidebar).tolerate()?;
        Ok(())
    }

    pub(super) fn close_view(&mut self, mux: &M) -> MuxResult<()> {
        if let Some(view) = self.diff_view.take() {
            mux.kill_pane(&view.header).tolerate()?;
            mux.kill_pane(&view.content).tolerate()?;
            debug!(file = %view.file, "closed file diff");
        }
        Ok(())
    }
}
