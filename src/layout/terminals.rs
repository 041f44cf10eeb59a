//! Terminal area: a pinned tab bar above exactly one visible terminal

use std::rc::Rc;

use tracing::{debug, info, warn};

use super::{body_size, LayoutMode, PaneLayout};
use crate::model::{now, Model, Session, Terminal};
use crate::resize::ResizeTriple;
use crate::satellite::SatelliteKind;
use crate::tmux::{Multiplexer, MuxResult, Placement, Size, Tolerate};

impl<M: Multiplexer> PaneLayout<M> {
    /// Join a parked session's bar and active terminal below its main pane.
    ///
    /// The bar is joined at the full area height, then the terminal is joined
    /// below it at the area minus the bar and border, which leaves the bar at
    /// its fixed height before the explicit pin.
    pub(super) fn attach_terminal_area(&mut self, mux: &M, session: &Session) -> MuxResult<()> {
        let (Some(bar), Some(term)) = (&session.bar_pane, session.active_terminal_pane()) else {
            return Ok(());
        };

        let main_height = mux
            .pane_size(&session.pane_id)
            .tolerate()?
            .map(|(_, h)| h)
            .unwrap_or(0);
        let area = (main_height as u32 * self.config.terminal_percent as u32 / 100) as u16;
        let bar_size = if area > self.config.bar_height + 1 {
            Size::Cells(area)
        } else {
            Size::Percent(self.config.terminal_percent)
        };

        mux.join_pane(bar, &session.pane_id, Placement::below(Some(bar_size)))
            .tolerate()?;
        mux.join_pane(
            &term,
            bar,
            Placement::below(Some(body_size(area, self.config.bar_height))),
        )
        .tolerate()?;

        self.resize.pin(mux, bar)?;
        self.resize
            .install(mux, ResizeTriple::new(&session.pane_id, bar, &term))?;
        self.satellites.push(mux, bar, &session.tab_state())?;
        Ok(())
    }

    /// Join `term` into the visible slot under the bar, which currently
    /// spans the whole terminal area
    fn join_below_bar(&mut self, mux: &M, session: &Session, term: &str) -> MuxResult<()> {
        let Some(bar) = &session.bar_pane else {
            return Ok(());
        };
        let area = mux.pane_size(bar).tolerate()?.map(|(_, h)| h).unwrap_or(0);
        mux.join_pane(
            term,
            bar,
            Placement::below(Some(body_size(area, self.config.bar_height))),
        )
        .tolerate()?;
        self.resize.pin(mux, bar)?;
        self.resize
            .install(mux, ResizeTriple::new(&session.pane_id, bar, term))?;
        Ok(())
    }

    /// Whether `session_id`'s panes are currently next to the sidebar
    fn is_visible(&self, model: &Model, session_id: &str) -> bool {
        self.mode == LayoutMode::Normal && model.is_active(session_id)
    }

    /// Open a terminal in the active session's worktree and show it
    pub fn new_terminal(&mut self, model: &mut Model) -> MuxResult<Option<String>> {
        let Some(session) = model.active().cloned() else {
            debug!("new terminal without an active session");
            return Ok(None);
        };
        if self.mode != LayoutMode::Normal {
            return Ok(None);
        }

        let mux = Rc::clone(&self.mux);
        let _lock = self.lock.raise(&*mux);
        let cwd = self.worktree_dir(model, &session.id);

        let (pane, bar) = match (&session.bar_pane, session.active_terminal_pane()) {
            (Some(bar), Some(current)) => {
                // The new pane takes the current one's slot once it is parked
                let Some(pane) = mux
                    .split_pane(
                        &current,
                        Placement::above(Some(Size::Percent(50))),
                        Some(&cwd),
                        None,
                    )
                    .tolerate()?
                else {
                    return Ok(None);
                };
                mux.break_pane(&current).tolerate()?;
                (pane, bar.clone())
            }
            _ => {
                let area = Placement::below(Some(Size::Percent(self.config.terminal_percent)));
                let Some(pane) = mux
                    .split_pane(&session.pane_id, area, Some(&cwd), None)
                    .tolerate()?
                else {
                    return Ok(None);
                };
                let strip = Placement::above(Some(Size::Cells(self.config.bar_height)));
                let Some(bar) = mux.split_pane(&pane, strip, Some(&cwd), None).tolerate()? else {
                    mux.kill_pane(&pane).tolerate()?;
                    return Ok(None);
                };
                (pane, bar)
            }
        };

        let id = model.next_id('t');
        let Some(session) = model.session_mut(&session.id) else {
            return Ok(None);
        };
        let first = session.terminals.is_empty();
        let terminal = Terminal {
            id: id.clone(),
            session_id: session.id.clone(),
            pane_id: pane.clone(),
            title: format!("shell {}", session.terminals.len() + 1),
            created: now(),
        };
        session.terminals.push(terminal);
        session.active_terminal = session.terminals.len() - 1;
        session.bar_pane = Some(bar.clone());
        let session = session.clone();

        self.resize.pin(&*mux, &bar)?;
        self.resize
            .install(&*mux, ResizeTriple::new(&session.pane_id, &bar, &pane))?;

        let state = session.tab_state();
        if first {
            if !self
                .satellites
                .spawn(&*mux, &bar, SatelliteKind::TermBar, &session.id, &state)?
            {
                warn!(session = %session.id, "tab bar unavailable");
            }
        } else {
            self.satellites.push(&*mux, &bar, &state)?;
        }

        self.reassert(&*mux)?;
        mux.select_pane(&pane).tolerate()?;
        info!(session = %session.id, terminal = %id, %pane, "opened terminal");
        Ok(Some(id))
    }

    /// Show terminal `index` of the active session in place of the current one
    pub fn switch_terminal(&mut self, model: &mut Model, index: usize) -> MuxResult<()> {
        let Some(session) = model.active().cloned() else {
            return Ok(());
        };
        if index >= session.terminals.len() || index == session.active_terminal {
            return Ok(());
        }
        if !self.is_visible(model, &session.id) {
            return Ok(());
        }

        let mux = Rc::clone(&self.mux);
        let _lock = self.lock.raise(&*mux);

        if let Some(bar) = &session.bar_pane {
            self.resize.remove_for_bar(&*mux, bar)?;
        }
        if let Some(current) = session.active_terminal_pane() {
            mux.break_pane(&current).tolerate()?;
        }

        let Some(session) = model.session_mut(&session.id) else {
            return Ok(());
        };
        session.active_terminal = index;
        let session = session.clone();
        let term = session.terminals[index].pane_id.clone();

        self.join_below_bar(&*mux, &session, &term)?;
        if let Some(bar) = &session.bar_pane {
            self.satellites.push(&*mux, bar, &session.tab_state())?;
        }
        self.reassert(&*mux)?;
        debug!(session = %session.id, index, "switched terminal");
        Ok(())
    }

    /// Cycle the active session's visible terminal by `step` (wrapping)
    pub fn cycle_terminal(&mut self, model: &mut Model, step: isize) -> MuxResult<()> {
        let Some(session) = model.active() else {
            return Ok(());
        };
        let len = session.terminals.len() as isize;
        if len < 2 {
            return Ok(());
        }
        let index = (session.active_terminal as isize + step).rem_euclid(len) as usize;
        self.switch_terminal(model, index)
    }

    /// Kill terminal `index` of a session.
    ///
    /// The last terminal takes the tab bar with it. Otherwise the slot after
    /// the deleted one becomes active (clamped), and if the deleted terminal
    /// was the visible one its successor is joined in with a single join.
    pub fn delete_terminal(
        &mut self,
        model: &mut Model,
        session_id: &str,
        index: usize,
    ) -> MuxResult<()> {
        let Some(session) = model.session(session_id).cloned() else {
            return Ok(());
        };
        let Some(doomed) = session.terminals.get(index).cloned() else {
            return Ok(());
        };

        let visible = self.is_visible(model, session_id);
        let was_active = index == session.active_terminal;

        let mux = Rc::clone(&self.mux);
        let _lock = self.lock.raise(&*mux);

        if session.terminals.len() == 1 {
            if let Some(bar) = &session.bar_pane {
                self.resize.remove_for_bar(&*mux, bar)?;
            }
            mux.kill_pane(&doomed.pane_id).tolerate()?;
            if let Some(bar) = &session.bar_pane {
                mux.kill_pane(bar).tolerate()?;
            }
            if let Some(session) = model.session_mut(session_id) {
                session.terminals.clear();
                session.active_terminal = 0;
                session.bar_pane = None;
            }
            self.reassert(&*mux)?;
            info!(session = %session_id, terminal = %doomed.id, "closed last terminal");
            return Ok(());
        }

        if was_active {
            if let Some(bar) = &session.bar_pane {
                self.resize.remove_for_bar(&*mux, bar)?;
            }
        }
        mux.kill_pane(&doomed.pane_id).tolerate()?;

        let Some(session) = model.session_mut(session_id) else {
            return Ok(());
        };
        session.terminals.remove(index);
        if was_active {
            session.active_terminal = index.min(session.terminals.len() - 1);
        } else if index < session.active_terminal {
            session.active_terminal -= 1;
        }
        let session = session.clone();

        if was_active && visible {
            if let Some(term) = session.active_terminal_pane() {
                self.join_below_bar(&*mux, &session, &term)?;
            }
        }
        if let Some(bar) = &session.bar_pane {
            self.satellites.push(&*mux, bar, &session.tab_state())?;
        }
        self.reassert(&*mux)?;
        info!(session = %session_id, terminal = %doomed.id, "closed terminal");
        Ok(())
    }

    /// Focus the visible terminal of the active session
    pub fn focus_terminal(&self, model: &Model) -> MuxResult<()> {
        let Some(session) = model.active() else {
            return Ok(());
        };
        if !self.is_visible(model, &session.id) {
            return Ok(());
        }
        if let Some(term) = session.active_terminal_pane() {
            self.mux.select_pane(&term).tolerate()?;
        }
        Ok(())
    }
}
