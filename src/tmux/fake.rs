//! In-memory pane tree for tests.
//!
//! Window 0 is the visible window; every break moves a pane into a fresh
//! background window. Mutating calls are recorded in order so tests can
//! assert on the exact operation sequence.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::{Direction, MuxError, MuxResult, Multiplexer, PaneId, Placement, Size};

const VISIBLE_WINDOW: u32 = 0;
const DEFAULT_HEIGHT: u16 = 40;
const DEFAULT_WIDTH: u16 = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Create(PaneId),
    Split { target: PaneId, pane: PaneId, full_span: bool },
    Resize { pane: PaneId, width: Option<u16>, height: Option<u16> },
    Select(PaneId),
    Literal { pane: PaneId, text: String },
    Key { pane: PaneId, key: String },
    Break(PaneId),
    Join { source: PaneId, target: PaneId, full_span: bool },
    Kill(PaneId),
    Respawn { pane: PaneId, command: String },
    SetHook(String),
    RemoveHook(String),
    Bind(String),
    Unbind(String),
    SetOption(String),
    UnsetOption(String),
    Detach,
    KillSession,
}

#[derive(Debug, Clone)]
struct FakePane {
    window: u32,
    width: u16,
    height: u16,
    command: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    next_pane: u32,
    next_window: u32,
    panes: BTreeMap<PaneId, FakePane>,
    ops: Vec<Op>,
    hooks: HashMap<String, String>,
    bindings: HashMap<String, String>,
    options: HashMap<String, String>,
    captures: HashMap<PaneId, String>,
}

impl State {
    fn add_pane(&mut self, window: u32, height: u16, command: Option<&str>) -> PaneId {
        let id = format!("%{}", self.next_pane);
        self.next_pane += 1;
        self.panes.insert(
            id.clone(),
            FakePane {
                window,
                width: DEFAULT_WIDTH,
                height,
                command: command.map(str::to_string),
            },
        );
        id
    }

    fn new_window(&mut self) -> u32 {
        self.next_window += 1;
        self.next_window
    }

    fn pane(&self, id: &str) -> MuxResult<&FakePane> {
        self.panes
            .get(id)
            .ok_or_else(|| MuxError::TargetGone(id.to_string()))
    }

    fn pane_mut(&mut self, id: &str) -> MuxResult<&mut FakePane> {
        self.panes
            .get_mut(id)
            .ok_or_else(|| MuxError::TargetGone(id.to_string()))
    }
}

fn placed_height(placement: Placement, fallback: u16) -> u16 {
    match (placement.direction, placement.size) {
        (Direction::Vertical, Some(Size::Cells(n))) => n,
        (Direction::Vertical, Some(Size::Percent(p))) => (fallback as u32 * p as u32 / 100) as u16,
        _ => fallback,
    }
}

#[derive(Debug, Default)]
pub struct FakeTmux {
    state: RefCell<State>,
}

impl FakeTmux {
    /// A fake with one visible pane (the sidebar), returned alongside it
    pub fn with_sidebar() -> (Self, PaneId) {
        let fake = Self::default();
        let sidebar = fake
            .state
            .borrow_mut()
            .add_pane(VISIBLE_WINDOW, DEFAULT_HEIGHT, None);
        (fake, sidebar)
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.borrow().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state.borrow_mut().ops.clear();
    }

    pub fn exists(&self, pane: &str) -> bool {
        self.state.borrow().panes.contains_key(pane)
    }

    pub fn is_attached(&self, pane: &str) -> bool {
        self.state
            .borrow()
            .panes
            .get(pane)
            .is_some_and(|p| p.window == VISIBLE_WINDOW)
    }

    /// Panes currently in the visible window
    pub fn attached(&self) -> Vec<PaneId> {
        self.state
            .borrow()
            .panes
            .iter()
            .filter(|(_, p)| p.window == VISIBLE_WINDOW)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn height(&self, pane: &str) -> Option<u16> {
        self.state.borrow().panes.get(pane).map(|p| p.height)
    }

    pub fn command(&self, pane: &str) -> Option<String> {
        self.state
            .borrow()
            .panes
            .get(pane)
            .and_then(|p| p.command.clone())
    }

    pub fn hook(&self, name: &str) -> Option<String> {
        self.state.borrow().hooks.get(name).cloned()
    }

    pub fn binding(&self, key: &str) -> Option<String> {
        self.state.borrow().bindings.get(key).cloned()
    }

    pub fn option(&self, name: &str) -> Option<String> {
        self.state.borrow().options.get(name).cloned()
    }

    /// Make a pane's captured content return `text`
    pub fn set_capture(&self, pane: &str, text: &str) {
        self.state
            .borrow_mut()
            .captures
            .insert(pane.to_string(), text.to_string());
    }

    /// Simulate a pane disappearing behind the orchestrator's back
    pub fn vanish(&self, pane: &str) {
        self.state.borrow_mut().panes.remove(pane);
    }

    /// Literal strings typed into `pane`, in order
    pub fn literals(&self, pane: &str) -> Vec<String> {
        self.state
            .borrow()
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Literal { pane: p, text } if p == pane => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: Op) {
        self.state.borrow_mut().ops.push(op);
    }
}

impl Multiplexer for FakeTmux {
    fn create_pane(&self, _cwd: &Path, command: Option<&str>) -> MuxResult<PaneId> {
        let mut state = self.state.borrow_mut();
        let window = state.new_window();
        let id = state.add_pane(window, DEFAULT_HEIGHT, command);
        state.ops.push(Op::Create(id.clone()));
        Ok(id)
    }

    fn split_pane(
        &self,
        target: &str,
        placement: Placement,
        _cwd: Option<&Path>,
        command: Option<&str>,
    ) -> MuxResult<PaneId> {
        let mut state = self.state.borrow_mut();
        let (window, height) = {
            let t = state.pane(target)?;
            (t.window, t.height)
        };
        let id = state.add_pane(window, placed_height(placement, height), command);
        state.ops.push(Op::Split {
            target: target.to_string(),
            pane: id.clone(),
            full_span: placement.full_span,
        });
        Ok(id)
    }

    fn resize_pane(&self, pane: &str, width: Option<u16>, height: Option<u16>) -> MuxResult<()> {
        self.record(Op::Resize {
            pane: pane.to_string(),
            width,
            height,
        });
        let mut state = self.state.borrow_mut();
        let p = state.pane_mut(pane)?;
        if let Some(w) = width {
            p.width = w;
        }
        if let Some(h) = height {
            p.height = h;
        }
        Ok(())
    }

    fn select_pane(&self, pane: &str) -> MuxResult<()> {
        self.record(Op::Select(pane.to_string()));
        self.state.borrow().pane(pane).map(drop)
    }

    fn send_literal(&self, pane: &str, text: &str, enter: bool) -> MuxResult<()> {
        self.record(Op::Literal {
            pane: pane.to_string(),
            text: text.to_string(),
        });
        self.state.borrow().pane(pane)?;
        if enter {
            self.send_key(pane, "Enter")?;
        }
        Ok(())
    }

    fn send_key(&self, pane: &str, key: &str) -> MuxResult<()> {
        self.record(Op::Key {
            pane: pane.to_string(),
            key: key.to_string(),
        });
        self.state.borrow().pane(pane).map(drop)
    }

    fn break_pane(&self, pane: &str) -> MuxResult<()> {
        self.record(Op::Break(pane.to_string()));
        let mut state = self.state.borrow_mut();
        let window = state.new_window();
        state.pane_mut(pane)?.window = window;
        Ok(())
    }

    fn join_pane(&self, source: &str, target: &str, placement: Placement) -> MuxResult<()> {
        self.record(Op::Join {
            source: source.to_string(),
            target: target.to_string(),
            full_span: placement.full_span,
        });
        let mut state = self.state.borrow_mut();
        let (window, height) = {
            let t = state.pane(target)?;
            (t.window, t.height)
        };
        let height = placed_height(placement, height);
        let p = state.pane_mut(source)?;
        p.window = window;
        p.height = height;
        Ok(())
    }

    fn kill_pane(&self, pane: &str) -> MuxResult<()> {
        self.record(Op::Kill(pane.to_string()));
        self.state
            .borrow_mut()
            .panes
            .remove(pane)
            .map(drop)
            .ok_or_else(|| MuxError::TargetGone(pane.to_string()))
    }

    fn respawn_pane(&self, pane: &str, command: &str) -> MuxResult<()> {
        self.record(Op::Respawn {
            pane: pane.to_string(),
            command: command.to_string(),
        });
        self.state.borrow_mut().pane_mut(pane)?.command = Some(command.to_string());
        Ok(())
    }

    fn set_hook(&self, hook: &str, command: &str) -> MuxResult<()> {
        self.record(Op::SetHook(hook.to_string()));
        self.state
            .borrow_mut()
            .hooks
            .insert(hook.to_string(), command.to_string());
        Ok(())
    }

    fn remove_hook(&self, hook: &str) -> MuxResult<()> {
        self.record(Op::RemoveHook(hook.to_string()));
        self.state.borrow_mut().hooks.remove(hook);
        Ok(())
    }

    fn bind_key(&self, _table: &str, key: &str, command: &str) -> MuxResult<()> {
        self.record(Op::Bind(key.to_string()));
        self.state
            .borrow_mut()
            .bindings
            .insert(key.to_string(), command.to_string());
        Ok(())
    }

    fn unbind_key(&self, _table: &str, key: &str) -> MuxResult<()> {
        self.record(Op::Unbind(key.to_string()));
        self.state.borrow_mut().bindings.remove(key);
        Ok(())
    }

    fn pane_size(&self, pane: &str) -> MuxResult<(u16, u16)> {
        let state = self.state.borrow();
        let p = state.pane(pane)?;
        Ok((p.width, p.height))
    }

    fn global_option(&self, name: &str) -> MuxResult<Option<String>> {
        Ok(self.state.borrow().options.get(name).cloned())
    }

    fn set_global_option(&self, name: &str, value: &str) -> MuxResult<()> {
        self.record(Op::SetOption(name.to_string()));
        self.state
            .borrow_mut()
            .options
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn unset_global_option(&self, name: &str) -> MuxResult<()> {
        self.record(Op::UnsetOption(name.to_string()));
        self.state.borrow_mut().options.remove(name);
        Ok(())
    }

    fn capture_pane(&self, pane: &str, _lines: usize) -> MuxResult<String> {
        let state = self.state.borrow();
        state.pane(pane)?;
        Ok(state.captures.get(pane).cloned().unwrap_or_default())
    }

    fn detach_client(&self) -> MuxResult<()> {
        self.record(Op::Detach);
        Ok(())
    }

    fn kill_session(&self) -> MuxResult<()> {
        self.record(Op::KillSession);
        Ok(())
    }
}
