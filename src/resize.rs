//! Resize enforcement for the one-row terminal tab bar
//!
//! tmux's resize hook only says "something changed", not which border moved.
//! A generated shell script, run from both the `after-resize-pane` hook and
//! the border drag-release binding, infers the user's intent from which
//! neighbor shrank since its last run, gives the bar's overshoot to the other
//! neighbor and pins the bar back to its fixed height.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::tmux::{Multiplexer, MuxResult, PaneId, Tolerate};

pub const RESIZE_HOOK: &str = "after-resize-pane";
pub const DRAG_END_TABLE: &str = "root";
pub const DRAG_END_KEY: &str = "MouseDragEnd1Border";

/// Global option used as a cross-process lock by the script and the controller
pub const LOCK_OPTION: &str = "@claude-panes-resize-lock";

const PREV_HEIGHT_PREFIX: &str = "@claude-panes-prev-height-";

/// The panes a tab bar sits between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeTriple {
    /// Agent pane above the bar
    pub top: PaneId,
    /// The fixed-height tab bar
    pub bar: PaneId,
    /// Visible terminal below the bar
    pub body: PaneId,
}

impl ResizeTriple {
    pub fn new(top: &str, bar: &str, body: &str) -> Self {
        Self {
            top: top.to_string(),
            bar: bar.to_string(),
            body: body.to_string(),
        }
    }
}

fn pane_slug(pane: &str) -> String {
    pane.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Global option holding a pane's height as last recorded by the script
pub fn prev_height_option(pane: &str) -> String {
    format!("{}{}", PREV_HEIGHT_PREFIX, pane_slug(pane))
}

/// Deterministic script location for a bar/body pair
pub fn script_path(dir: &Path, triple: &ResizeTriple) -> PathBuf {
    dir.join(format!(
        "resize-{}-{}.sh",
        pane_slug(&triple.bar),
        pane_slug(&triple.body)
    ))
}

/// Generate the reconciliation script for `triple` at `height` rows.
pub fn generate_script(triple: &ResizeTriple, height: u16) -> String {
    let q = |s: &str| shell_words::quote(s).into_owned();
    let top = q(&triple.top);
    let bar = q(&triple.bar);
    let body = q(&triple.body);
    let prev_top = q(&prev_height_option(&triple.top));
    let prev_body = q(&prev_height_option(&triple.body));
    let lock = q(LOCK_OPTION);

    format!(
        r#"#!/bin/sh
# Pins tab bar {bar} to {height} row(s) between {top} and {body}.
lock={lock}
[ "$(tmux show-options -gqv "$lock")" = "1" ] && exit 0

height() {{ tmux display-message -p -t "$1" '#{{pane_height}}' 2>/dev/null; }}

bar_h=$(height {bar})
[ -n "$bar_h" ] || exit 0
top_h=$(height {top})
body_h=$(height {body})

if [ "$bar_h" -eq {height} ]; then
    tmux set-option -gq {prev_top} "$top_h"
    tmux set-option -gq {prev_body} "$body_h"
    exit 0
fi

tmux set-option -gq "$lock" 1
trap 'tmux set-option -gqu "$lock"' EXIT
trap 'exit 1' INT TERM HUP

prev_top=$(tmux show-options -gqv {prev_top})
prev_body=$(tmux show-options -gqv {prev_body})
delta=$((bar_h - {height}))

if [ -n "$prev_top" ] && [ -n "$top_h" ] && [ "$top_h" -lt "$prev_top" ]; then
    tmux resize-pane -t {body} -y $((body_h + delta))
elif [ -n "$prev_body" ] && [ -n "$body_h" ] && [ "$body_h" -lt "$prev_body" ]; then
    tmux resize-pane -t {top} -y $((top_h + delta))
fi
tmux resize-pane -t {bar} -y {height}

tmux set-option -gq {prev_top} "$(height {top})"
tmux set-option -gq {prev_body} "$(height {body})"
"#
    )
}

/// A boolean shared between processes through a multiplexer-global option.
///
/// tmux offers no real IPC primitive to its hook scripts, so the lock the
/// resize script checks is a global user option. `raise` returns a guard
/// that clears the option when dropped, including on unwind.
#[derive(Debug, Clone)]
pub struct SharedFlag {
    name: String,
}

impl SharedFlag {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_raised<M: Multiplexer + ?Sized>(&self, mux: &M) -> bool {
        matches!(mux.global_option(&self.name), Ok(Some(v)) if v == "1")
    }

    pub fn raise<'m, M: Multiplexer + ?Sized>(&self, mux: &'m M) -> FlagGuard<'m, M> {
        if let Err(e) = mux.set_global_option(&self.name, "1") {
            warn!(flag = %self.name, error = %e, "failed to raise shared flag");
        }
        FlagGuard {
            mux,
            name: self.name.clone(),
        }
    }

    /// Clear the flag regardless of who raised it
    pub fn clear<M: Multiplexer + ?Sized>(&self, mux: &M) {
        let _ = mux.unset_global_option(&self.name);
    }
}

/// Clears its `SharedFlag` on drop
#[must_use = "the flag is cleared as soon as the guard is dropped"]
pub struct FlagGuard<'m, M: Multiplexer + ?Sized> {
    mux: &'m M,
    name: String,
}

impl<M: Multiplexer + ?Sized> Drop for FlagGuard<'_, M> {
    fn drop(&mut self) {
        if let Err(e) = self.mux.unset_global_option(&self.name) {
            warn!(flag = %self.name, error = %e, "failed to clear shared flag");
        }
    }
}

/// Installs and removes the resize hook for at most one triple at a time
#[derive(Debug)]
pub struct ResizeEnforcer {
    script_dir: PathBuf,
    height: u16,
    installed: Option<ResizeTriple>,
}

impl ResizeEnforcer {
    pub fn new(script_dir: PathBuf, height: u16) -> Self {
        Self {
            script_dir,
            height,
            installed: None,
        }
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn installed(&self) -> Option<&ResizeTriple> {
        self.installed.as_ref()
    }

    /// Write the script for `triple` and register it, replacing any previous triple
    pub fn install<M: Multiplexer + ?Sized>(
        &mut self,
        mux: &M,
        triple: ResizeTriple,
    ) -> MuxResult<()> {
        if self.installed.as_ref() == Some(&triple) {
            return Ok(());
        }
        if self.installed.is_some() {
            self.remove(mux)?;
        }

        let path = script_path(&self.script_dir, &triple);
        let written = fs::create_dir_all(&self.script_dir)
            .and_then(|_| fs::write(&path, generate_script(&triple, self.height)));
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "failed to write resize script");
            return Ok(());
        }

        let command = format!(
            "run-shell -b {}",
            shell_words::quote(&format!("sh {}", shell_words::quote(&path.to_string_lossy())))
        );
        mux.set_hook(RESIZE_HOOK, &command).tolerate()?;
        mux.bind_key(DRAG_END_TABLE, DRAG_END_KEY, &command).tolerate()?;

        // Seed the previous heights so the first drag has something to compare against
        for pane in [&triple.top, &triple.body] {
            if let Some((_, h)) = mux.pane_size(pane).tolerate()? {
                mux.set_global_option(&prev_height_option(pane), &h.to_string())
                    .tolerate()?;
            }
        }

        info!(top = %triple.top, bar = %triple.bar, body = %triple.body, "installed resize hook");
        self.installed = Some(triple);
        Ok(())
    }

    /// Unregister the hook and binding. Must run before the triple's panes are killed.
    pub fn remove<M: Multiplexer + ?Sized>(&mut self, mux: &M) -> MuxResult<()> {
        let Some(triple) = self.installed.take() else {
            return Ok(());
        };

        mux.remove_hook(RESIZE_HOOK).tolerate()?;
        mux.unbind_key(DRAG_END_TABLE, DRAG_END_KEY).tolerate()?;
        for pane in [&triple.top, &triple.body] {
            mux.unset_global_option(&prev_height_option(pane)).tolerate()?;
        }

        let path = script_path(&self.script_dir, &triple);
        if let Err(e) = fs::remove_file(&path) {
            debug!(path = %path.display(), error = %e, "resize script already gone");
        }

        info!(bar = %triple.bar, "removed resize hook");
        Ok(())
    }

    /// Remove the hook only if it governs `bar`
    pub fn remove_for_bar<M: Multiplexer + ?Sized>(&mut self, mux: &M, bar: &str) -> MuxResult<()> {
        if self.installed.as_ref().is_some_and(|t| t.bar == bar) {
            self.remove(mux)?;
        }
        Ok(())
    }

    /// Clear hook state left behind by a previous controller run
    pub fn reset<M: Multiplexer + ?Sized>(&mut self, mux: &M) -> MuxResult<()> {
        self.installed = None;
        mux.remove_hook(RESIZE_HOOK).tolerate()?;
        mux.unbind_key(DRAG_END_TABLE, DRAG_END_KEY).tolerate()?;
        mux.unset_global_option(LOCK_OPTION).tolerate()?;
        Ok(())
    }

    /// Force `bar` back to the fixed height
    pub fn pin<M: Multiplexer + ?Sized>(&self, mux: &M, bar: &str) -> MuxResult<()> {
        mux.resize_pane(bar, None, Some(self.height)).tolerate()?;
        Ok(())
    }
}
