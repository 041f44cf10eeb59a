use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::{Direction, MuxError, MuxResult, Multiplexer, PaneId, Placement, Size};

/// Environment variable set on tmux sessions the launcher created itself
pub const OWNED_SESSION_ENV: &str = "CLAUDE_PANES_OWNED";

/// Wrapper for tmux command execution
#[derive(Debug, Clone, Copy, Default)]
pub struct Tmux;

impl Tmux {
    /// Whether the tmux binary can be executed
    pub fn is_available() -> bool {
        Command::new("tmux")
            .arg("-V")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// The pane this process runs in, if it runs inside tmux
    pub fn current_pane() -> Option<PaneId> {
        std::env::var("TMUX_PANE").ok().filter(|p| !p.is_empty())
    }

    /// Whether the surrounding tmux session was created by `launch`
    pub fn owns_session() -> bool {
        std::env::var(OWNED_SESSION_ENV).is_ok_and(|v| v == "1")
    }

    /// Create (or reuse) a detached session running `command`, then attach to it.
    ///
    /// Returns once the client detaches or the session ends.
    pub fn launch(session: &str, cwd: &Path, command: &str) -> Result<()> {
        let exists = Command::new("tmux")
            .args(["has-session", "-t", session])
            .output()
            .context("Failed to execute tmux has-session")?
            .status
            .success();

        if !exists {
            let cwd = cwd.to_string_lossy();
            let env = format!("{}=1", OWNED_SESSION_ENV);
            let pane = run(&[
                "new-session",
                "-d",
                "-P",
                "-F",
                "#{pane_id}",
                "-s",
                session,
                "-c",
                &*cwd,
                "-e",
                env.as_str(),
                command,
            ])
            .with_context(|| format!("Failed to create tmux session {}", session))?;
            info!(%session, pane = %pane.trim(), "created tmux session");
        }

        let status = Command::new("tmux")
            .args(["attach-session", "-t", session])
            .status()
            .context("Failed to attach to tmux session")?;

        if !status.success() {
            anyhow::bail!("Failed to attach to session {}", session);
        }

        Ok(())
    }
}

/// Run a tmux command and return its stdout
fn run(args: &[&str]) -> MuxResult<String> {
    let output = Command::new("tmux").args(args).output()?;

    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    debug!(args = ?args, %stderr, "tmux command failed");
    Err(classify_failure(args, stderr))
}

/// Map a tmux error message onto the error taxonomy
fn classify_failure(args: &[&str], stderr: String) -> MuxError {
    let gone = stderr.contains("can't find")
        || stderr.contains("no such")
        || stderr.contains("not found")
        || stderr.contains("no current");

    if gone {
        let target = args
            .iter()
            .position(|a| *a == "-t" || *a == "-s")
            .and_then(|i| args.get(i + 1))
            .map(|t| t.to_string())
            .unwrap_or_else(|| stderr.clone());
        MuxError::TargetGone(target)
    } else {
        MuxError::Rejected {
            command: args.join(" "),
            stderr,
        }
    }
}

/// Flags shared by `split-window` and `join-pane`
fn placement_args(placement: Placement) -> Vec<String> {
    let mut args = vec![match placement.direction {
        Direction::Horizontal => "-h".to_string(),
        Direction::Vertical => "-v".to_string(),
    }];
    if placement.before {
        args.push("-b".to_string());
    }
    if placement.full_span {
        args.push("-f".to_string());
    }
    match placement.size {
        Some(Size::Percent(p)) => {
            args.push("-l".to_string());
            args.push(format!("{}%", p.min(100)));
        }
        Some(Size::Cells(n)) => {
            args.push("-l".to_string());
            args.push(n.to_string());
        }
        None => {}
    }
    args
}

fn parse_size(output: &str) -> Option<(u16, u16)> {
    let mut parts = output.trim().split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    Some((width, height))
}

impl Multiplexer for Tmux {
    fn create_pane(&self, cwd: &Path, command: Option<&str>) -> MuxResult<PaneId> {
        let cwd = cwd.to_string_lossy();
        let mut args = vec!["new-window", "-d", "-P", "-F", "#{pane_id}", "-c", &*cwd];
        if let Some(command) = command {
            args.push(command);
        }
        Ok(run(&args)?.trim().to_string())
    }

    fn split_pane(
        &self,
        target: &str,
        placement: Placement,
        cwd: Option<&Path>,
        command: Option<&str>,
    ) -> MuxResult<PaneId> {
        let placement = placement_args(placement);
        let cwd = cwd.map(|c| c.to_string_lossy().into_owned());

        let mut args = vec!["split-window", "-d", "-P", "-F", "#{pane_id}", "-t", target];
        args.extend(placement.iter().map(String::as_str));
        if let Some(ref cwd) = cwd {
            args.push("-c");
            args.push(cwd);
        }
        if let Some(command) = command {
            args.push(command);
        }
        Ok(run(&args)?.trim().to_string())
    }

    fn resize_pane(&self, pane: &str, width: Option<u16>, height: Option<u16>) -> MuxResult<()> {
        let width = width.map(|w| w.to_string());
        let height = height.map(|h| h.to_string());

        let mut args = vec!["resize-pane", "-t", pane];
        if let Some(ref w) = width {
            args.push("-x");
            args.push(w);
        }
        if let Some(ref h) = height {
            args.push("-y");
            args.push(h);
        }
        run(&args).map(drop)
    }

    fn select_pane(&self, pane: &str) -> MuxResult<()> {
        run(&["select-pane", "-t", pane]).map(drop)
    }

    fn send_literal(&self, pane: &str, text: &str, enter: bool) -> MuxResult<()> {
        run(&["send-keys", "-t", pane, "-l", text])?;
        if enter {
            self.send_key(pane, "Enter")?;
        }
        Ok(())
    }

    fn send_key(&self, pane: &str, key: &str) -> MuxResult<()> {
        run(&["send-keys", "-t", pane, key]).map(drop)
    }

    fn break_pane(&self, pane: &str) -> MuxResult<()> {
        run(&["break-pane", "-d", "-s", pane]).map(drop)
    }

    fn join_pane(&self, source: &str, target: &str, placement: Placement) -> MuxResult<()> {
        let placement = placement_args(placement);
        let mut args = vec!["join-pane", "-d", "-s", source, "-t", target];
        args.extend(placement.iter().map(String::as_str));
        run(&args).map(drop)
    }

    fn kill_pane(&self, pane: &str) -> MuxResult<()> {
        run(&["kill-pane", "-t", pane]).map(drop)
    }

    fn respawn_pane(&self, pane: &str, command: &str) -> MuxResult<()> {
        run(&["respawn-pane", "-k", "-t", pane, command]).map(drop)
    }

    fn set_hook(&self, hook: &str, command: &str) -> MuxResult<()> {
        run(&["set-hook", "-g", hook, command]).map(drop)
    }

    fn remove_hook(&self, hook: &str) -> MuxResult<()> {
        run(&["set-hook", "-gu", hook]).map(drop)
    }

    fn bind_key(&self, table: &str, key: &str, command: &str) -> MuxResult<()> {
        run(&["bind-key", "-T", table, key, command]).map(drop)
    }

    fn unbind_key(&self, table: &str, key: &str) -> MuxResult<()> {
        run(&["unbind-key", "-T", table, key]).map(drop)
    }

    fn pane_size(&self, pane: &str) -> MuxResult<(u16, u16)> {
        let output = run(&[
            "display-message",
            "-p",
            "-t",
            pane,
            "#{pane_width} #{pane_height}",
        ])?;
        parse_size(&output).ok_or_else(|| MuxError::Rejected {
            command: format!("display-message -t {}", pane),
            stderr: format!("unexpected size output {:?}", output.trim()),
        })
    }

    fn global_option(&self, name: &str) -> MuxResult<Option<String>> {
        let value = run(&["show-options", "-gqv", name])?.trim().to_string();
        Ok(if value.is_empty() { None } else { Some(value) })
    }

    fn set_global_option(&self, name: &str, value: &str) -> MuxResult<()> {
        run(&["set-option", "-gq", name, value]).map(drop)
    }

    fn unset_global_option(&self, name: &str) -> MuxResult<()> {
        run(&["set-option", "-gqu", name]).map(drop)
    }

    fn capture_pane(&self, pane: &str, lines: usize) -> MuxResult<String> {
        let content = run(&["capture-pane", "-t", pane, "-p", "-J"])?;

        // Keep only the tail that carries the agent's prompt/spinner
        let non_empty: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = non_empty.len().saturating_sub(lines);
        Ok(non_empty[start..].join("\n"))
    }

    fn detach_client(&self) -> MuxResult<()> {
        run(&["detach-client"]).map(drop)
    }

    fn kill_session(&self) -> MuxResult<()> {
        run(&["kill-session"]).map(drop)
    }
}
