mod app;
mod config;
mod git;
mod input;
mod layout;
mod model;
mod relay;
mod resize;
mod satellite;
mod satellites;
mod signals;
mod status;
mod tmux;
mod ui;

use std::io::{self, stdout};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::config::Config;
use crate::git::{GitWorktrees, Worktrees};
use crate::layout::{LayoutConfig, PaneLayout};
use crate::satellite::{SatelliteKind, Satellites};
use crate::satellites::TerminalGuard;
use crate::tmux::{Multiplexer, Tmux, Tolerate};

/// Environment variable holding the log filter
const LOG_ENV: &str = "CLAUDE_PANES_LOG";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let satellite = args
        .first()
        .and_then(|name| SatelliteKind::from_subcommand(name));

    init_logging(satellite.map_or("controller", SatelliteKind::subcommand));
    signals::install();

    let result = match satellite {
        Some(kind) => satellites::run(kind, &args[1..]),
        None => run_controller(),
    };
    if let Err(ref e) = result {
        error!(error = %format!("{:#}", e), "exiting with error");
    }
    result
}

/// Log to `<cache dir>/claude-panes/<role>.log`; stdout belongs to the TUI
fn init_logging(role: &str) {
    let dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("claude-panes");
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{}.log", role)))
    else {
        return;
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| "info".into()))
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
}

/// tmux session names may not contain `.` or `:`
fn session_name(repo: &Path) -> String {
    let name = repo
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("repo")
        .replace(['.', ':'], "-");
    format!("claude-panes-{}", name)
}

fn script_dir() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("claude-panes")
}

fn run_controller() -> Result<()> {
    if !Tmux::is_available() {
        bail!("tmux is not installed or not on PATH");
    }

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let git = GitWorktrees::discover(&cwd)?;
    let exe = std::env::current_exe().context("Failed to locate own executable")?;

    let Some(sidebar) = Tmux::current_pane() else {
        let command = shell_words::quote(&exe.to_string_lossy()).into_owned();
        let session = session_name(git.root());
        info!(%session, "launching tmux session");
        return Tmux::launch(&session, git.root(), &command);
    };

    let config = Config::load();
    let layout = PaneLayout::new(
        Tmux,
        sidebar.clone(),
        git.root().to_path_buf(),
        LayoutConfig::from(&config),
        Satellites::new(Some(exe), &sidebar),
        script_dir(),
    );
    let mut app = App::new(layout, git, &config)?;
    app.start()?;
    info!(%sidebar, "controller started");

    let guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let result = run(&mut terminal, &mut app);
    drop(guard);
    result?;

    if let Some(fatal) = app.fatal.take() {
        return Err(fatal.into());
    }

    if app.kill_requested {
        if Tmux::owns_session() {
            info!("killing owned tmux session");
            app.layout.mux().kill_session().tolerate()?;
        }
    } else {
        if signals::requested() {
            warn!("terminated by signal");
        }
        app.layout.shutdown()?;
    }
    Ok(())
}

fn run<M: Multiplexer, G: Worktrees>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<M, G>,
) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        if app.should_quit || signals::requested() {
            break;
        }

        if event::poll(POLL_INTERVAL)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => input::handle_key(app, key),
                Event::Mouse(mouse) => {
                    let height = terminal.size()?.height;
                    input::handle_mouse(app, mouse, height);
                }
                Event::Resize(..) => app.on_resize(),
                _ => {}
            }
        }

        app.tick(Instant::now());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_name_is_tmux_safe() {
        assert_eq!(session_name(Path::new("/src/my.app")), "claude-panes-my-app");
        assert_eq!(session_name(Path::new("/")), "claude-panes-repo");
    }
}
