//! Key and mouse handling for the controller

use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::app::{App, Modal};
use crate::git::Worktrees;
use crate::relay::Decoded;
use crate::tmux::Multiplexer;
use crate::ui;

/// Handle a key event and update the application state
pub fn handle_key<M: Multiplexer, G: Worktrees>(app: &mut App<M, G>, key: KeyEvent) {
    // Release and repeat events would feed the relay decoder twice
    if key.kind != KeyEventKind::Press {
        return;
    }

    // Relayed lines from satellites arrive as ordinary keystrokes
    match app.decode_key(&key) {
        Decoded::Line(body) => return app.handle_relay(&body),
        Decoded::Pending => return,
        Decoded::Pass => {}
    }

    app.clear_message();

    match &app.modal {
        Modal::None => handle_sidebar_mode(app, key),
        Modal::QuitConfirm => handle_quit_mode(app, key),
        Modal::DeleteConfirm { .. } => handle_confirm_mode(app, key),
        Modal::NewWorktree { .. } | Modal::NewSession { .. } | Modal::Rename { .. } => {
            handle_input_mode(app, key)
        }
        Modal::Error { .. } => handle_error_mode(app, key),
    }
}

fn handle_sidebar_mode<M: Multiplexer, G: Worktrees>(app: &mut App<M, G>, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.start_quit(),

        // Navigation
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev(),

        KeyCode::Enter => app.activate_selected(),
        KeyCode::Char('l') | KeyCode::Right => app.focus_main(),

        // Sessions and worktrees
        KeyCode::Char('n') => app.start_new_session(),
        KeyCode::Char('w') => app.start_new_worktree(),
        KeyCode::Char('r') => app.start_rename(),
        KeyCode::Char('x') => app.start_delete(),

        // Terminals of the active session
        KeyCode::Char('t') => app.new_terminal(),
        KeyCode::Char(']') => app.cycle_terminal(1),
        KeyCode::Char('[') => app.cycle_terminal(-1),
        KeyCode::Char('X') => app.delete_visible_terminal(),

        KeyCode::Char('d') => app.toggle_diff_list(),

        _ => {}
    }
}

fn handle_quit_mode<M: Multiplexer, G: Worktrees>(app: &mut App<M, G>, key: KeyEvent) {
    match key.code {
        KeyCode::Char('d') | KeyCode::Char('D') => app.detach(),
        KeyCode::Char('k') | KeyCode::Char('K') => app.kill_all(),
        KeyCode::Esc | KeyCode::Char('q') => app.close_modal(),
        _ => {}
    }
}

fn handle_confirm_mode<M: Multiplexer, G: Worktrees>(app: &mut App<M, G>, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => app.submit(),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.close_modal(),
        _ => {}
    }
}

fn handle_input_mode<M: Multiplexer, G: Worktrees>(app: &mut App<M, G>, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_modal(),
        KeyCode::Enter => app.submit(),
        KeyCode::Backspace => {
            if let Some(input) = app.modal.input_mut() {
                input.pop();
            }
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if let Some(input) = app.modal.input_mut() {
                input.clear();
            }
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            if let Some(input) = app.modal.input_mut() {
                input.push(c);
            }
        }
        _ => {}
    }
}

fn handle_error_mode<M: Multiplexer, G: Worktrees>(app: &mut App<M, G>, key: KeyEvent) {
    if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q')) {
        app.close_modal();
    }
}

/// Left click selects a list row; double activation is left to Enter
pub fn handle_mouse<M: Multiplexer, G: Worktrees>(
    app: &mut App<M, G>,
    mouse: MouseEvent,
    height: u16,
) {
    if app.modal.is_open() {
        return;
    }
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            let visible = ui::visible_rows(height);
            if mouse.row < ui::LIST_TOP || (mouse.row - ui::LIST_TOP) as usize >= visible {
                return;
            }
            let offset = ui::list_offset(app.selected, visible);
            app.select_row(offset + (mouse.row - ui::LIST_TOP) as usize);
        }
        MouseEventKind::ScrollDown => app.select_next(),
        MouseEventKind::ScrollUp => app.select_prev(),
        _ => {}
    }
}
