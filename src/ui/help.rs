//! Key hints and message overlays

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::Modal;

/// Footer hints for the current dialog (the sidebar is narrow, keep these short)
pub fn footer_hints(modal: &Modal) -> &'static str {
    match modal {
        Modal::None => " ⏎ open n new w tree x del q",
        Modal::QuitConfirm => "  d detach  k kill all  esc cancel",
        Modal::DeleteConfirm { .. } => "  y/⏎ confirm  n/esc cancel",
        Modal::NewWorktree { .. } | Modal::NewSession { .. } => "  ⏎ create  esc cancel",
        Modal::Rename { .. } => "  ⏎ confirm  esc cancel",
        Modal::Error { .. } => "  ⏎/esc close",
    }
}

pub fn render_message(frame: &mut Frame, message: &str, color: Color) {
    let area = frame.area();

    // At least 1 line, up to 3 for longer messages
    let max_width = area.width.saturating_sub(6) as usize;
    let lines_needed = if max_width > 0 {
        (message.len() / max_width + 1).min(3)
    } else {
        1
    };
    let height = lines_needed as u16;

    let msg_area = Rect {
        x: 1,
        y: area.height.saturating_sub(2 + height),
        width: area.width.saturating_sub(2),
        height,
    };

    let text = format!(" {} ", message);
    let paragraph = Paragraph::new(text)
        .style(Style::default().fg(Color::White).bg(color))
        .wrap(Wrap { trim: true });

    frame.render_widget(Clear, msg_area);
    frame.render_widget(paragraph, msg_area);
}

/// Create a centered rectangle of the given size within the parent area
pub fn centered_rect(width: u16, height: u16, parent: Rect) -> Rect {
    let x = parent.x + (parent.width.saturating_sub(width)) / 2;
    let y = parent.y + (parent.height.saturating_sub(height)) / 2;

    Rect {
        x,
        y,
        width: width.min(parent.width),
        height: height.min(parent.height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_clamps_to_parent() {
        let parent = Rect::new(0, 0, 30, 10);
        assert_eq!(centered_rect(20, 4, parent), Rect::new(5, 3, 20, 4));
        assert_eq!(centered_rect(50, 20, parent), Rect::new(0, 0, 30, 10));
    }

    #[test]
    fn test_every_modal_has_hints() {
        assert!(footer_hints(&Modal::QuitConfirm).contains("detach"));
        assert!(footer_hints(&Modal::None).contains('q'));
    }
}
