//! Modal dialogs and sidebar rows
//!
//! Exactly one `Modal` is active at a time. Any modal other than `None` is
//! shown with the layout in fullscreen mode.

/// What a delete confirmation applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Session(String),
    Worktree(String),
}

/// The active dialog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Modal {
    #[default]
    None,
    /// Detach or kill everything
    QuitConfirm,
    DeleteConfirm { target: DeleteTarget },
    /// Branch name for a new worktree
    NewWorktree { branch: String },
    Rename { session_id: String, input: String },
    /// Title for a new session on a worktree
    NewSession { worktree_id: String, input: String },
    Error { message: String },
}

impl Modal {
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Text input buffer of the dialog, if it has one
    pub fn input_mut(&mut self) -> Option<&mut String> {
        match self {
            Self::NewWorktree { branch } => Some(branch),
            Self::Rename { input, .. } | Self::NewSession { input, .. } => Some(input),
            _ => None,
        }
    }
}

/// One line of the sidebar list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Worktree(String),
    Session(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_mut_only_for_text_dialogs() {
        let mut modal = Modal::Rename {
            session_id: "s1".to_string(),
            input: "old".to_string(),
        };
        modal.input_mut().unwrap().push('!');
        assert_eq!(
            modal,
            Modal::Rename {
                session_id: "s1".to_string(),
                input: "old!".to_string()
            }
        );
        assert!(Modal::QuitConfirm.input_mut().is_none());
        assert!(!Modal::None.is_open());
    }
}
