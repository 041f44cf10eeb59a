//! Helper utilities for the app module
//!
//! Pure functions for worktree paths and input validation.

use std::path::{Path, PathBuf};

/// Longest accepted session title (characters)
pub const MAX_TITLE_LEN: usize = 40;

/// Last path segment of a branch, made safe for a directory name
/// e.g., "feature/new-thing" -> "new-thing"
pub fn branch_suffix(branch: &str) -> String {
    branch
        .rsplit('/')
        .next()
        .unwrap_or(branch)
        .replace(['\\', ' ', ':', '.'], "-")
}

/// Generate default worktree path from repo path and branch name
/// e.g., ~/repos/project + feature/foo -> ~/repos/project-foo
pub fn default_worktree_path(repo_path: &Path, branch: &str) -> PathBuf {
    let parent = repo_path.parent().unwrap_or(repo_path);
    let repo_name = repo_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("repo");
    parent.join(format!("{}-{}", repo_name, branch_suffix(branch)))
}

/// Check a session title, returning it trimmed
pub fn validate_title(input: &str) -> Result<String, String> {
    let title = input.trim();
    if title.is_empty() {
        return Err("Title cannot be empty".to_string());
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(format!("Title is longer than {} characters", MAX_TITLE_LEN));
    }
    if title.chars().any(char::is_control) {
        return Err("Title contains control characters".to_string());
    }
    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_suffix() {
        assert_eq!(branch_suffix("feature/new-thing"), "new-thing");
        assert_eq!(branch_suffix("fix v1.2"), "fix-v1-2");
    }

    #[test]
    fn test_default_worktree_path() {
        assert_eq!(
            default_worktree_path(Path::new("/src/app"), "feature/login"),
            PathBuf::from("/src/app-login")
        );
    }

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title("  fix bug "), Ok("fix bug".to_string()));
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(41)).is_err());
        assert!(validate_title("a\tb").is_err());
    }
}
