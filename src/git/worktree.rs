//! Worktree creation and removal

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use git2::{BranchType, Repository};

/// Reject names git would refuse as `refs/heads/<name>`
pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("Branch name cannot be empty");
    }
    let refname = format!("refs/heads/{}", name);
    if !git2::Reference::is_valid_name(&refname) {
        anyhow::bail!("'{}' is not a valid branch name", name);
    }
    Ok(())
}

/// Check out `branch` at `worktree_path`, creating the branch from HEAD if it
/// does not exist yet
pub fn create_worktree(repo_path: &Path, worktree_path: &Path, branch: &str) -> Result<()> {
    validate_branch_name(branch)?;

    let repo = Repository::open(repo_path).context("Failed to open repository")?;

    if worktree_path.exists() {
        anyhow::bail!("Path '{}' already exists", worktree_path.display());
    }

    let existing = repo.find_branch(branch, BranchType::Local).is_ok();
    if existing {
        if let Ok(head) = repo.head() {
            if head.is_branch() && head.shorthand() == Some(branch) {
                anyhow::bail!(
                    "Branch '{}' is checked out in the main worktree",
                    branch
                );
            }
        }
    } else {
        let commit = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .context("Failed to get HEAD commit")?;
        repo.branch(branch, &commit, false)
            .with_context(|| format!("Failed to create branch '{}'", branch))?;
    }

    let reference = repo
        .find_reference(&format!("refs/heads/{}", branch))
        .with_context(|| format!("Branch '{}' not found", branch))?;

    // Worktree names live under .git/worktrees/ and cannot contain slashes
    let name = branch.replace('/', "-");
    repo.worktree(
        &name,
        worktree_path,
        Some(git2::WorktreeAddOptions::new().reference(Some(&reference))),
    )
    .with_context(|| {
        format!(
            "Failed to create worktree for '{}' at '{}'",
            branch,
            worktree_path.display()
        )
    })?;

    Ok(())
}

/// Remove a linked worktree with `git worktree remove`
pub fn remove_worktree(worktree_path: &Path) -> Result<()> {
    let repo = Repository::open(worktree_path).context("Failed to open worktree")?;
    if !repo.is_worktree() {
        anyhow::bail!(
            "'{}' is the main checkout, not a linked worktree",
            worktree_path.display()
        );
    }

    let output = Command::new("git")
        .arg("-C")
        .arg(worktree_path)
        .args(["worktree", "remove"])
        .arg(worktree_path)
        .output()
        .context("Failed to execute git worktree remove")?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let hint = if stderr.contains("contains modified or untracked files") {
        " Commit or stash the changes first."
    } else {
        ""
    };
    anyhow::bail!("git worktree remove failed: {}.{}", stderr.trim(), hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{GitWorktrees, Worktrees};

    fn init_repo(dir: &Path) {
        let repo = Repository::init(dir).unwrap();
        std::fs::write(dir.join("README.md"), "hello\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README.md")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .unwrap();
    }

    #[test]
    fn test_validate_branch_name() {
        assert!(validate_branch_name("feature/login").is_ok());
        assert!(validate_branch_name("").is_err());
        assert!(validate_branch_name("has space").is_err());
        assert!(validate_branch_name("bad..name").is_err());
    }

    #[test]
    fn test_create_then_list_worktree() {
        let dir = tempfile::tempdir().unwrap();
        let repo_dir = dir.path().join("repo");
        std::fs::create_dir(&repo_dir).unwrap();
        init_repo(&repo_dir);

        let git = GitWorktrees::discover(&repo_dir).unwrap();
        let wt_path = dir.path().join("repo-feature");
        let info = git.create("feature/x", &wt_path).unwrap();
        assert_eq!(info.branch, "feature/x");
        assert!(wt_path.join("README.md").exists());

        let list = git.list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].branch, "feature/x");
        assert!(!list[1].is_primary);
    }

    #[test]
    fn test_create_refuses_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let err = create_worktree(dir.path(), dir.path(), "other").unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_remove_refuses_main_checkout() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        assert!(remove_worktree(dir.path()).is_err());
    }
}
