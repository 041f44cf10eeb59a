//! Git collaborator
//!
//! The orchestrator only needs list/create/remove for worktrees, exposed as
//! the `Worktrees` trait. `GitWorktrees` implements it with libgit2; the
//! diff satellites use `changed_files` and `diff_text`.
//! - `worktree`: worktree creation and removal

mod worktree;

pub use worktree::validate_branch_name;

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use git2::{Repository, Status, StatusOptions};

/// A worktree as reported by git
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub branch: String,
    pub is_primary: bool,
}

/// Worktree capability the orchestrator depends on
pub trait Worktrees {
    /// The primary checkout followed by every linked worktree
    fn list(&self) -> Result<Vec<WorktreeInfo>>;

    /// Check out `branch` (creating it from HEAD if needed) at `path`
    fn create(&self, branch: &str, path: &Path) -> Result<WorktreeInfo>;

    /// Remove the linked worktree at `path`
    fn remove(&self, path: &Path) -> Result<()>;

    /// Root of the primary checkout
    fn root(&self) -> &Path;
}

/// `Worktrees` backed by the repository containing a directory
#[derive(Debug, Clone)]
pub struct GitWorktrees {
    root: PathBuf,
}

impl GitWorktrees {
    /// Find the primary checkout of the repository containing `path`
    pub fn discover(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("'{}' is not inside a git repository", path.display()))?;

        if repo.is_bare() {
            anyhow::bail!("Bare repositories are not supported");
        }

        let root = if repo.is_worktree() {
            // commondir is the primary checkout's .git directory
            let main = Repository::open(repo.commondir()).context("Failed to open main repository")?;
            main.workdir().map(Path::to_path_buf)
        } else {
            repo.workdir().map(Path::to_path_buf)
        }
        .context("Repository has no working directory")?;

        Ok(Self { root })
    }
}

/// Branch checked out at `path`, or a short hash when detached
pub fn branch_name(path: &Path) -> String {
    let Ok(repo) = Repository::open(path) else {
        return "?".to_string();
    };
    let head = match repo.head() {
        Ok(head) => head,
        Err(_) => return "HEAD".to_string(),
    };
    if head.is_branch() {
        return head.shorthand().unwrap_or("HEAD").to_string();
    }
    head.peel_to_commit()
        .map(|c| c.id().to_string()[..7].to_string())
        .unwrap_or_else(|_| "HEAD".to_string())
}

impl Worktrees for GitWorktrees {
    fn list(&self) -> Result<Vec<WorktreeInfo>> {
        let repo = Repository::open(&self.root).context("Failed to open repository")?;

        let mut worktrees = vec![WorktreeInfo {
            path: self.root.clone(),
            branch: branch_name(&self.root),
            is_primary: true,
        }];

        let names = repo.worktrees().context("Failed to list worktrees")?;
        let mut linked: Vec<WorktreeInfo> = names
            .iter()
            .flatten()
            .filter_map(|name| repo.find_worktree(name).ok())
            .filter(|wt| wt.validate().is_ok())
            .map(|wt| {
                let path = wt.path().to_path_buf();
                WorktreeInfo {
                    branch: branch_name(&path),
                    path,
                    is_primary: false,
                }
            })
            .collect();
        linked.sort_by(|a, b| a.branch.cmp(&b.branch));
        worktrees.extend(linked);

        Ok(worktrees)
    }

    fn create(&self, branch: &str, path: &Path) -> Result<WorktreeInfo> {
        worktree::create_worktree(&self.root, path, branch)?;
        Ok(WorktreeInfo {
            path: path.to_path_buf(),
            branch: branch.to_string(),
            is_primary: false,
        })
    }

    fn remove(&self, path: &Path) -> Result<()> {
        worktree::remove_worktree(path)
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

/// A changed path in a worktree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub path: String,
    /// Single-letter status: M, A, D, R, T or ? for untracked
    pub status: char,
    pub staged: bool,
}

fn status_letter(s: Status) -> char {
    if s.intersects(Status::WT_NEW) && !s.intersects(Status::INDEX_NEW) {
        '?'
    } else if s.intersects(Status::INDEX_NEW) {
        'A'
    } else if s.intersects(Status::INDEX_DELETED | Status::WT_DELETED) {
        'D'
    } else if s.intersects(Status::INDEX_RENAMED | Status::WT_RENAMED) {
        'R'
    } else if s.intersects(Status::INDEX_TYPECHANGE | Status::WT_TYPECHANGE) {
        'T'
    } else {
        'M'
    }
}

/// Uncommitted changes in the worktree at `path`, sorted by path
pub fn changed_files(path: &Path) -> Result<Vec<ChangedFile>> {
    let repo = Repository::open(path).context("Failed to open repository")?;

    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false)
        .exclude_submodules(true);

    let statuses = repo
        .statuses(Some(&mut opts))
        .context("Failed to read status")?;

    let staged_mask = Status::INDEX_NEW
        | Status::INDEX_MODIFIED
        | Status::INDEX_DELETED
        | Status::INDEX_RENAMED
        | Status::INDEX_TYPECHANGE;

    let mut files: Vec<ChangedFile> = statuses
        .iter()
        .filter(|e| !e.status().is_empty() && !e.status().intersects(Status::IGNORED))
        .filter_map(|e| {
            let status = e.status();
            e.path().map(|p| ChangedFile {
                path: p.to_string(),
                status: status_letter(status),
                staged: status.intersects(staged_mask),
            })
        })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(files)
}

/// Colored diff of one file against HEAD, or the whole file if untracked
pub fn diff_text(worktree: &Path, file: &str) -> Result<String> {
    let tracked = Command::new("git")
        .arg("-C")
        .arg(worktree)
        .args(["diff", "--color=always", "HEAD", "--", file])
        .output()
        .context("Failed to execute git diff")?;

    let stdout = String::from_utf8_lossy(&tracked.stdout).into_owned();
    if tracked.status.success() && !stdout.trim().is_empty() {
        return Ok(stdout);
    }

    // Untracked (or HEAD-less) files: diff against nothing
    let untracked = Command::new("git")
        .arg("-C")
        .arg(worktree)
        .args(["diff", "--color=always", "--no-index", "--", "/dev/null", file])
        .output()
        .context("Failed to execute git diff --no-index")?;

    // --no-index exits 1 when the files differ
    Ok(String::from_utf8_lossy(&untracked.stdout).into_owned())
}
