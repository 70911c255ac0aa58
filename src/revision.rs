//! Content-revision lookup for tracked files
//!
//! A revision token is the identifier of the most recent change touching a
//! file, used as the change-detection fingerprint. The git implementation
//! uses the last commit hash for the path; the trait keeps the mechanism
//! pluggable so a content-hash source can be substituted without touching
//! the sync engine.
//!
//! Note the accepted false positive: a commit that touches a file without
//! changing its content still produces a new token, so the file re-syncs.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Source of per-file and whole-repository revision tokens.
///
/// For a fixed repository state, repeated calls must return the same token.
pub trait RevisionSource: Send + Sync {
    /// Token of the most recent revision that modified `rel_path`.
    ///
    /// Fails with [`Error::NotFound`] when the path has no recorded history
    /// (e.g. an untracked file).
    fn file_revision(&self, rel_path: &Path) -> Result<String>;

    /// Token of the repository as a whole (kept on each record for audit)
    fn repo_revision(&self) -> Result<String>;
}

/// Revision source backed by the `git` binary
pub struct GitRevisions {
    repo_root: PathBuf,
}

impl GitRevisions {
    /// Open a repository, verifying the path is a git work tree
    pub fn open(repo_root: &Path) -> Result<Self> {
        if !repo_root.is_dir() {
            return Err(Error::NotFound(format!(
                "repository directory {} does not exist",
                repo_root.display()
            )));
        }

        let output = Command::new("git")
            .args(["rev-parse", "--is-inside-work-tree"])
            .current_dir(repo_root)
            .output()
            .map_err(|e| Error::Git(format!("failed to execute git: {e}")))?;

        if !output.status.success() {
            return Err(Error::NotFound(format!(
                "{} is not a git repository",
                repo_root.display()
            )));
        }

        Ok(Self {
            repo_root: repo_root.to_path_buf(),
        })
    }

    fn git(&self, args: &[&str]) -> Result<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .map_err(|e| Error::Git(format!("failed to execute git: {e}")))
    }
}

impl RevisionSource for GitRevisions {
    fn file_revision(&self, rel_path: &Path) -> Result<String> {
        let path_arg = rel_path.to_string_lossy();
        let output = self.git(&["log", "-1", "--pretty=format:%H", "--", &path_arg])?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Git(format!(
                "git log failed for {}: {}",
                rel_path.display(),
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(Error::NotFound(format!(
                "no history for {}",
                rel_path.display()
            )));
        }

        Ok(token)
    }

    fn repo_revision(&self) -> Result<String> {
        let output = self.git(&["rev-parse", "HEAD"])?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Git(format!(
                "git rev-parse HEAD failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn run_git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args([
                "-c",
                "user.name=test",
                "-c",
                "user.email=test@example.com",
            ])
            .args(args)
            .current_dir(dir)
            .status()
            .expect("git invocation failed");
        assert!(status.success(), "git {:?} failed", args);
    }

    fn init_repo(dir: &Path) {
        run_git(dir, &["init", "-q"]);
    }

    fn commit_file(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
        run_git(dir, &["add", name]);
        run_git(dir, &["commit", "-q", "-m", "update"]);
    }

    #[test]
    fn test_open_rejects_non_repo() {
        if !git_available() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            GitRevisions::open(tmp.path()),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            GitRevisions::open(&tmp.path().join("missing")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_token_stable_until_file_changes() {
        if !git_available() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(tmp.path(), "a.txt", "one");
        commit_file(tmp.path(), "b.txt", "other");

        let revisions = GitRevisions::open(tmp.path()).unwrap();
        let first = revisions.file_revision(Path::new("a.txt")).unwrap();
        let again = revisions.file_revision(Path::new("a.txt")).unwrap();
        assert_eq!(first, again);

        // Committing an unrelated file leaves a.txt's token untouched
        commit_file(tmp.path(), "b.txt", "changed");
        assert_eq!(first, revisions.file_revision(Path::new("a.txt")).unwrap());

        // Changing a.txt moves its token
        commit_file(tmp.path(), "a.txt", "two");
        let moved = revisions.file_revision(Path::new("a.txt")).unwrap();
        assert_ne!(first, moved);
    }

    #[test]
    fn test_untracked_file_has_no_history() {
        if !git_available() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(tmp.path(), "a.txt", "one");
        fs::write(tmp.path().join("untracked.txt"), "new").unwrap();

        let revisions = GitRevisions::open(tmp.path()).unwrap();
        assert!(matches!(
            revisions.file_revision(Path::new("untracked.txt")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_repo_revision_moves_with_commits() {
        if !git_available() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(tmp.path(), "a.txt", "one");

        let revisions = GitRevisions::open(tmp.path()).unwrap();
        let head1 = revisions.repo_revision().unwrap();
        commit_file(tmp.path(), "a.txt", "two");
        let head2 = revisions.repo_revision().unwrap();
        assert_ne!(head1, head2);
    }
}
