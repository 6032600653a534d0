use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Scratch directory holding one submission's source file.
///
/// The path is derived from the submission id, so no two submissions
/// collide, and the directory is removed when the guard drops — normal
/// return, early return and unwind all release it.
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    pub fn create(root: &Path, submission_id: &str) -> Result<Self> {
        if !is_safe_id(submission_id) {
            bail!("submission id {:?} is not usable as a path component", submission_id);
        }

        let dir = root.join(submission_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create workspace {}", dir.display()))?;

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_source(&self, file_name: &str, code: &str) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        fs::write(&path, code)
            .with_context(|| format!("failed to write source file {}", path.display()))?;
        Ok(path)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %self.dir.display(), error = %e, "failed to remove scratch workspace");
            }
        }
    }
}

/// Submission ids become directory names; reject anything that could
/// point outside the workspace root.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
