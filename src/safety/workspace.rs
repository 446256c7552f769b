use std::path::{Component, Path, PathBuf};

/// Confines generated-project writes to one root directory.
pub struct WorkspaceGuard {
    /// Canonical (absolute, symlinks resolved) root.
    canonical_root: PathBuf,
}

impl WorkspaceGuard {
    /// Create a new guard for the given root.
    /// Creates the directory if it doesn't exist and resolves to canonical path.
    pub fn new(root: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let canonical_root = std::fs::canonicalize(root)?;
        Ok(Self { canonical_root })
    }

    /// Check if a write to the given path is allowed.
    /// Resolves symlinks to prevent escape via symlink traversal.
    pub fn is_write_allowed(&self, target: &Path) -> Result<bool, std::io::Error> {
        let canonical = if target.exists() {
            std::fs::canonicalize(target)?
        } else {
            let parent = target.parent().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent")
            })?;
            if parent.exists() {
                let canonical_parent = std::fs::canonicalize(parent)?;
                canonical_parent.join(target.file_name().unwrap_or_default())
            } else {
                return Ok(false);
            }
        };

        Ok(canonical.starts_with(&self.canonical_root))
    }

    /// Get the canonical root path.
    pub fn canonical_root(&self) -> &Path {
        &self.canonical_root
    }
}

/// Whether `name` is a single plain path component (no separators, no `.`
/// or `..`, not absolute). Tree entries from model output must pass this.
pub fn is_plain_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}
