use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use crate::error::SecurityError;

/// Default ceiling for files read through the sandbox (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Number of leading bytes inspected by the binary-content heuristic.
const BINARY_SNIFF_LEN: u64 = 1024;

/// Confines file access to a single root directory.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
    max_file_size: u64,
}

impl PathSandbox {
    /// Create a sandbox rooted at `root`. The root must exist; it is
    /// canonicalized once so later prefix checks compare resolved paths.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SecurityError> {
        let root = root.as_ref();
        let canonical = root.canonicalize().map_err(|source| SecurityError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self {
            root: canonical,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        })
    }

    #[must_use]
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Resolve `path` (relative to the root, or absolute) and confirm it stays
    /// inside the sandbox. The path need not exist.
    pub fn validate(&self, path: &str) -> Result<PathBuf, SecurityError> {
        check_lexical(path)?;

        let candidate = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.root.join(path)
        };
        // Drop `.` components so ancestor walking sees only real names.
        let candidate: PathBuf = candidate
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();

        let resolved = resolve_nearest_ancestor(&candidate).ok_or_else(|| {
            SecurityError::OutsideSandbox {
                path: path.to_string(),
            }
        })?;

        if !resolved.starts_with(&self.root) {
            return Err(SecurityError::OutsideSandbox {
                path: path.to_string(),
            });
        }
        Ok(resolved)
    }

    /// Validate a path for reading: it must be a regular file within the size
    /// limit whose first KiB contains no NUL byte.
    pub fn validate_read(&self, path: &str) -> Result<PathBuf, SecurityError> {
        let resolved = self.validate(path)?;
        let io_err = |source| SecurityError::Io {
            path: resolved.clone(),
            source,
        };

        let metadata = fs::metadata(&resolved).map_err(io_err)?;
        if !metadata.is_file() {
            return Err(SecurityError::NotAFile {
                path: resolved.clone(),
            });
        }
        if metadata.len() > self.max_file_size {
            return Err(SecurityError::FileTooLarge {
                size: metadata.len(),
                limit: self.max_file_size,
            });
        }

        let mut head = Vec::with_capacity(1024);
        fs::File::open(&resolved)
            .and_then(|file| file.take(BINARY_SNIFF_LEN).read_to_end(&mut head))
            .map_err(io_err)?;
        if head.contains(&0) {
            return Err(SecurityError::BinaryContent { path: resolved });
        }

        Ok(resolved)
    }

    /// Validate a path for writing, creating missing parent directories.
    pub fn validate_write(&self, path: &str) -> Result<PathBuf, SecurityError> {
        let resolved = self.validate(path)?;
        if resolved.is_dir() {
            return Err(SecurityError::NotAFile { path: resolved });
        }
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent).map_err(|source| SecurityError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(resolved)
    }
}

fn check_lexical(path: &str) -> Result<(), SecurityError> {
    let traversal = || SecurityError::PathTraversal {
        path: path.escape_debug().to_string(),
    };

    // Null bytes truncate paths in C-backed syscalls
    if path.contains('\0') {
        return Err(traversal());
    }
    if path.starts_with('~') {
        return Err(traversal());
    }
    if path.split(['/', '\\']).any(|part| part == "..") {
        return Err(traversal());
    }

    let lower = path.to_lowercase();
    if lower.contains("%2e%2e")
        || lower.contains("..%2f")
        || lower.contains("%2f..")
        || lower.contains("..%5c")
        || lower.contains("%5c..")
        || lower.contains("%00")
    {
        return Err(traversal());
    }
    Ok(())
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the
/// remaining (not yet existing) components. Returns `None` for dangling
/// symlinks, which could redirect a later write outside the root.
fn resolve_nearest_ancestor(path: &Path) -> Option<PathBuf> {
    let mut existing = path;
    let mut tail: Vec<OsString> = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                for name in tail.iter().rev() {
                    resolved.push(name);
                }
                return Some(resolved);
            }
            Err(_) => {
                if existing.symlink_metadata().is_ok() {
                    return None;
                }
                tail.push(existing.file_name()?.to_os_string());
                existing = existing.parent()?;
            }
        }
    }
}
