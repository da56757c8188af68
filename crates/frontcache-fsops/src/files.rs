//! Directory creation and write-if-changed file updates.
//!
//! # Design
//! - Existing directories and identical file contents are successes, not work.
//! - Files are staged in a sibling temporary file and renamed into place, so
//!   readers never observe a partial write.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{FsOpsError, FsOpsResult};
use crate::ownership::{Ownership, apply_ownership};

/// What happened to a file passed to [`write_if_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// New content was written.
    Written,
    /// Disk already held identical content.
    Unchanged,
}

/// Create `path` (and missing parents) with `mode`, then apply ownership.
/// An existing directory only has its ownership re-applied when it differs.
/// Returns whether the directory was created.
///
/// # Errors
///
/// Returns `FsOpsError::InvalidInput` if `path` exists but is not a
/// directory, or an IO/nix error if creation or `chown` fails.
pub fn ensure_directory(
    path: &Path,
    mode: u32,
    ownership: Option<&Ownership>,
) -> FsOpsResult<bool> {
    let created = match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => false,
        Ok(_) => {
            return Err(FsOpsError::InvalidInput {
                field: "directory",
                reason: "not_a_directory",
                value: Some(path.display().to_string()),
            });
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path)
                .map_err(|source| FsOpsError::io("ensure_directory.create", path, source))?;
            set_mode(path, mode)?;
            true
        }
        Err(source) => return Err(FsOpsError::io("ensure_directory.metadata", path, source)),
    };
    if let Some(ownership) = ownership {
        apply_ownership(path, ownership)?;
    }
    Ok(created)
}

/// Whether writing `content` to `path` would change it.
///
/// # Errors
///
/// Returns an IO error if an existing file cannot be read.
pub fn would_change(path: &Path, content: &str) -> FsOpsResult<bool> {
    match fs::read(path) {
        Ok(existing) => Ok(existing != content.as_bytes()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(source) => Err(FsOpsError::io("would_change.read", path, source)),
    }
}

/// Replace `path` with `content` unless it already holds exactly that.
/// Mode and ownership are applied to freshly written files.
///
/// # Errors
///
/// Returns an IO/nix error if staging, renaming, or `chown` fails.
pub fn write_if_changed(
    path: &Path,
    content: &str,
    mode: u32,
    ownership: Option<&Ownership>,
) -> FsOpsResult<WriteOutcome> {
    if !would_change(path, content)? {
        return Ok(WriteOutcome::Unchanged);
    }

    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .ok_or_else(|| FsOpsError::InvalidInput {
            field: "path",
            reason: "no_parent",
            value: Some(path.display().to_string()),
        })?;
    fs::create_dir_all(parent)
        .map_err(|source| FsOpsError::io("write_if_changed.create_parent", parent, source))?;

    let mut staged = NamedTempFile::new_in(parent)
        .map_err(|source| FsOpsError::io("write_if_changed.stage", parent, source))?;
    staged
        .write_all(content.as_bytes())
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|source| FsOpsError::io("write_if_changed.write", staged.path(), source))?;
    set_mode(staged.path(), mode)?;
    staged
        .persist(path)
        .map_err(|err| FsOpsError::io("write_if_changed.rename", path, err.error))?;

    if let Some(ownership) = ownership {
        apply_ownership(path, ownership)?;
    }
    Ok(WriteOutcome::Written)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> FsOpsResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|source| FsOpsError::io("set_mode", path, source))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> FsOpsResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn ensure_directory_creates_once() -> Result<(), Box<dyn Error>> {
        let temp = tempfile::tempdir()?;
        let dir = temp.path().join("data/varnish");

        assert!(ensure_directory(&dir, 0o755, None)?);
        assert!(dir.is_dir());
        assert!(!ensure_directory(&dir, 0o755, None)?);
        Ok(())
    }

    #[test]
    fn ensure_directory_rejects_files() -> Result<(), Box<dyn Error>> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("varnish");
        fs::write(&file, "not a dir")?;
        assert!(matches!(
            ensure_directory(&file, 0o755, None),
            Err(FsOpsError::InvalidInput {
                reason: "not_a_directory",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn write_if_changed_skips_identical_content() -> Result<(), Box<dyn Error>> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("etc/varnish/app.vcl");

        assert!(would_change(&path, "backend default {}\n")?);
        assert_eq!(
            write_if_changed(&path, "backend default {}\n", 0o644, None)?,
            WriteOutcome::Written
        );
        assert_eq!(fs::read_to_string(&path)?, "backend default {}\n");
        assert!(!would_change(&path, "backend default {}\n")?);
        assert_eq!(
            write_if_changed(&path, "backend default {}\n", 0o644, None)?,
            WriteOutcome::Unchanged
        );
        assert_eq!(
            write_if_changed(&path, "backend other {}\n", 0o644, None)?,
            WriteOutcome::Written
        );
        assert_eq!(fs::read_dir(path.parent().ok_or("parent")?)?.count(), 1);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn written_files_take_the_requested_mode() -> Result<(), Box<dyn Error>> {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir()?;
        let path = temp.path().join("varnishd.monitrc");
        write_if_changed(&path, "check process varnish_80\n", 0o644, None)?;
        assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o777, 0o644);
        Ok(())
    }
}
