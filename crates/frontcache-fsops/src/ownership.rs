//! Owner and group resolution plus conditional `chown`.

use std::path::Path;

#[cfg(unix)]
use nix::unistd::{Gid, Group, Uid, User, chown};

use crate::error::{FsOpsError, FsOpsResult};

/// Resolved owner and group for managed paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    /// Numeric user id.
    pub uid: u32,
    /// Numeric group id.
    pub gid: u32,
    /// Human-readable label for logs, e.g. `deploy(1000):deploy(1000)`.
    pub label: String,
}

/// Resolve `owner` and `group`, each either a name or a numeric id.
///
/// # Errors
///
/// Returns `FsOpsError::InvalidInput` for blank or unknown names and
/// `FsOpsError::UserLookup`/`GroupLookup` when the account database fails.
#[cfg(unix)]
pub fn resolve_ownership(owner: &str, group: &str) -> FsOpsResult<Ownership> {
    let (uid, owner_label) = resolve_owner(owner)?;
    let (gid, group_label) = resolve_group(group)?;
    Ok(Ownership {
        uid: uid.as_raw(),
        gid: gid.as_raw(),
        label: format!("{owner_label}:{group_label}"),
    })
}

/// Resolve `owner` and `group`; unsupported off unix.
///
/// # Errors
///
/// Always returns `FsOpsError::Unsupported`.
#[cfg(not(unix))]
pub fn resolve_ownership(_owner: &str, _group: &str) -> FsOpsResult<Ownership> {
    Err(FsOpsError::Unsupported {
        operation: "resolve_ownership",
    })
}

/// Change ownership of `path` when it differs from `ownership`.
/// Returns whether a change was made.
///
/// # Errors
///
/// Returns an error if the path cannot be inspected or `chown` fails.
#[cfg(unix)]
pub fn apply_ownership(path: &Path, ownership: &Ownership) -> FsOpsResult<bool> {
    use std::os::unix::fs::MetadataExt;

    let metadata = std::fs::metadata(path)
        .map_err(|source| FsOpsError::io("apply_ownership.metadata", path, source))?;
    if metadata.uid() == ownership.uid && metadata.gid() == ownership.gid {
        return Ok(false);
    }
    chown(
        path,
        Some(Uid::from_raw(ownership.uid)),
        Some(Gid::from_raw(ownership.gid)),
    )
    .map_err(|source| FsOpsError::Nix {
        operation: "apply_ownership.chown",
        path: path.to_path_buf(),
        source,
    })?;
    Ok(true)
}

/// Change ownership of `path`; unsupported off unix.
///
/// # Errors
///
/// Always returns `FsOpsError::Unsupported`.
#[cfg(not(unix))]
pub fn apply_ownership(_path: &Path, _ownership: &Ownership) -> FsOpsResult<bool> {
    Err(FsOpsError::Unsupported {
        operation: "apply_ownership",
    })
}

#[cfg(unix)]
fn resolve_owner(spec: &str) -> FsOpsResult<(Uid, String)> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(FsOpsError::InvalidInput {
            field: "owner",
            reason: "empty",
            value: Some(spec.to_string()),
        });
    }
    if let Ok(id) = trimmed.parse::<u32>() {
        return Ok((Uid::from_raw(id), format!("uid({id})")));
    }
    let user = User::from_name(trimmed)
        .map_err(|source| FsOpsError::UserLookup {
            user: trimmed.to_string(),
            source,
        })?
        .ok_or_else(|| FsOpsError::InvalidInput {
            field: "owner",
            reason: "not_found",
            value: Some(trimmed.to_string()),
        })?;
    Ok((user.uid, format!("{trimmed}({})", user.uid.as_raw())))
}

#[cfg(unix)]
fn resolve_group(spec: &str) -> FsOpsResult<(Gid, String)> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(FsOpsError::InvalidInput {
            field: "group",
            reason: "empty",
            value: Some(spec.to_string()),
        });
    }
    if let Ok(id) = trimmed.parse::<u32>() {
        return Ok((Gid::from_raw(id), format!("gid({id})")));
    }
    let group = Group::from_name(trimmed)
        .map_err(|source| FsOpsError::GroupLookup {
            group: trimmed.to_string(),
            source,
        })?
        .ok_or_else(|| FsOpsError::InvalidInput {
            field: "group",
            reason: "not_found",
            value: Some(trimmed.to_string()),
        })?;
    Ok((group.gid, format!("{trimmed}({})", group.gid.as_raw())))
}

#[cfg(all(test, unix))]
mod tests {
    use std::error::Error;
    use std::os::unix::fs::MetadataExt;

    use super::*;

    #[test]
    fn numeric_ids_resolve_without_lookup() -> FsOpsResult<()> {
        let ownership = resolve_ownership("1000", "1001")?;
        assert_eq!(ownership.uid, 1000);
        assert_eq!(ownership.gid, 1001);
        assert_eq!(ownership.label, "uid(1000):gid(1001)");
        Ok(())
    }

    #[test]
    fn blank_and_unknown_names_are_rejected() {
        assert!(matches!(
            resolve_ownership("  ", "deploy"),
            Err(FsOpsError::InvalidInput {
                field: "owner",
                reason: "empty",
                ..
            })
        ));
        assert!(matches!(
            resolve_ownership("0", "frontcache-no-such-group"),
            Err(FsOpsError::InvalidInput {
                field: "group",
                reason: "not_found",
                ..
            })
        ));
    }

    #[test]
    fn matching_ownership_is_left_alone() -> Result<(), Box<dyn Error>> {
        let temp = tempfile::tempdir()?;
        let metadata = std::fs::metadata(temp.path())?;
        let ownership = resolve_ownership(&metadata.uid().to_string(), &metadata.gid().to_string())?;
        assert!(!apply_ownership(temp.path(), &ownership)?);
        Ok(())
    }
}
