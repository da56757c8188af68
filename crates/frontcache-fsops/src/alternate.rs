//! Alternate front proxy server files.
//!
//! When another proxy already owns the public port, its server blocks move
//! from port 81 to the application target port and are renamed with the
//! keep prefix. Renamed files are never touched again, which keeps the
//! rewrite idempotent.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::error::{FsOpsError, FsOpsResult};

const SERVER_FILE_PATTERN: &str = "*.conf";
const LISTEN_PATTERN: &str = r"\blisten 81\b";

static LISTEN_81: OnceCell<Regex> = OnceCell::new();

/// One server file to rewrite and rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// Current file.
    pub from: PathBuf,
    /// Destination carrying the keep prefix.
    pub to: PathBuf,
    /// Rewritten contents for the destination.
    pub content: String,
}

/// Point `listen 81` directives at `target_port`.
///
/// # Errors
///
/// Returns `FsOpsError::Pattern` if the directive pattern fails to compile.
pub fn rewrite_listen(content: &str, target_port: u16) -> FsOpsResult<String> {
    let pattern = LISTEN_81
        .get_or_try_init(|| Regex::new(LISTEN_PATTERN))
        .map_err(|source| FsOpsError::Pattern {
            pattern: LISTEN_PATTERN,
            source,
        })?;
    Ok(pattern
        .replace_all(content, format!("listen {target_port}").as_str())
        .into_owned())
}

/// Relocations needed under `server_dir`, sorted by file name. A missing
/// directory needs none.
///
/// # Errors
///
/// Returns an IO error if the directory or a server file cannot be read.
pub fn plan_relocations(
    server_dir: &Path,
    keep_prefix: &str,
    target_port: u16,
) -> FsOpsResult<Vec<Relocation>> {
    let entries = match fs::read_dir(server_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(FsOpsError::io(
                "plan_relocations.read_dir",
                server_dir,
                source,
            ));
        }
    };
    let matcher = server_file_matcher()?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|source| FsOpsError::io("plan_relocations.entry", server_dir, source))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with(keep_prefix) || !matcher.is_match(&name) {
            continue;
        }
        let is_file = entry
            .file_type()
            .map_err(|source| FsOpsError::io("plan_relocations.file_type", entry.path(), source))?
            .is_file();
        if is_file {
            names.push(name);
        }
    }
    names.sort();

    names
        .into_iter()
        .map(|name| {
            let from = server_dir.join(&name);
            let original = fs::read_to_string(&from)
                .map_err(|source| FsOpsError::io("plan_relocations.read", &from, source))?;
            Ok(Relocation {
                to: server_dir.join(format!("{keep_prefix}{name}")),
                content: rewrite_listen(&original, target_port)?,
                from,
            })
        })
        .collect()
}

/// Write the rewritten file under its kept name, preserving the original's
/// permissions, then remove the original.
///
/// # Errors
///
/// Returns an IO error if the destination cannot be written or the original
/// cannot be removed.
pub fn apply_relocation(relocation: &Relocation) -> FsOpsResult<()> {
    let permissions = fs::metadata(&relocation.from)
        .map_err(|source| FsOpsError::io("apply_relocation.metadata", &relocation.from, source))?
        .permissions();
    fs::write(&relocation.to, &relocation.content)
        .map_err(|source| FsOpsError::io("apply_relocation.write", &relocation.to, source))?;
    fs::set_permissions(&relocation.to, permissions)
        .map_err(|source| FsOpsError::io("apply_relocation.permissions", &relocation.to, source))?;
    fs::remove_file(&relocation.from)
        .map_err(|source| FsOpsError::io("apply_relocation.remove", &relocation.from, source))
}

fn server_file_matcher() -> FsOpsResult<GlobMatcher> {
    Glob::new(SERVER_FILE_PATTERN)
        .map(|glob| glob.compile_matcher())
        .map_err(|source| {
            FsOpsError::glob("server_file_matcher", SERVER_FILE_PATTERN.to_string(), source)
        })
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    const SERVER_BLOCK: &str = "server {\n  listen 81;\n  server_name app;\n}\n";

    #[test]
    fn rewrite_only_touches_exact_port() -> Result<(), Box<dyn Error>> {
        assert_eq!(
            rewrite_listen("listen 81;\nlisten 8181;\nlisten 810;\n", 8081)?,
            "listen 8081;\nlisten 8181;\nlisten 810;\n"
        );
        assert_eq!(rewrite_listen("listen 80;\n", 8081)?, "listen 80;\n");
        Ok(())
    }

    #[test]
    fn plans_skip_kept_and_non_conf_files() -> Result<(), Box<dyn Error>> {
        let temp = tempfile::tempdir()?;
        fs::write(temp.path().join("b.conf"), SERVER_BLOCK)?;
        fs::write(temp.path().join("a.conf"), SERVER_BLOCK)?;
        fs::write(temp.path().join("keep.old.conf"), SERVER_BLOCK)?;
        fs::write(temp.path().join("README"), "listen 81")?;
        fs::create_dir(temp.path().join("nested.conf"))?;

        let plans = plan_relocations(temp.path(), "keep.", 8081)?;
        let names: Vec<_> = plans
            .iter()
            .filter_map(|plan| plan.to.file_name().and_then(|name| name.to_str()))
            .collect();
        assert_eq!(names, vec!["keep.a.conf", "keep.b.conf"]);
        assert!(plans[0].content.contains("listen 8081;"));
        Ok(())
    }

    #[test]
    fn missing_server_dir_plans_nothing() -> Result<(), Box<dyn Error>> {
        let temp = tempfile::tempdir()?;
        assert!(plan_relocations(&temp.path().join("servers"), "keep.", 8081)?.is_empty());
        Ok(())
    }

    #[test]
    fn applying_a_relocation_is_final() -> Result<(), Box<dyn Error>> {
        let temp = tempfile::tempdir()?;
        fs::write(temp.path().join("app.conf"), SERVER_BLOCK)?;

        for plan in plan_relocations(temp.path(), "keep.", 8081)? {
            apply_relocation(&plan)?;
        }
        assert!(!temp.path().join("app.conf").exists());
        let kept = fs::read_to_string(temp.path().join("keep.app.conf"))?;
        assert!(kept.contains("listen 8081;"));
        assert!(!kept.contains("listen 81;"));
        assert!(plan_relocations(temp.path(), "keep.", 8081)?.is_empty());
        Ok(())
    }
}
