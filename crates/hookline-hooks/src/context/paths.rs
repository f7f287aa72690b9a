//! Project-root scoping of hook paths

use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use crate::error::{HooksError, Result};

/// A path confined to the project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedPath {
    /// Absolute location on disk
    pub absolute: PathBuf,

    /// `/`-separated path relative to the root; `.` for the root itself
    pub relative: String,
}

/// Symlinks followed while resolving one path before giving up
const MAX_LINK_HOPS: u32 = 40;

/// Resolve `input` against `root`, refusing anything outside it
///
/// Absolute paths and `..` escapes are rejected before touching the disk.
/// Every symlink along the way is then followed, dangling or not, so a link
/// inside the project cannot point the hook elsewhere.
pub fn scope_path(root: &Path, input: &str) -> Result<ScopedPath> {
    let escape = || HooksError::Permission(format!("path '{}' escapes the project root", input));

    let mut parts: Vec<String> = Vec::new();
    for component in Path::new(input).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(escape());
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(HooksError::Permission(format!(
                    "absolute path '{}' is not allowed; use a path relative to the project root",
                    input
                )))
            }
        }
    }

    let absolute = parts.iter().fold(root.to_path_buf(), |path, part| path.join(part));

    let canonical_root = root.canonicalize()?;
    let mut hops = 0;
    let relative_parts: PathBuf = parts.iter().collect();
    let resolved = resolve_links(&canonical_root, &relative_parts, &mut hops)?;
    if !resolved.starts_with(&canonical_root) {
        return Err(escape());
    }

    let relative = if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    };
    Ok(ScopedPath { absolute, relative })
}

/// Walk `path` from `base`, following symlinks the way the OS would
///
/// Missing components are kept as written. A link whose target does not
/// exist still resolves to where a write through it would land.
fn resolve_links(base: &Path, path: &Path, hops: &mut u32) -> Result<PathBuf> {
    let mut resolved = base.to_path_buf();
    for component in path.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(part) => {
                let next = resolved.join(part);
                let is_link = match fs::symlink_metadata(&next) {
                    Ok(metadata) => metadata.file_type().is_symlink(),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => false,
                    Err(e) => return Err(e.into()),
                };
                if !is_link {
                    resolved = next;
                    continue;
                }

                *hops += 1;
                if *hops > MAX_LINK_HOPS {
                    return Err(HooksError::Permission(format!(
                        "too many symbolic links under '{}'",
                        base.display()
                    )));
                }
                let target = fs::read_link(&next)?;
                resolved = resolve_links(&resolved, &target, hops)?;
            }
        }
    }
    Ok(resolved)
}
