use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, TranscludeError};

/// Windows drive-letter path, e.g. `C:\Windows` or `D:/data`
static DRIVE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]:[\\/]").unwrap());

/// Percent-encoded dot or separator, e.g. `%2e%2e%2f`
static ENCODED_TRAVERSAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)%2e|%2f|%5c").unwrap());

/// Rejects dangerous reference forms before any path resolution happens.
///
/// Rejected: embedded null bytes, absolute paths under Unix or Windows
/// conventions, UNC paths, and percent-encoded traversal sequences. A relative
/// path containing literal `..` segments is accepted here; it may still
/// normalize to a location inside the root, so containment is checked later
/// by [`is_within_root`].
///
/// This validator is pure and never touches the file system.
///
/// # Errors
///
/// - `TranscludeError::NullByte` for an embedded `\0`.
/// - `TranscludeError::AbsolutePath` for absolute, drive-letter, or UNC paths.
/// - `TranscludeError::PathTraversal` for percent-encoded dot/separator forms.
pub fn validate_reference(reference: &str) -> Result<()> {
    if reference.contains('\0') {
        return Err(TranscludeError::NullByte {
            reference: reference.replace('\0', "\\0"),
        });
    }

    // UNC first: `\\server\share` and `//server/share` both start with a
    // separator and would otherwise report as plain absolute paths.
    if reference.starts_with("\\\\") || reference.starts_with("//") {
        return Err(TranscludeError::AbsolutePath {
            reference: reference.to_string(),
        });
    }

    if reference.starts_with('/') || reference.starts_with('\\') || DRIVE_PATH.is_match(reference) {
        return Err(TranscludeError::AbsolutePath {
            reference: reference.to_string(),
        });
    }

    if ENCODED_TRAVERSAL.is_match(reference) {
        return Err(TranscludeError::PathTraversal {
            reference: reference.to_string(),
        });
    }

    Ok(())
}

/// Folds `.` and `..` components lexically, without consulting the file
/// system. `..` pops a previously seen normal component; at an absolute
/// path's root it is discarded, and in a relative path with nothing left to
/// pop it is kept.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                ) {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push(Component::ParentDir);
                }
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// True iff `path`, after lexical normalization, equals `root` or is one of
/// its descendants. The comparison is component-wise, so `/docs-evil` is
/// never considered inside `/docs`.
pub fn is_within_root(path: &Path, root: &Path) -> bool {
    normalize_path(path).starts_with(normalize_path(root))
}
