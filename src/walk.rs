//! Filesystem walking and text I/O helpers shared by all pipeline stages.
//!
//! Every stage iterates the project tree in the same deterministic order
//! (lexicographic by path), so stage output and reports are stable across
//! runs and platforms. Text reads tolerate a UTF-8 BOM; writes put the
//! content back byte-for-byte as produced, and only when it actually
//! changed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// List every regular file under `root` in sorted order.
///
/// When `extensions` is non-empty, only files whose lower-cased extension
/// (with leading dot, e.g. `.html`) is in the set are returned.
pub fn list_files(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| extensions.is_empty() || has_extension(p, extensions))
        .collect();
    files.sort();
    files
}

/// Check whether a path's extension (lower-cased, dotted) is in `extensions`.
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let ext = match path.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy().to_lowercase()),
        None => return false,
    };
    extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
}

/// Read a file as UTF-8, stripping a leading BOM if present.
///
/// Undecodable files are an error the caller records and skips; the
/// pipeline never aborts over a single unreadable file.
pub fn read_text(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let bytes = match bytes.strip_prefix(b"\xef\xbb\xbf") {
        Some(rest) => rest,
        None => &bytes[..],
    };
    String::from_utf8(bytes.to_vec())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write `content` to `path` only if it differs from what is on disk.
///
/// Returns true when a write happened. Skipping identical writes keeps
/// timestamps stable, which is what makes repeated runs observable no-ops.
pub fn write_if_changed(path: &Path, content: &str) -> io::Result<bool> {
    if let Ok(existing) = read_text(path) {
        if existing == content {
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(true)
}

/// Project-root-relative path in forward-slash form.
///
/// Falls back to the file name when `path` is not under `root`.
pub fn rel_path(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
    }
}

/// Lexically normalize a path: resolve `.` and `..` components without
/// touching the filesystem.
///
/// Needed to vet `.htaccess` targets that may not exist yet — `fs::canonicalize`
/// fails on missing files, and traversal checks must run before existence
/// checks.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                // Only a real name can be popped. Keeping leading `..`
                // components makes containment checks against the root fail
                // for escaping paths.
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}
