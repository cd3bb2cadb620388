//! Filename case normalization.
//!
//! Site builders export files with mixed-case names (`Job.HTML`,
//! `Logo.PNG`) that break the moment the site is served from a
//! case-sensitive host. This stage lower-cases every filename under the
//! allow-listed extensions, then runs one text-substitution pass so every
//! reference to a renamed file follows it.
//!
//! Renaming is the delicate part: on case-insensitive filesystems the
//! lower-cased target "already exists" (it is the same file), so a direct
//! rename is a no-op on some platforms and an error on others. Those
//! renames go through a uniquely named temporary file. A rename that still
//! fails is skipped with a warning — the file is never lost, the reference
//! pass simply won't touch it.
//!
//! The text pass replaces each old path or bare filename, optionally led by
//! `./`, `../`, `/` or a backslash, with its lower-cased form. When a
//! rename changed the stem, the extension-stripped stem is substituted as
//! well, which catches suffix-less references like `/Job`. A final
//! defensive sweep lower-cases any remaining relative link whose path
//! segment still carries upper case, covering links to files that were
//! already lower-case on disk.
//!
//! The whole stage is idempotent: a second run finds nothing to rename and
//! nothing to substitute.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

use crate::config::SiteportConfig;
use crate::renames::RenameMap;
use crate::walk;

#[derive(Error, Debug)]
pub enum CasingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the stage did, for reporting.
#[derive(Debug, Default)]
pub struct CaseReport {
    pub renamed: Vec<(String, String)>,
    pub files_updated: usize,
    pub warnings: Vec<String>,
}

/// Relative-prefix lead-in accepted before a substituted path.
const PREFIX_PATTERN: &str = r"(?P<prefix>(?:\./|\.\./|\.\\|\.\.\\|/|\\)*)";

/// Relative links whose path segment still carries upper case. The leading
/// character class keeps scheme separators (`:`) and protocol-relative
/// `//` out of the match.
static RELATIVE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<pre>^|[^:/])(?P<prefix>(?:\./|\.\./|/|\\)+)(?P<path>[A-Za-z0-9._\-\\/]+)")
        .unwrap()
});

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Lower-case filenames under the configured extensions, record the renames
/// in `map`, and rewrite references across the text extensions.
pub fn normalize_case(
    root: &Path,
    config: &SiteportConfig,
    map: &mut RenameMap,
) -> Result<CaseReport, CasingError> {
    let mut report = CaseReport::default();
    if !config.case.enabled {
        return Ok(report);
    }

    let mut updates: Vec<(String, String)> = Vec::new();

    for path in walk::list_files(root, &config.case.extensions) {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };
        let lower = name.to_lowercase();
        if lower == name {
            continue;
        }

        let old_rel = walk::rel_path(&path, root);
        let new_path = path.with_file_name(&lower);
        if rename_with_case_handling(&path, &new_path).is_none() {
            report
                .warnings
                .push(format!("case rename skipped (conflict): {old_rel}"));
            continue;
        }
        let new_rel = walk::rel_path(&new_path, root);

        map.insert(&old_rel, &new_rel);
        map.insert(&name, &lower);

        updates.push((old_rel.clone(), new_rel.clone()));
        updates.push((name.clone(), lower.clone()));
        if old_rel.contains('/') {
            updates.push((old_rel.replace('/', "\\"), new_rel.replace('/', "\\")));
        }
        report.renamed.push((old_rel, new_rel));
    }

    // References to the bare stem (`/Job` for `Job.HTML`) must follow the
    // rename too when the stem itself changed.
    let mut stem_updates: Vec<(String, String)> = Vec::new();
    for (old, new) in &updates {
        if let (Some((old_stem, old_ext)), Some((new_stem, new_ext))) =
            (split_extension(old), split_extension(new))
        {
            if old_ext.eq_ignore_ascii_case(new_ext)
                && old_stem != new_stem
                && !stem_updates.iter().any(|(o, _)| o == old_stem)
            {
                stem_updates.push((old_stem.to_string(), new_stem.to_string()));
            }
        }
    }
    updates.extend(stem_updates);

    report.files_updated = apply_text_updates(root, config, &updates, &mut report.warnings)?;
    Ok(report)
}

/// Rename `path` to `destination`, handling case-only renames where the
/// destination is the same file under another spelling.
///
/// Returns None when the rename could not be done safely; the source file
/// is left in place.
fn rename_with_case_handling(path: &Path, destination: &Path) -> Option<()> {
    if path == destination {
        return Some(());
    }

    if destination.exists() {
        let same_file = match (fs::canonicalize(path), fs::canonicalize(destination)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if !same_file {
            // A genuinely different file already owns the target name.
            return None;
        }
        return two_step_rename(path, destination);
    }

    match fs::rename(path, destination) {
        Ok(()) => Some(()),
        Err(_) => two_step_rename(path, destination),
    }
}

fn two_step_rename(path: &Path, destination: &Path) -> Option<()> {
    let temp = temp_sibling(path);
    fs::rename(path, &temp).ok()?;
    match fs::rename(&temp, destination) {
        Ok(()) => Some(()),
        Err(_) => {
            // Put the file back under its original name; losing it is worse
            // than leaving the case wrong.
            let _ = fs::rename(&temp, path);
            None
        }
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let unique = format!(
        "__siteport_tmp__{}_{}{suffix}",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    path.with_file_name(unique)
}

/// One pass over the text-extension files applying the collected
/// substitutions plus the defensive relative-link lower-casing.
fn apply_text_updates(
    root: &Path,
    config: &SiteportConfig,
    updates: &[(String, String)],
    warnings: &mut Vec<String>,
) -> Result<usize, CasingError> {
    let mut patterns: Vec<(&str, &str, Regex)> = Vec::new();
    let mut ordered: Vec<&(String, String)> = updates.iter().filter(|(o, n)| o != n).collect();
    // Longest key first so a path never gets clobbered by its own prefix.
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));

    for (old, new) in ordered {
        let pattern = format!("{PREFIX_PATTERN}{}", regex::escape(old));
        match Regex::new(&pattern) {
            Ok(re) => patterns.push((old.as_str(), new.as_str(), re)),
            Err(err) => warnings.push(format!("substitution pattern for '{old}' rejected: {err}")),
        }
    }

    let mut files_updated = 0;
    for path in walk::list_files(root, &config.text.extensions) {
        let original = match walk::read_text(&path) {
            Ok(text) => text,
            Err(err) => {
                warnings.push(format!(
                    "link update skipped for {}: {err}",
                    walk::rel_path(&path, root)
                ));
                continue;
            }
        };

        let mut text = original.clone();
        for (old, new, re) in &patterns {
            if !text.contains(old) {
                continue;
            }
            text = re
                .replace_all(&text, |caps: &Captures| {
                    format!("{}{new}", &caps["prefix"])
                })
                .into_owned();
        }
        text = lowercase_relative_links(&text);

        if text != original {
            walk::write_if_changed(&path, &text)?;
            files_updated += 1;
        }
    }
    Ok(files_updated)
}

/// Lower-case the path segment of any relative link that still differs only
/// in case. Links behind a scheme separator are left alone.
fn lowercase_relative_links(text: &str) -> String {
    RELATIVE_LINK
        .replace_all(text, |caps: &Captures| {
            let prefix = &caps["prefix"];
            let path = &caps["path"];
            let lower = path.to_lowercase();
            if prefix.contains("//") || lower == path {
                caps[0].to_string()
            } else {
                format!("{}{prefix}{lower}", &caps["pre"])
            }
        })
        .into_owned()
}

fn split_extension(name: &str) -> Option<(&str, &str)> {
    let dot = name.rfind('.')?;
    if dot == 0 || dot == name.len() - 1 {
        return None;
    }
    // A dot inside the final path segment only.
    if name[dot..].contains('/') || name[dot..].contains('\\') {
        return None;
    }
    Some((&name[..dot], &name[dot + 1..]))
}
