//! Asset rename and cleanup — the first pipeline stage.
//!
//! Exported trees carry the site builder's fingerprints: generated asset
//! names with a builder marker in them, tracking scripts that make no sense
//! off the builder's hosting, and so on. This stage walks the tree once and:
//!
//! - deletes files on the `delete_as_is` list,
//! - renames files whose stem matches the configured marker pattern,
//!   sanitizing the result (spaces to underscores, parentheses and commas
//!   dropped, `&` to `and`),
//! - deletes files on the `delete_after_rename` list,
//! - makes sure the placeholder asset (`images/1px.png` by default) exists
//!   for the placeholder-substitution rules downstream.
//!
//! Every rename is recorded in the [`RenameMap`], seeding the table the
//! later stages extend and consume. Per-file failures become warnings; the
//! stage never aborts the run.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::config::SiteportConfig;
use crate::renames::RenameMap;
use crate::walk;

#[derive(Error, Debug)]
pub enum AssetsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the stage did, for reporting.
#[derive(Debug, Default)]
pub struct AssetReport {
    pub renamed: Vec<(String, String)>,
    pub removed: Vec<String>,
    pub warnings: Vec<String>,
}

/// 1×1 transparent PNG used as the placeholder asset.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0c, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x60,
    0x60, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0xe2, 0x21, 0xbc, 0x33, 0x00, 0x00, 0x00, 0x00,
    0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

static UNDERSCORE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new("_+").unwrap());

/// Run the rename/cleanup pass and seed `map` with the renames.
pub fn rename_and_cleanup(
    root: &Path,
    config: &SiteportConfig,
    map: &mut RenameMap,
) -> Result<AssetReport, AssetsError> {
    let mut report = AssetReport::default();
    let cleanup = &config.cleanup;

    let marker = match RegexBuilder::new(&cleanup.marker_pattern)
        .case_insensitive(true)
        .build()
    {
        Ok(re) => Some(re),
        Err(err) => {
            report.warnings.push(format!(
                "invalid cleanup.marker_pattern '{}': {err}",
                cleanup.marker_pattern
            ));
            None
        }
    };

    let delete_as_is = lowercase_set(&cleanup.delete_as_is);
    let delete_after = lowercase_set(&cleanup.delete_after_rename);
    let excluded = lowercase_set(&cleanup.exclude_from_rename);

    for path in walk::list_files(root, &[]) {
        let mut name_lower = match path.file_name() {
            Some(name) => name.to_string_lossy().to_lowercase(),
            None => continue,
        };
        let rel = walk::rel_path(&path, root);

        if delete_as_is.contains(&name_lower) {
            match fs::remove_file(&path) {
                Ok(()) => report.removed.push(rel),
                Err(err) => report.warnings.push(format!("could not delete {rel}: {err}")),
            }
            continue;
        }

        if excluded.contains(&name_lower) {
            continue;
        }

        let mut current = path.clone();
        if let Some(marker) = &marker {
            if let Some(new_name) = marker_rename(&current, marker, &cleanup.marker_replacement) {
                let new_path = current.with_file_name(&new_name);
                match fs::rename(&current, &new_path) {
                    Ok(()) => {
                        let new_rel = walk::rel_path(&new_path, root);
                        map.insert(&rel, &new_rel);
                        report.renamed.push((rel.clone(), new_rel));
                        name_lower = new_name.to_lowercase();
                        current = new_path;
                    }
                    Err(err) => {
                        report
                            .warnings
                            .push(format!("could not rename {rel}: {err}"));
                        continue;
                    }
                }
            }
        }

        if delete_after.contains(&name_lower) {
            let rel = walk::rel_path(&current, root);
            match fs::remove_file(&current) {
                Ok(()) => report.removed.push(rel),
                Err(err) => report.warnings.push(format!("could not delete {rel}: {err}")),
            }
        }
    }

    ensure_placeholder(root, &config.scripts.placeholder_path, &mut report)?;
    Ok(report)
}

/// New filename for a marker hit, or None when the name is already clean.
fn marker_rename(path: &Path, marker: &Regex, replacement: &str) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    if !marker.is_match(&stem) {
        return None;
    }
    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let renamed = format!("{}{suffix}", marker.replacen(&stem, 1, replacement));
    let sanitized = sanitize(&renamed);
    if sanitized == path.file_name()?.to_string_lossy() {
        None
    } else {
        Some(sanitized)
    }
}

fn sanitize(name: &str) -> String {
    let cleaned = name
        .replace(' ', "_")
        .replace(['(', ')', ','], "")
        .replace('&', "and");
    UNDERSCORE_RUNS.replace_all(&cleaned, "_").into_owned()
}

fn ensure_placeholder(
    root: &Path,
    placeholder: &str,
    report: &mut AssetReport,
) -> Result<(), AssetsError> {
    let path = root.join(placeholder);
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, PLACEHOLDER_PNG)?;
    report
        .warnings
        .push(format!("placeholder asset created: {placeholder}"));
    Ok(())
}

fn lowercase_set(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteportConfig;
    use std::fs;
    use tempfile::TempDir;

    fn run(root: &Path, config: &SiteportConfig) -> (AssetReport, RenameMap) {
        let mut map = RenameMap::new();
        let report = rename_and_cleanup(root, config, &mut map).unwrap();
        (report, map)
    }

    #[test]
    fn marker_filenames_renamed_and_recorded() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("til-logo.png"), "x").unwrap();

        let (report, map) = run(tmp.path(), &SiteportConfig::default());
        assert_eq!(report.renamed.len(), 1);
        assert!(tmp.path().join("ai-logo.png").exists());
        assert_eq!(map.resolve("til-logo.png"), "ai-logo.png");
    }

    #[test]
    fn sanitize_cleans_awkward_names() {
        assert_eq!(sanitize("logo (1), final & done.png"), "logo_1_final_and_done.png");
        assert_eq!(sanitize("a__b.png"), "a_b.png");
    }

    #[test]
    fn clean_filenames_untouched() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("photo.png"), "x").unwrap();

        let (report, map) = run(tmp.path(), &SiteportConfig::default());
        assert!(report.renamed.is_empty());
        assert!(map.is_empty());
        assert!(tmp.path().join("photo.png").exists());
    }

    #[test]
    fn delete_lists_applied() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("stats.js"), "x").unwrap();
        fs::write(tmp.path().join("til-widget.js"), "x").unwrap();

        let mut config = SiteportConfig::default();
        config.cleanup.delete_as_is = vec!["stats.js".to_string()];
        config.cleanup.delete_after_rename = vec!["ai-widget.js".to_string()];

        let (report, _) = run(tmp.path(), &config);
        assert_eq!(report.removed.len(), 2);
        assert!(!tmp.path().join("stats.js").exists());
        assert!(!tmp.path().join("ai-widget.js").exists());
    }

    #[test]
    fn excluded_names_never_renamed() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("til-keep.css"), "x").unwrap();

        let mut config = SiteportConfig::default();
        config.cleanup.exclude_from_rename = vec!["til-keep.css".to_string()];

        let (report, _) = run(tmp.path(), &config);
        assert!(report.renamed.is_empty());
        assert!(tmp.path().join("til-keep.css").exists());
    }

    #[test]
    fn placeholder_created_once() {
        let tmp = TempDir::new().unwrap();
        let (_, _) = run(tmp.path(), &SiteportConfig::default());
        let placeholder = tmp.path().join("images/1px.png");
        assert!(placeholder.exists());
        let bytes = fs::read(&placeholder).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");

        // Second run leaves the existing file alone
        let (report, _) = run(tmp.path(), &SiteportConfig::default());
        assert!(!report.warnings.iter().any(|w| w.contains("placeholder")));
    }

    #[test]
    fn invalid_marker_pattern_warns_and_continues() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("til-logo.png"), "x").unwrap();

        let mut config = SiteportConfig::default();
        config.cleanup.marker_pattern = "(".to_string();

        let (report, map) = run(tmp.path(), &config);
        assert!(report.warnings.iter().any(|w| w.contains("marker_pattern")));
        assert!(map.is_empty());
        assert!(tmp.path().join("til-logo.png").exists());
    }
}
