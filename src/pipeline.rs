//! Stage sequencing for a full run.
//!
//! A fix run executes, in order:
//!
//! 1. asset rename and cleanup ([`crate::assets`]), seeding the rename map,
//! 2. builder-remnant scrubbing ([`crate::scrub`]),
//! 3. filename case normalization ([`crate::casing`]), extending the map,
//! 4. routing rule collection ([`crate::routes`]),
//! 5. reference rewriting ([`crate::rewrite`]),
//! 6. the read-only link audit ([`crate::audit`]).
//!
//! The stages are deliberately sequential: each one's view of the tree is
//! the previous one's output, and the rename map grows monotonically
//! through the renaming stages. After the rewrite stage the map is frozen and
//! dumped as a JSON artifact next to the project root, so a run leaves a
//! reviewable record of every rename it applied.
//!
//! Stage-internal failures surface as warnings inside [`RunStats`]; only
//! environment problems (unreadable root, artifact directory that cannot
//! be created) abort the run.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::assets;
use crate::audit::{AuditReport, Auditor};
use crate::casing;
use crate::config::SiteportConfig;
use crate::renames::RenameMap;
use crate::rewrite::Rewriter;
use crate::routes::RouteTable;
use crate::scrub;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("project root not found: {0}")]
    RootNotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Assets(#[from] assets::AssetsError),
    #[error(transparent)]
    Scrub(#[from] scrub::ScrubError),
    #[error(transparent)]
    Casing(#[from] casing::CasingError),
    #[error("could not serialize rename map: {0}")]
    Artifact(#[from] serde_json::Error),
}

/// Everything a run did, for reporting.
#[derive(Debug, Default)]
pub struct RunStats {
    pub assets_renamed: usize,
    pub assets_removed: usize,
    pub files_scrubbed: usize,
    pub not_found_updated: bool,
    pub case_renames: usize,
    pub files_case_updated: usize,
    pub routes: usize,
    pub references_fixed: usize,
    pub references_broken: usize,
    pub files_rewritten: usize,
    pub rename_map_entries: usize,
    pub rename_map_path: Option<PathBuf>,
    pub audit: AuditReport,
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

/// Run the full fix pipeline over `root`.
pub fn run_fix(root: &Path, config: &SiteportConfig) -> Result<RunStats, PipelineError> {
    if !root.is_dir() {
        return Err(PipelineError::RootNotFound(root.to_path_buf()));
    }

    let started = Instant::now();
    let mut stats = RunStats::default();
    let mut map = RenameMap::new();

    let asset_report = assets::rename_and_cleanup(root, config, &mut map)?;
    stats.assets_renamed = asset_report.renamed.len();
    stats.assets_removed = asset_report.removed.len();
    stats.warnings.extend(asset_report.warnings);

    let scrub_report = scrub::scrub_remnants(root, config)?;
    stats.files_scrubbed = scrub_report.files_cleaned;
    stats.not_found_updated = scrub_report.not_found_updated;
    stats.warnings.extend(scrub_report.warnings);

    if config.case.enabled {
        let case_report = casing::normalize_case(root, config, &mut map)?;
        stats.case_renames = case_report.renamed.len();
        stats.files_case_updated = case_report.files_updated;
        stats.warnings.extend(case_report.warnings);
    }

    let routes = RouteTable::collect(root);
    stats.routes = routes.len();
    stats.warnings.extend(routes.warnings().iter().cloned());

    let rewrite_report = Rewriter::new(root, &routes, &map, config).rewrite_tree();
    stats.references_fixed = rewrite_report.fixed;
    stats.references_broken = rewrite_report.broken;
    stats.files_rewritten = rewrite_report.files_changed;
    stats.warnings.extend(rewrite_report.warnings);

    stats.rename_map_entries = map.len();
    stats.rename_map_path = Some(write_rename_map(root, config, &map)?);

    stats.audit = Auditor::new(root, &routes, config).audit_tree();
    stats.elapsed = started.elapsed();
    Ok(stats)
}

/// Run only the read-only audit over `root`.
pub fn run_audit(root: &Path, config: &SiteportConfig) -> Result<AuditReport, PipelineError> {
    if !root.is_dir() {
        return Err(PipelineError::RootNotFound(root.to_path_buf()));
    }
    let routes = RouteTable::collect(root);
    let mut report = Auditor::new(root, &routes, config).audit_tree();
    report
        .warnings
        .extend(routes.warnings().iter().cloned());
    Ok(report)
}

/// Parse the routing rules under `root`.
pub fn collect_routes(root: &Path) -> Result<RouteTable, PipelineError> {
    if !root.is_dir() {
        return Err(PipelineError::RootNotFound(root.to_path_buf()));
    }
    Ok(RouteTable::collect(root))
}

/// Dump the rename map as `<report dir>/<project>_<artifact name>`.
///
/// The report directory sits next to the project root, never inside it:
/// the site tree is what gets deployed and a later run must not treat the
/// artifact as site content.
fn write_rename_map(
    root: &Path,
    config: &SiteportConfig,
    map: &RenameMap,
) -> Result<PathBuf, PipelineError> {
    let project = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "site".to_string());
    let dir = root
        .parent()
        .unwrap_or(root)
        .join(&config.report.dir);
    fs::create_dir_all(&dir)?;

    let path = dir.join(format!("{project}_{}", config.report.rename_map_file));
    fs::write(&path, map.to_json()?)?;
    Ok(path)
}

// The end-to-end runs over a full fixture site live in tests/pipeline.rs;
// only the entry-point guards are checked here.
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert!(matches!(
            run_fix(&missing, &SiteportConfig::default()),
            Err(PipelineError::RootNotFound(_))
        ));
        assert!(matches!(
            run_audit(&missing, &SiteportConfig::default()),
            Err(PipelineError::RootNotFound(_))
        ));
        assert!(matches!(
            collect_routes(&missing),
            Err(PipelineError::RootNotFound(_))
        ));
    }
}
