//! Builder-remnant scrubbing — runs right after the asset stage.
//!
//! Two jobs, both confined to the project root:
//!
//! - **Service files**: `robots.txt` and `readme.txt` (configurable) keep
//!   lines and snippets the builder wrote about itself. Configured patterns
//!   are removed: a generic list applied to every listed file, a
//!   robots-only removal list, and readme-only pattern→replacement pairs.
//! - **404 page**: the exported `404.html` carries the builder's own title,
//!   a backlink to the builder's site, and its tracking scripts. The title
//!   is forced to the configured text (inserted into `<head>` when the tag
//!   is missing), the backlink is replaced with a plain not-found message,
//!   and every `<script>` block is dropped.
//!
//! All patterns compile case-insensitively; an invalid pattern is a warning
//! and the rule is skipped. Files are written back only on change, so the
//! stage is idempotent.

use std::path::Path;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::config::{RemnantsConfig, SiteportConfig, Substitution};
use crate::walk;

#[derive(Error, Debug)]
pub enum ScrubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the stage did, for reporting.
#[derive(Debug, Default)]
pub struct ScrubReport {
    pub files_cleaned: usize,
    pub not_found_updated: bool,
    pub warnings: Vec<String>,
}

static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)(<title\b[^>]*>)(.*?)(</title>)").unwrap());
static HEAD_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<head\b[^>]*>").unwrap());
static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script>").unwrap());

/// Scrub the configured service files and normalize the 404 page.
pub fn scrub_remnants(root: &Path, config: &SiteportConfig) -> Result<ScrubReport, ScrubError> {
    let mut report = ScrubReport::default();
    let remnants = &config.remnants;

    let generic = compile_list(&remnants.generic_patterns, &mut report.warnings);
    let robots = compile_list(&remnants.robots_patterns, &mut report.warnings);
    let readme = compile_pairs(&remnants.readme_patterns, &mut report.warnings);

    for name in &remnants.files {
        let path = root.join(name);
        if !path.exists() {
            continue;
        }
        let text = match walk::read_text(&path) {
            Ok(text) => text,
            Err(err) => {
                report.warnings.push(format!("scrub skipped {name}: {err}"));
                continue;
            }
        };

        let mut text = text;
        for re in &generic {
            text = re.replace_all(&text, "").into_owned();
        }
        if name.eq_ignore_ascii_case("robots.txt") {
            for re in &robots {
                text = re.replace_all(&text, "").into_owned();
            }
        }
        if name.eq_ignore_ascii_case("readme.txt") {
            for (re, replacement) in &readme {
                text = re.replace_all(&text, replacement.as_str()).into_owned();
            }
        }

        if walk::write_if_changed(&path, &text)? {
            report.files_cleaned += 1;
        }
    }

    report.not_found_updated = update_not_found_page(root, remnants, &mut report.warnings)?;
    Ok(report)
}

/// Normalize `404.html`: forced title, builder backlink replaced, scripts
/// dropped. Returns whether the page changed.
fn update_not_found_page(
    root: &Path,
    remnants: &RemnantsConfig,
    warnings: &mut Vec<String>,
) -> Result<bool, ScrubError> {
    let path = root.join("404.html");
    if !path.exists() {
        return Ok(false);
    }
    let original = walk::read_text(&path)?;
    let title = &remnants.not_found_title;

    let mut text = TITLE_TAG
        .replace_all(&original, |caps: &regex::Captures| {
            format!("{}{title}{}", &caps[1], &caps[3])
        })
        .into_owned();
    if !TITLE_TAG.is_match(&text) {
        // No title tag at all; put one right after <head>.
        if let Some(m) = HEAD_OPEN.find(&text) {
            text.insert_str(m.end(), &format!("<title>{title}</title>"));
        }
    }

    match RegexBuilder::new(&remnants.builder_link_pattern)
        .case_insensitive(true)
        .build()
    {
        Ok(re) => {
            text = re
                .replace_all(&text, remnants.builder_link_replacement.as_str())
                .into_owned();
        }
        Err(err) => warnings.push(format!(
            "remnants.builder_link_pattern rejected: {err}"
        )),
    }

    text = SCRIPT_BLOCK.replace_all(&text, "").into_owned();
    Ok(walk::write_if_changed(&path, &text)?)
}

fn compile_list(patterns: &[String], warnings: &mut Vec<String>) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| compile_one(p, warnings))
        .collect()
}

fn compile_pairs(
    pairs: &[Substitution],
    warnings: &mut Vec<String>,
) -> Vec<(Regex, String)> {
    pairs
        .iter()
        .filter_map(|s| compile_one(&s.pattern, warnings).map(|re| (re, s.replacement.clone())))
        .collect()
}

fn compile_one(pattern: &str, warnings: &mut Vec<String>) -> Option<Regex> {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => Some(re),
        Err(err) => {
            warnings.push(format!("scrub pattern '{pattern}' rejected: {err}"));
            None
        }
    }
}
