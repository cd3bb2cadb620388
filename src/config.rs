//! Pipeline configuration module.
//!
//! Handles loading and validating `siteport.toml`. Every option has a stock
//! default tuned for the site-builder exports this tool was written for, so
//! a config file is optional and sparse — override just the values you want.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [case]
//! enabled = true
//! # Files with these extensions get lower-cased names
//! extensions = [".html", ".htm", ".css", ".js", ".php", ".txt"]
//!
//! [text]
//! # Files with these extensions are eligible for reference rewriting
//! extensions = [
//!     ".html", ".htm", ".css", ".js", ".php", ".txt", ".json",
//!     ".xml", ".yml", ".yaml", ".md", ".svg",
//! ]
//!
//! [links]
//! # References starting with any of these are never rewritten
//! ignore_prefixes = [
//!     "http://", "https://", "//", "mailto:", "tel:",
//!     "javascript:", "data:", "about:", "#",
//! ]
//! # Root-relative references into these folders become relative
//! static_prefixes = ["css/", "js/", "images/", "files/"]
//!
//! [cleanup]
//! # Builder marker in filenames, replaced during the asset rename stage
//! marker_pattern = "\\btil"
//! marker_replacement = "ai"
//! delete_as_is = []
//! delete_after_rename = []
//! exclude_from_rename = ["robots.txt", "sitemap.xml", ".htaccess"]
//!
//! [scripts]
//! # <script> tags referencing these names get commented out
//! comment_out = []
//! # <link rel="..."> values whose tags get commented out
//! link_rel_comment_out = []
//! # URL patterns replaced with the placeholder asset
//! placeholder_patterns = []
//! # Free-form patterns whose whole match gets commented out
//! comment_patterns = []
//! placeholder_path = "images/1px.png"
//!
//! [remnants]
//! # Service files at the project root eligible for scrubbing
//! files = ["robots.txt", "readme.txt"]
//! # Removed from every listed file / from robots.txt only
//! generic_patterns = []
//! robots_patterns = []
//! # pattern/replacement pairs applied to readme.txt only
//! readme_patterns = []
//! # 404-page normalization
//! not_found_title = "Page 404, oooops..."
//!
//! [report]
//! # Directory (next to the project root) for run artifacts
//! dir = "logs"
//! rename_map_file = "rename_map.json"
//! ```
//!
//! Unknown keys are rejected to catch typos early. Pattern strings are kept
//! as plain strings here; the stages that consume them compile each one and
//! skip invalid patterns with a warning, so a bad pattern never aborts a run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `siteport.toml`.
///
/// All fields have defaults matching the stock export layout. Unknown keys
/// are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteportConfig {
    /// Filename case normalization settings.
    pub case: CaseConfig,
    /// Which files count as text for reference rewriting.
    pub text: TextConfig,
    /// Link resolution settings (ignored schemes, static folders).
    pub links: LinksConfig,
    /// Asset rename/removal settings for the first pipeline stage.
    pub cleanup: CleanupConfig,
    /// Script/link comment-out and placeholder substitution rules.
    pub scripts: ScriptsConfig,
    /// Service-file scrubbing and 404-page normalization.
    pub remnants: RemnantsConfig,
    /// Run artifact locations.
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaseConfig {
    /// Disable the case-normalization stage entirely.
    pub enabled: bool,
    /// Extensions (dotted, lower-case) whose files get lower-cased names.
    pub extensions: Vec<String>,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extensions: strings(&[".html", ".htm", ".css", ".js", ".php", ".txt"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextConfig {
    /// Extensions of files scanned and rewritten in place.
    pub extensions: Vec<String>,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            extensions: strings(&[
                ".html", ".htm", ".css", ".js", ".php", ".txt", ".json", ".xml", ".yml",
                ".yaml", ".md", ".svg",
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinksConfig {
    /// URL prefixes that are never rewritten (external schemes, anchors).
    pub ignore_prefixes: Vec<String>,
    /// Top-level folders whose root-relative references become relative.
    pub static_prefixes: Vec<String>,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            ignore_prefixes: strings(&[
                "http://",
                "https://",
                "//",
                "mailto:",
                "tel:",
                "javascript:",
                "data:",
                "about:",
                "#",
            ]),
            static_prefixes: strings(&["css/", "js/", "images/", "files/"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanupConfig {
    /// Pattern marking builder-generated filenames (matched on the stem).
    pub marker_pattern: String,
    /// Replacement for the first marker occurrence in a renamed stem.
    pub marker_replacement: String,
    /// Filenames (case-insensitive) deleted before any renaming.
    pub delete_as_is: Vec<String>,
    /// Filenames (case-insensitive) deleted after the rename step.
    pub delete_after_rename: Vec<String>,
    /// Filenames never touched by the rename step.
    pub exclude_from_rename: Vec<String>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            marker_pattern: r"\btil".to_string(),
            marker_replacement: "ai".to_string(),
            delete_as_is: Vec::new(),
            delete_after_rename: Vec::new(),
            exclude_from_rename: strings(&["robots.txt", "sitemap.xml", ".htaccess"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsConfig {
    /// Script filenames whose `<script>` tags get wrapped in HTML comments.
    pub comment_out: Vec<String>,
    /// `<link rel="...">` values whose tags get wrapped in HTML comments.
    pub link_rel_comment_out: Vec<String>,
    /// URL patterns replaced with `placeholder_path`.
    pub placeholder_patterns: Vec<String>,
    /// Free-form patterns whose whole match gets wrapped in HTML comments.
    pub comment_patterns: Vec<String>,
    /// Asset substituted for placeholder-pattern matches.
    pub placeholder_path: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            comment_out: Vec::new(),
            link_rel_comment_out: Vec::new(),
            placeholder_patterns: Vec::new(),
            comment_patterns: Vec::new(),
            placeholder_path: "images/1px.png".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemnantsConfig {
    /// Service files at the project root eligible for scrubbing.
    pub files: Vec<String>,
    /// Patterns removed from every listed file.
    pub generic_patterns: Vec<String>,
    /// Patterns removed from `robots.txt` only.
    pub robots_patterns: Vec<String>,
    /// Substitutions applied to `readme.txt` only.
    pub readme_patterns: Vec<Substitution>,
    /// Title forced onto the 404 page.
    pub not_found_title: String,
    /// Pattern matching the builder's backlink on the 404 page.
    pub builder_link_pattern: String,
    /// Markup substituted for the builder backlink.
    pub builder_link_replacement: String,
}

/// One pattern→replacement pair; an empty replacement removes the match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Substitution {
    pub pattern: String,
    pub replacement: String,
}

impl Default for Substitution {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            replacement: String::new(),
        }
    }
}

impl Default for RemnantsConfig {
    fn default() -> Self {
        Self {
            files: strings(&["robots.txt", "readme.txt"]),
            generic_patterns: Vec::new(),
            robots_patterns: Vec::new(),
            readme_patterns: Vec::new(),
            not_found_title: "Page 404, oooops...".to_string(),
            builder_link_pattern: r#"(?is)<a\b[^>]*href=["']https://aida\.cc["'][^>]*>.*?</a>"#
                .to_string(),
            builder_link_replacement: "<h1>404</h1><p>Page not found, oooops...</p>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Directory for run artifacts, resolved next to the project root.
    pub dir: String,
    /// Rename-map artifact filename; prefixed with the project name.
    pub rename_map_file: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
            rename_map_file: "rename_map.json".to_string(),
        }
    }
}

impl SiteportConfig {
    /// Validate cross-field invariants once at load time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.text.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "text.extensions must not be empty".into(),
            ));
        }
        for ext in self.case.extensions.iter().chain(&self.text.extensions) {
            if !ext.starts_with('.') {
                return Err(ConfigError::Validation(format!(
                    "extension '{ext}' must start with a dot"
                )));
            }
        }
        if self.scripts.placeholder_path.is_empty() {
            return Err(ConfigError::Validation(
                "scripts.placeholder_path must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Load config from `dir/siteport.toml`, falling back to defaults when the
/// file doesn't exist.
pub fn load_config(dir: &Path) -> Result<SiteportConfig, ConfigError> {
    let path = dir.join("siteport.toml");
    let config = if path.exists() {
        let content = fs::read_to_string(&path)?;
        toml::from_str(&content)?
    } else {
        SiteportConfig::default()
    };
    config.validate()?;
    Ok(config)
}

/// Stock config with every option documented, for `siteport gen-config`.
pub fn stock_config_toml() -> String {
    let stock = SiteportConfig::default();
    let body = toml::to_string_pretty(&stock).unwrap_or_default();
    format!(
        "# siteport configuration\n# Every option is optional; the values below are the defaults.\n\n{body}"
    )
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}
