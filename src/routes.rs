//! Apache-style routing rule parsing.
//!
//! Exported sites ship a `.htaccess` whose rewrite rules are the only record
//! of which virtual URLs (`/careers`) map to which physical pages
//! (`page12345.html`). This module parses those directives into a
//! [`RouteTable`] that the reference rewriter and link auditor consult
//! before any rename-map or filesystem lookup.
//!
//! Recognized directives (case-insensitive, line-oriented):
//!
//! ```text
//! RewriteRule ^careers$ page12345.html [L]
//! Redirect 301 /old-page /new-page.html
//! RedirectPermanent /old /new.html
//! DirectoryIndex index.html
//! ```
//!
//! Rules whose alias still carries a substitution marker after anchor
//! stripping (a `$1` back-reference, grouping, wildcards) are dropped — they
//! can't be resolved statically. Targets are vetted against the project
//! root: absolute URLs and paths escaping the root are rejected, leaving
//! the entry with `exists = false` and no resolved path.
//!
//! Malformed lines are ignored without error; an unreadable rule file only
//! produces a warning and an empty (or smaller) table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::walk;

static REWRITE_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*RewriteRule[ \t]+(\S+)[ \t]+(\S+)").unwrap()
});
static REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*Redirect(?:Permanent|[ \t]+3\d{2})?[ \t]+(/\S+)[ \t]+(\S+)").unwrap()
});
static DIRECTORY_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)DirectoryIndex\s+(\S+\.html?)").unwrap());

/// A single route discovered in the rule files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Normalized alias: single leading slash, no duplicate slashes.
    pub alias: String,
    /// Target exactly as declared in the rule.
    pub target: String,
    /// Filesystem path the target resolves to, when it stays inside the
    /// project root.
    pub resolved: Option<PathBuf>,
    /// Whether the resolved path exists on disk.
    pub exists: bool,
}

/// Alias → target table built once per run from the routing rule files.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: BTreeMap<String, RouteEntry>,
    warnings: Vec<String>,
}

impl RouteTable {
    /// Parse `.htaccess` / `htaccess` at the project root.
    pub fn collect(project_root: &Path) -> Self {
        let mut table = Self::default();
        for name in [".htaccess", "htaccess"] {
            let path = project_root.join(name);
            if !path.exists() {
                continue;
            }
            match walk::read_text(&path) {
                Ok(text) => table.parse_rules(&text, project_root),
                Err(err) => table
                    .warnings
                    .push(format!("could not read {name}: {err}")),
            }
        }
        table
    }

    /// Merge directives from one rule file's text. Last writer wins per
    /// alias; later files override earlier ones the same way.
    pub fn parse_rules(&mut self, text: &str, project_root: &Path) {
        for cap in REWRITE_RULE.captures_iter(text) {
            if let Some(alias) = strip_pattern_anchors(&cap[1]) {
                self.store(&alias, &cap[2], project_root);
            }
        }
        for cap in REDIRECT.captures_iter(text) {
            self.store(&cap[1], &cap[2], project_root);
        }
        if let Some(cap) = DIRECTORY_INDEX.captures(text) {
            self.store("/", &cap[1], project_root);
        }
    }

    fn store(&mut self, alias: &str, target: &str, project_root: &Path) {
        let alias = normalize_alias(alias);
        let target = target.trim().to_string();
        let resolved = resolve_target(&target, project_root);
        let exists = resolved.as_deref().is_some_and(Path::exists);
        self.entries.insert(
            alias.clone(),
            RouteEntry {
                alias,
                target,
                resolved,
                exists,
            },
        );
    }

    /// Look up a route by alias (normalized before the lookup).
    pub fn lookup(&self, alias: &str) -> Option<&RouteEntry> {
        self.entries.get(&normalize_alias(alias))
    }

    /// All entries in alias order, for diagnostics.
    pub fn all(&self) -> Vec<&RouteEntry> {
        self.entries.values().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Strip `^`/`$` anchors and an optional-query `?` suffix from a rewrite
/// alias pattern. Returns None when the remainder still carries regex
/// machinery (back-references, groups, wildcards) — such rules can't be
/// turned into a static alias.
fn strip_pattern_anchors(pattern: &str) -> Option<String> {
    let stripped = pattern
        .trim()
        .trim_start_matches('^')
        .trim_end_matches('$')
        .trim_end_matches('?');
    if stripped.is_empty() {
        return None;
    }
    if stripped
        .chars()
        .any(|c| matches!(c, '$' | '(' | ')' | '*' | '+' | '[' | ']' | '|' | '\\' | '{' | '}'))
    {
        return None;
    }
    Some(stripped.to_string())
}

/// Normalize an alias to a single leading slash with no duplicate slashes.
fn normalize_alias(alias: &str) -> String {
    let mut collapsed = String::with_capacity(alias.len());
    let mut prev_slash = false;
    for c in alias.trim().chars() {
        if c == '/' {
            if !prev_slash {
                collapsed.push('/');
            }
            prev_slash = true;
        } else {
            collapsed.push(c);
            prev_slash = false;
        }
    }
    let trimmed = collapsed.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Resolve a rule target to a filesystem path under the project root.
///
/// Rejected: empty targets, targets with unresolved substitution markers,
/// absolute URLs, and anything whose normalized path leaves the root.
fn resolve_target(target: &str, project_root: &Path) -> Option<PathBuf> {
    let target = target.trim();
    if target.is_empty() || target.contains('$') {
        return None;
    }
    if ["http://", "https://", "//"]
        .iter()
        .any(|p| target.starts_with(p))
    {
        return None;
    }

    let clean = target
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    if clean.is_empty() {
        return None;
    }

    let relative = clean.trim_start_matches('/');
    let root = walk::normalize_lexical(project_root);
    let candidate = walk::normalize_lexical(&project_root.join(relative));
    if candidate != root && !candidate.starts_with(&root) {
        return None;
    }
    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn table_from(text: &str, root: &Path) -> RouteTable {
        let mut table = RouteTable::default();
        table.parse_rules(text, root);
        table
    }

    #[test]
    fn rewrite_rule_parsed_and_resolved() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("page12345.html"), "x").unwrap();

        let table = table_from("RewriteRule ^careers$ page12345.html [L]\n", tmp.path());
        let entry = table.lookup("/careers").unwrap();
        assert_eq!(entry.target, "page12345.html");
        assert!(entry.exists);
        assert!(entry.resolved.is_some());
    }

    #[test]
    fn redirect_with_status_code() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("new.html"), "x").unwrap();

        let table = table_from("Redirect 301 /old /new.html\n", tmp.path());
        let entry = table.lookup("/old").unwrap();
        assert_eq!(entry.target, "/new.html");
        assert!(entry.exists);
    }

    #[test]
    fn redirect_permanent_variant() {
        let tmp = TempDir::new().unwrap();
        let table = table_from("RedirectPermanent /a /b.html\n", tmp.path());
        assert!(table.lookup("/a").is_some());
    }

    #[test]
    fn directory_index_maps_root_alias() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("index.html"), "x").unwrap();

        let table = table_from("DirectoryIndex index.html\n", tmp.path());
        let entry = table.lookup("/").unwrap();
        assert_eq!(entry.target, "index.html");
        assert!(entry.exists);
    }

    #[test]
    fn alias_with_backreference_dropped() {
        let tmp = TempDir::new().unwrap();
        let table = table_from("RewriteRule ^page-(.*)$ page$1.html\n", tmp.path());
        assert!(table.is_empty());
    }

    #[test]
    fn target_with_marker_not_resolved() {
        let tmp = TempDir::new().unwrap();
        let table = table_from("Redirect 302 /x page$1.html\n", tmp.path());
        let entry = table.lookup("/x").unwrap();
        assert!(entry.resolved.is_none());
        assert!(!entry.exists);
    }

    #[test]
    fn absolute_url_target_not_resolved() {
        let tmp = TempDir::new().unwrap();
        let table = table_from("Redirect 301 /ext https://example.com/\n", tmp.path());
        let entry = table.lookup("/ext").unwrap();
        assert!(entry.resolved.is_none());
        assert!(!entry.exists);
    }

    #[test]
    fn traversal_outside_root_rejected() {
        let tmp = TempDir::new().unwrap();
        let table = table_from("RewriteRule ^up$ ../../etc/passwd\n", tmp.path());
        let entry = table.lookup("/up").unwrap();
        assert!(entry.resolved.is_none());
        assert!(!entry.exists);
    }

    #[test]
    fn target_query_stripped_before_resolution() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("page.html"), "x").unwrap();
        let table = table_from("RewriteRule ^p$ page.html?from=old\n", tmp.path());
        let entry = table.lookup("/p").unwrap();
        assert!(entry.exists);
    }

    #[test]
    fn last_writer_wins_per_alias() {
        let tmp = TempDir::new().unwrap();
        let text = "RewriteRule ^a$ first.html\nRewriteRule ^a$ second.html\n";
        let table = table_from(text, tmp.path());
        assert_eq!(table.lookup("/a").unwrap().target, "second.html");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn alias_normalization_collapses_slashes() {
        assert_eq!(normalize_alias("//a///b/"), "/a/b");
        assert_eq!(normalize_alias(""), "/");
        assert_eq!(normalize_alias("careers"), "/careers");
    }

    #[test]
    fn malformed_lines_ignored() {
        let tmp = TempDir::new().unwrap();
        let text = "RewriteEngine On\n# comment\nRewriteCond %{HTTPS} off\n";
        let table = table_from(text, tmp.path());
        assert!(table.is_empty());
    }

    #[test]
    fn collect_reads_htaccess_from_root() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("index.html"), "x").unwrap();
        fs::write(
            tmp.path().join(".htaccess"),
            "DirectoryIndex index.html\nRewriteRule ^jobs$ jobs.html\n",
        )
        .unwrap();

        let table = RouteTable::collect(tmp.path());
        assert_eq!(table.len(), 2);
        assert!(table.lookup("/").unwrap().exists);
        assert!(!table.lookup("/jobs").unwrap().exists);
        assert!(table.warnings().is_empty());
    }

    #[test]
    fn missing_rule_files_leave_table_empty() {
        let tmp = TempDir::new().unwrap();
        let table = RouteTable::collect(tmp.path());
        assert!(table.is_empty());
    }
}
