//! Read-only link audit, run after the rewrite stage.
//!
//! Walks every HTML page, extracts references with the same pattern
//! catalogue the rewriter uses, and verifies each local reference lands on
//! an existing file. Nothing is ever written: the auditor's output is a
//! count of checked and broken references plus the list of misses, so a run
//! ends with an honest answer to "is the exported tree self-consistent now".
//!
//! Resolution mirrors the rewriter's precedence: query strings and
//! fragments are split off, ignored prefixes are skipped, root-relative
//! references consult the route table before the filesystem. One deliberate
//! difference: parent-relative (`../`) links, which the rewriter leaves
//! untouched, are still resolved against the base directory and checked
//! here — a miss is a miss regardless of how the link is spelled.
//!
//! One quirk of exported trees is handled here: a page named `*body.html`
//! is an embedded frame whose links are written relative to the page that
//! includes it, not to its own directory. For those files the auditor
//! searches the ancestor directories for the matching head page
//! (`<stem-without-body>.html`, then `.htm`) and checks relative links
//! against that directory instead.

use std::path::{Path, PathBuf};

use crate::config::SiteportConfig;
use crate::rewrite::{split_suffix, ATTR_DOUBLE, ATTR_SINGLE, CSS_URL};
use crate::routes::RouteTable;
use crate::walk;

/// One reference that resolved to nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenLink {
    /// Page the reference appears in, relative to the project root.
    pub file: String,
    /// The reference as written in the markup.
    pub link: String,
}

/// Outcome of one audit pass.
#[derive(Debug, Default)]
pub struct AuditReport {
    pub files: usize,
    pub checked: usize,
    pub broken: Vec<BrokenLink>,
    pub warnings: Vec<String>,
}

impl AuditReport {
    pub fn broken_count(&self) -> usize {
        self.broken.len()
    }
}

/// Checks references against the filesystem without modifying anything.
pub struct Auditor<'a> {
    root: &'a Path,
    routes: &'a RouteTable,
    config: &'a SiteportConfig,
}

impl<'a> Auditor<'a> {
    pub fn new(root: &'a Path, routes: &'a RouteTable, config: &'a SiteportConfig) -> Self {
        Self {
            root,
            routes,
            config,
        }
    }

    /// Audit every HTML page under the project root.
    pub fn audit_tree(&self) -> AuditReport {
        let mut report = AuditReport::default();
        let html = [".html".to_string(), ".htm".to_string()];
        for path in walk::list_files(self.root, &html) {
            let rel = walk::rel_path(&path, self.root);
            match walk::read_text(&path) {
                Ok(text) => {
                    report.files += 1;
                    self.audit_page(&rel, &path, &text, &mut report);
                }
                Err(err) => report.warnings.push(format!("could not read {rel}: {err}")),
            }
        }
        report
    }

    fn audit_page(&self, rel: &str, path: &Path, text: &str, report: &mut AuditReport) {
        let base_dir = self.effective_base_dir(path);
        let mut check = |link: &str| {
            if self.should_skip(link) {
                return;
            }
            let (base, _) = split_suffix(link);
            if base.is_empty() {
                return;
            }
            report.checked += 1;
            if !self.reference_exists(base, &base_dir) {
                report.broken.push(BrokenLink {
                    file: rel.to_string(),
                    link: link.to_string(),
                });
            }
        };

        for caps in ATTR_DOUBLE.captures_iter(text) {
            check(&caps["link"]);
        }
        for caps in ATTR_SINGLE.captures_iter(text) {
            check(&caps["link"]);
        }
        for caps in CSS_URL.captures_iter(text) {
            check(caps["link"].trim());
        }
    }

    fn reference_exists(&self, base: &str, base_dir: &Path) -> bool {
        if let Some(rest) = base.strip_prefix('/') {
            if let Some(route) = self.routes.lookup(base) {
                return route.exists;
            }
            return self.root.join(rest).exists();
        }
        let candidate = walk::normalize_lexical(&base_dir.join(base.replace('\\', "/")));
        candidate.exists()
    }

    /// Directory relative links should be resolved against. For an embedded
    /// `*body` frame this is the directory of its head page when one is
    /// found in an ancestor directory.
    fn effective_base_dir(&self, path: &Path) -> PathBuf {
        let dir = path.parent().unwrap_or(self.root).to_path_buf();
        let stem = match path.file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => return dir,
        };
        let head = match stem.strip_suffix("body") {
            Some(head) if !head.is_empty() => head,
            _ => return dir,
        };

        for ancestor in dir.ancestors() {
            if !ancestor.starts_with(self.root) {
                break;
            }
            for ext in ["html", "htm"] {
                if ancestor.join(format!("{head}.{ext}")).exists() {
                    return ancestor.to_path_buf();
                }
            }
        }
        dir
    }

    fn should_skip(&self, url: &str) -> bool {
        self.config
            .links
            .ignore_prefixes
            .iter()
            .any(|p| url.starts_with(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteportConfig;
    use std::fs;
    use tempfile::TempDir;

    fn audit(root: &Path) -> AuditReport {
        audit_with_routes(root, RouteTable::default())
    }

    fn audit_with_routes(root: &Path, routes: RouteTable) -> AuditReport {
        let config = SiteportConfig::default();
        Auditor::new(root, &routes, &config).audit_tree()
    }

    fn page(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn intact_references_pass() {
        let tmp = TempDir::new().unwrap();
        page(tmp.path(), "about.html", "x");
        page(tmp.path(), "index.html", r#"<a href="about.html">a</a>"#);

        let report = audit(tmp.path());
        assert_eq!(report.checked, 1);
        assert!(report.broken.is_empty());
    }

    #[test]
    fn missing_target_reported_with_source_file() {
        let tmp = TempDir::new().unwrap();
        page(tmp.path(), "index.html", r#"<a href="gone.html">a</a>"#);

        let report = audit(tmp.path());
        assert_eq!(report.broken_count(), 1);
        assert_eq!(report.broken[0].file, "index.html");
        assert_eq!(report.broken[0].link, "gone.html");
    }

    #[test]
    fn audit_never_modifies_files() {
        let tmp = TempDir::new().unwrap();
        let content = r#"<a href="gone.html">a</a>"#;
        page(tmp.path(), "index.html", content);

        audit(tmp.path());
        assert_eq!(
            fs::read_to_string(tmp.path().join("index.html")).unwrap(),
            content
        );
    }

    #[test]
    fn cache_buster_suffix_ignored() {
        let tmp = TempDir::new().unwrap();
        page(tmp.path(), "img.png", "x");
        page(tmp.path(), "index.html", r#"<img src="img.png?t=1712345678">"#);

        let report = audit(tmp.path());
        assert!(report.broken.is_empty());
    }

    #[test]
    fn external_and_anchor_references_skipped() {
        let tmp = TempDir::new().unwrap();
        page(
            tmp.path(),
            "index.html",
            concat!(
                r#"<a href="https://example.com/">a</a>"#,
                r##"<a href="#section">b</a>"##,
                r#"<a href="mailto:x@example.com">c</a>"#,
            ),
        );

        let report = audit(tmp.path());
        assert_eq!(report.checked, 0);
    }

    #[test]
    fn parent_relative_links_resolved_and_checked() {
        let tmp = TempDir::new().unwrap();
        page(tmp.path(), "index.html", "x");
        page(
            tmp.path(),
            "sub/page.html",
            concat!(
                r#"<a href="../index.html">up</a>"#,
                r#"<a href="../gone.html">missing</a>"#,
            ),
        );

        let report = audit(tmp.path());
        assert_eq!(report.checked, 2);
        assert_eq!(report.broken_count(), 1);
        assert_eq!(report.broken[0].file, "sub/page.html");
        assert_eq!(report.broken[0].link, "../gone.html");
    }

    #[test]
    fn rooted_reference_checked_through_routes() {
        let tmp = TempDir::new().unwrap();
        page(tmp.path(), "page123.html", "x");
        page(tmp.path(), "index.html", r#"<a href="/careers">a</a>"#);

        let mut routes = RouteTable::default();
        routes.parse_rules("RewriteRule ^careers$ page123.html\n", tmp.path());

        let report = audit_with_routes(tmp.path(), routes);
        assert!(report.broken.is_empty());
    }

    #[test]
    fn rooted_reference_without_route_checked_on_disk() {
        let tmp = TempDir::new().unwrap();
        page(tmp.path(), "index.html", r#"<a href="/missing.html">a</a>"#);

        let report = audit(tmp.path());
        assert_eq!(report.broken_count(), 1);
    }

    #[test]
    fn body_frame_links_resolve_against_head_page_dir() {
        let tmp = TempDir::new().unwrap();
        page(tmp.path(), "about.html", "head");
        page(tmp.path(), "images/photo.png", "x");
        // The frame sits in a subdirectory but its links are written
        // relative to the head page's directory.
        page(
            tmp.path(),
            "frames/aboutbody.html",
            r#"<img src="images/photo.png">"#,
        );

        let report = audit(tmp.path());
        assert!(report.broken.is_empty(), "{:?}", report.broken);
    }

    #[test]
    fn body_frame_without_head_page_uses_own_dir() {
        let tmp = TempDir::new().unwrap();
        page(tmp.path(), "frames/lonelybody.html", r#"<img src="pic.png">"#);
        page(tmp.path(), "frames/pic.png", "x");

        let report = audit(tmp.path());
        assert!(report.broken.is_empty());
    }

    #[test]
    fn css_url_references_checked() {
        let tmp = TempDir::new().unwrap();
        page(
            tmp.path(),
            "index.html",
            "<style>body { background: url('bg.png'); }</style>",
        );

        let report = audit(tmp.path());
        assert_eq!(report.broken_count(), 1);
        assert_eq!(report.broken[0].link, "bg.png");
    }
}
