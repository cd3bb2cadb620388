//! Reference rewriting — the heart of the pipeline.
//!
//! Walks every text-bearing file, extracts each link-like reference, and
//! pushes it through the resolution chain:
//!
//! 1. **RouteTable** — root-relative references matching a routing alias are
//!    rewritten to the route's declared target.
//! 2. **Static prefix strip** — `/css/app.css` becomes `css/app.css` when a
//!    known static folder follows the leading slash.
//! 3. **RenameMap** — references matching a recorded rename follow it.
//! 4. **Filesystem** — whatever is left is checked for existence; a miss is
//!    counted as a broken reference. Counters are the only signal: markup
//!    is never annotated, so a file the rewriter cannot fix is at least
//!    never corrupted.
//!
//! References are found as `attr="value"` / `attr='value'` pairs for a
//! fixed attribute set plus CSS `url(...)` occurrences. A query string or
//! fragment is split off before resolution and reattached verbatim.
//! External schemes, protocol-relative URLs, anchors and `mailto:`-style
//! links are skipped via the configured ignore prefixes.
//!
//! After the per-reference pass, every RenameMap key is substituted as a
//! plain substring across the whole document (longest key first), catching
//! references in inline scripts and JSON payloads that no attribute pattern
//! sees. Finally the optional tag rules run: commenting out `<script>` tags
//! and `<link rel>` values by name, and replacing URLs matching the
//! placeholder patterns with the placeholder asset. All of it is
//! idempotent: already-commented tags are recognized and left alone.
//!
//! Files are written back only when the content actually changed.

use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex, RegexBuilder};
use thiserror::Error;

use crate::config::SiteportConfig;
use crate::renames::RenameMap;
use crate::routes::RouteTable;
use crate::walk;

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Attribute references in double or single quotes.
pub(crate) static ATTR_DOUBLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?P<attr>data-src|data-href|href|src|action)\s*=\s*"(?P<link>[^"]+)""#)
        .unwrap()
});
pub(crate) static ATTR_SINGLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?P<attr>data-src|data-href|href|src|action)\s*=\s*'(?P<link>[^']+)'").unwrap()
});
/// CSS url(...) references, quoted or bare.
pub(crate) static CSS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)url\(\s*['"]?(?P<link>[^'")]+?)['"]?\s*\)"#).unwrap());

/// Counters for one file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileCounts {
    pub fixed: usize,
    pub broken: usize,
}

/// Aggregate result of the rewrite stage.
#[derive(Debug, Default)]
pub struct RewriteReport {
    pub fixed: usize,
    pub broken: usize,
    pub files_changed: usize,
    pub warnings: Vec<String>,
}

/// What became of one extracted reference.
enum Resolution {
    Unchanged,
    Rewritten(String),
    Broken,
}

/// Rewrites references against a fixed route table and rename map.
///
/// Holds only borrows: the tables are owned by the pipeline and shared
/// read-only with the auditor.
pub struct Rewriter<'a> {
    root: &'a Path,
    routes: &'a RouteTable,
    map: &'a RenameMap,
    config: &'a SiteportConfig,
}

impl<'a> Rewriter<'a> {
    pub fn new(
        root: &'a Path,
        routes: &'a RouteTable,
        map: &'a RenameMap,
        config: &'a SiteportConfig,
    ) -> Self {
        Self {
            root,
            routes,
            map,
            config,
        }
    }

    /// Rewrite every text-extension file under the project root.
    pub fn rewrite_tree(&self) -> RewriteReport {
        let mut report = RewriteReport::default();
        for path in walk::list_files(self.root, &self.config.text.extensions) {
            let rel = walk::rel_path(&path, self.root);
            match self.rewrite_file(&path) {
                Ok((counts, changed)) => {
                    report.fixed += counts.fixed;
                    report.broken += counts.broken;
                    if changed {
                        report.files_changed += 1;
                    }
                }
                Err(err) => report.warnings.push(format!("skipped {rel}: {err}")),
            }
        }
        report.warnings.extend(self.pattern_warnings());
        report
    }

    /// Rewrite a single file. Returns its counters and whether it changed.
    pub fn rewrite_file(&self, path: &Path) -> Result<(FileCounts, bool), RewriteError> {
        let original = walk::read_text(path)?;
        let dir = path.parent().unwrap_or(self.root);

        let mut counts = FileCounts::default();
        let mut text = self.rewrite_references(&original, dir, &mut counts);
        text = self.apply_rename_map(&text, &mut counts);
        if is_markup(path) {
            text = self.apply_tag_rules(&text, &mut counts);
        }

        let changed = walk::write_if_changed(path, &text)?;
        Ok((counts, changed))
    }

    /// The per-reference pass: attributes in both quote styles, then css urls.
    fn rewrite_references(&self, text: &str, dir: &Path, counts: &mut FileCounts) -> String {
        let text = ATTR_DOUBLE.replace_all(text, |caps: &Captures| {
            match self.resolve(&caps["link"], dir) {
                Resolution::Rewritten(new) => {
                    counts.fixed += 1;
                    format!("{}=\"{new}\"", &caps["attr"])
                }
                Resolution::Broken => {
                    counts.broken += 1;
                    caps[0].to_string()
                }
                Resolution::Unchanged => caps[0].to_string(),
            }
        });
        let text = ATTR_SINGLE.replace_all(&text, |caps: &Captures| {
            match self.resolve(&caps["link"], dir) {
                Resolution::Rewritten(new) => {
                    counts.fixed += 1;
                    format!("{}='{new}'", &caps["attr"])
                }
                Resolution::Broken => {
                    counts.broken += 1;
                    caps[0].to_string()
                }
                Resolution::Unchanged => caps[0].to_string(),
            }
        });
        CSS_URL
            .replace_all(&text, |caps: &Captures| {
                let link = caps["link"].trim();
                match self.resolve(link, dir) {
                    Resolution::Rewritten(new) => {
                        counts.fixed += 1;
                        caps[0].replace(link, &new)
                    }
                    Resolution::Broken => {
                        counts.broken += 1;
                        caps[0].to_string()
                    }
                    Resolution::Unchanged => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Resolve one reference through routes, static prefixes, the rename
    /// map, and finally the filesystem.
    fn resolve(&self, url: &str, dir: &Path) -> Resolution {
        if self.should_skip(url) || url.starts_with("../") {
            return Resolution::Unchanged;
        }

        let (base, suffix) = split_suffix(url);
        if base.is_empty() {
            return Resolution::Unchanged;
        }

        if base.starts_with('/') {
            return self.resolve_rooted(base, suffix);
        }

        if self.map.contains(base) {
            return Resolution::Rewritten(format!("{}{suffix}", self.map.resolve(base)));
        }
        let candidate = walk::normalize_lexical(&dir.join(base.replace('\\', "/")));
        if candidate.exists() {
            Resolution::Unchanged
        } else {
            Resolution::Broken
        }
    }

    fn resolve_rooted(&self, base: &str, suffix: &str) -> Resolution {
        if let Some(route) = self.routes.lookup(base) {
            if route.target != base {
                return Resolution::Rewritten(format!("{}{suffix}", route.target));
            }
        }

        for prefix in &self.config.links.static_prefixes {
            if let Some(rest) = base.strip_prefix('/') {
                if rest.starts_with(prefix.as_str()) {
                    return Resolution::Rewritten(format!("{rest}{suffix}"));
                }
            }
        }

        let relative = base.trim_start_matches('/');
        if self.map.contains(relative) {
            return Resolution::Rewritten(format!("{}{suffix}", self.map.resolve(relative)));
        }

        if self.root.join(relative).exists() {
            Resolution::Unchanged
        } else {
            Resolution::Broken
        }
    }

    fn should_skip(&self, url: &str) -> bool {
        self.config
            .links
            .ignore_prefixes
            .iter()
            .any(|p| url.starts_with(p.as_str()))
    }

    /// Whole-document substitution of every rename-map key, longest first.
    fn apply_rename_map(&self, text: &str, counts: &mut FileCounts) -> String {
        let mut text = text.to_string();
        for key in self.map.keys_longest_first() {
            if text.contains(key) {
                text = text.replace(key, self.map.resolve(key));
                counts.fixed += 1;
            }
        }
        text
    }

    /// Comment-out and placeholder rules, applied to already-rewritten text.
    fn apply_tag_rules(&self, text: &str, counts: &mut FileCounts) -> String {
        let scripts = &self.config.scripts;
        let mut text = text.to_string();

        for name in &scripts.comment_out {
            let pattern = format!("<script[^>]+{}[^>]*></script>", regex::escape(name));
            if let Some(re) = self.user_regex(&pattern) {
                let (updated, n) = wrap_in_comments(&text, &re);
                text = updated;
                counts.fixed += n;
            }
        }

        for rel in &scripts.link_rel_comment_out {
            let pattern = format!("<link[^>]+rel=\"{}\"[^>]*>", regex::escape(rel));
            if let Some(re) = self.user_regex(&pattern) {
                let (updated, n) = wrap_in_comments(&text, &re);
                text = updated;
                counts.fixed += n;
            }
        }

        for pattern in &scripts.placeholder_patterns {
            if let Some(re) = self.user_regex(pattern) {
                let mut n = 0;
                text = re
                    .replace_all(&text, |_: &Captures| {
                        n += 1;
                        scripts.placeholder_path.clone()
                    })
                    .into_owned();
                counts.fixed += n;
            }
        }

        for pattern in &scripts.comment_patterns {
            if let Some(re) = self.user_regex(pattern) {
                let (updated, n) = wrap_in_comments(&text, &re);
                text = updated;
                counts.fixed += n;
            }
        }

        text
    }

    fn user_regex(&self, pattern: &str) -> Option<Regex> {
        RegexBuilder::new(pattern).case_insensitive(true).build().ok()
    }

    /// Warnings for user patterns that fail to compile. Collected once so
    /// the per-file loop can stay quiet about them.
    fn pattern_warnings(&self) -> Vec<String> {
        let scripts = &self.config.scripts;
        scripts
            .placeholder_patterns
            .iter()
            .chain(&scripts.comment_patterns)
            .filter_map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .err()
                    .map(|e| format!("pattern '{p}' rejected: {e}"))
            })
            .collect()
    }
}

/// Wrap every match in an HTML comment, skipping matches that already sit
/// inside one — that is what keeps repeated runs from stacking comments.
fn wrap_in_comments(text: &str, re: &Regex) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut count = 0;
    for m in re.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        let preceded = text[..m.start()].trim_end().ends_with("<!--");
        let followed = text[m.end()..].trim_start().starts_with("-->");
        if preceded && followed {
            out.push_str(m.as_str());
        } else {
            out.push_str("<!-- ");
            out.push_str(m.as_str());
            out.push_str(" -->");
            count += 1;
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    (out, count)
}

/// Split a trailing query string / fragment off a reference.
pub(crate) fn split_suffix(url: &str) -> (&str, &str) {
    match url.find(['?', '#']) {
        Some(pos) => (&url[..pos], &url[pos..]),
        None => (url, ""),
    }
}

fn is_markup(path: &Path) -> bool {
    walk::has_extension(
        path,
        &[".html".to_string(), ".htm".to_string(), ".php".to_string()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteportConfig;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
        config: SiteportConfig,
        map: RenameMap,
        routes_text: String,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tmp: TempDir::new().unwrap(),
                config: SiteportConfig::default(),
                map: RenameMap::new(),
                routes_text: String::new(),
            }
        }

        fn file(&self, rel: &str, content: &str) -> std::path::PathBuf {
            let path = self.tmp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn rewrite(&self, path: &Path) -> (FileCounts, String) {
            let mut routes = RouteTable::default();
            routes.parse_rules(&self.routes_text, self.tmp.path());
            let rewriter = Rewriter::new(self.tmp.path(), &routes, &self.map, &self.config);
            let (counts, _) = rewriter.rewrite_file(path).unwrap();
            (counts, fs::read_to_string(path).unwrap())
        }
    }

    #[test]
    fn route_wins_over_rename_map() {
        let mut fx = Fixture::new();
        fx.file("page123.html", "x");
        fx.file("careers-old.html", "x");
        fx.routes_text = "RewriteRule ^careers$ page123.html\n".to_string();
        fx.map.insert("careers", "careers-old.html");

        let page = fx.file("index.html", r#"<a href="/careers">jobs</a>"#);
        let (counts, text) = fx.rewrite(&page);
        assert!(text.contains(r#"href="page123.html""#));
        assert_eq!(counts.fixed, 1);
        assert_eq!(counts.broken, 0);
    }

    #[test]
    fn static_prefix_stripped_when_nothing_else_matches() {
        let fx = Fixture::new();
        fx.file("css/app.css", "body{}");
        let page = fx.file("index.html", r#"<link href="/css/app.css">"#);

        let (counts, text) = fx.rewrite(&page);
        assert!(text.contains(r#"href="css/app.css""#));
        assert_eq!(counts.fixed, 1);
    }

    #[test]
    fn rooted_reference_follows_rename_map() {
        let mut fx = Fixture::new();
        fx.file("ai-logo.png", "x");
        fx.map.insert("til-logo.png", "ai-logo.png");
        let page = fx.file("index.html", r#"<img src="/til-logo.png">"#);

        let (counts, text) = fx.rewrite(&page);
        assert!(text.contains(r#"src="ai-logo.png""#));
        assert_eq!(counts.fixed, 1);
    }

    #[test]
    fn missing_rooted_reference_counted_broken() {
        let fx = Fixture::new();
        let page = fx.file("index.html", r#"<a href="/nowhere.html">x</a>"#);

        let (counts, text) = fx.rewrite(&page);
        assert_eq!(counts.broken, 1);
        assert_eq!(counts.fixed, 0);
        // Markup untouched - broken is a counter, not an annotation
        assert!(text.contains(r#"href="/nowhere.html""#));
    }

    #[test]
    fn existing_sibling_reference_left_alone() {
        let fx = Fixture::new();
        fx.file("about.html", "x");
        let page = fx.file("index.html", r#"<a href="about.html">x</a>"#);

        let (counts, text) = fx.rewrite(&page);
        assert_eq!(counts, FileCounts::default());
        assert!(text.contains("about.html"));
    }

    #[test]
    fn missing_sibling_reference_counted_broken() {
        let fx = Fixture::new();
        let page = fx.file("sub/page.html", r#"<a href="gone.html">x</a>"#);

        let (counts, _) = fx.rewrite(&page);
        assert_eq!(counts.broken, 1);
    }

    #[test]
    fn query_and_fragment_reattached() {
        let mut fx = Fixture::new();
        fx.file("img.png", "x");
        fx.map.insert("img.PNG", "img.png");
        let page = fx.file("index.html", r#"<img src="img.PNG?t=123#frag">"#);

        let (_, text) = fx.rewrite(&page);
        assert!(text.contains(r#"src="img.png?t=123#frag""#));
    }

    #[test]
    fn ignored_prefixes_skipped() {
        let fx = Fixture::new();
        let page = fx.file(
            "index.html",
            concat!(
                r#"<a href="https://example.com/x">a</a>"#,
                r#"<a href="mailto:hi@example.com">b</a>"#,
                r##"<a href="#top">c</a>"##,
                r#"<a href="../up.html">d</a>"#,
                r#"<script src="//cdn.example/lib.js"></script>"#,
            ),
        );

        let (counts, text) = fx.rewrite(&page);
        assert_eq!(counts, FileCounts::default());
        assert!(text.contains("https://example.com/x"));
        assert!(text.contains("../up.html"));
    }

    #[test]
    fn single_quoted_attributes_rewritten() {
        let fx = Fixture::new();
        fx.file("css/app.css", "x");
        let page = fx.file("index.html", r#"<link href='/css/app.css'>"#);

        let (_, text) = fx.rewrite(&page);
        assert!(text.contains("href='css/app.css'"));
    }

    #[test]
    fn css_url_references_rewritten() {
        let mut fx = Fixture::new();
        fx.map.insert("images/bg.JPG", "images/bg.jpg");
        let sheet = fx.file(
            "css/app.css",
            "body { background: url('images/bg.JPG'); } .x { background: url(images/bg.JPG); }",
        );

        let (counts, text) = fx.rewrite(&sheet);
        assert!(!text.contains("bg.JPG"));
        assert!(text.contains("url('images/bg.jpg')"));
        assert!(text.contains("url(images/bg.jpg)"));
        assert!(counts.fixed >= 2);
    }

    #[test]
    fn rename_map_applied_outside_attributes() {
        let mut fx = Fixture::new();
        fx.map.insert("til-data.js", "ai-data.js");
        let page = fx.file(
            "index.html",
            r#"<script>load("til-data.js");</script>"#,
        );

        let (_, text) = fx.rewrite(&page);
        assert!(text.contains(r#"load("ai-data.js")"#));
    }

    #[test]
    fn longer_keys_substituted_before_their_prefixes() {
        let mut fx = Fixture::new();
        fx.map.insert("img.png", "image.png");
        fx.map.insert("assets/img.png", "assets/picture.png");
        let page = fx.file("data.json", r#"{"a":"assets/img.png"}"#);

        let (_, text) = fx.rewrite(&page);
        assert!(text.contains("assets/picture.png"));
        assert!(!text.contains("image.png"));
    }

    #[test]
    fn script_tags_commented_out_once() {
        let mut fx = Fixture::new();
        fx.config.scripts.comment_out = vec!["tracker.js".to_string()];
        let page = fx.file(
            "index.html",
            r#"<script src="js/tracker.js" async></script>"#,
        );

        let (counts, text) = fx.rewrite(&page);
        assert!(text.contains(r#"<!-- <script src="js/tracker.js" async></script> -->"#));
        assert_eq!(counts.fixed, 1);

        // Second run must not stack another comment
        let (counts2, text2) = fx.rewrite(&page);
        assert_eq!(counts2.fixed, 0);
        assert_eq!(text, text2);
    }

    #[test]
    fn link_rel_tags_commented_out() {
        let mut fx = Fixture::new();
        fx.config.scripts.link_rel_comment_out = vec!["apple-touch-icon".to_string()];
        let page = fx.file(
            "index.html",
            r#"<link rel="apple-touch-icon" href="icon.png">"#,
        );

        let (_, text) = fx.rewrite(&page);
        assert!(text.starts_with("<!-- <link"));
    }

    #[test]
    fn placeholder_patterns_substitute_asset() {
        let mut fx = Fixture::new();
        fx.config.scripts.placeholder_patterns =
            vec![r"https://static\.builder\.example/[a-z0-9/.-]+".to_string()];
        let page = fx.file(
            "index.html",
            r#"<img src="https://static.builder.example/u/photo.jpg">"#,
        );

        let (counts, text) = fx.rewrite(&page);
        assert!(text.contains(r#"src="images/1px.png""#));
        assert_eq!(counts.fixed, 1);
    }

    #[test]
    fn invalid_user_pattern_warned_not_fatal() {
        let mut fx = Fixture::new();
        fx.config.scripts.placeholder_patterns = vec!["(".to_string()];
        fx.file("index.html", "<html></html>");

        let routes = RouteTable::default();
        let rewriter = Rewriter::new(fx.tmp.path(), &routes, &fx.map, &fx.config);
        let report = rewriter.rewrite_tree();
        assert!(report.warnings.iter().any(|w| w.contains("rejected")));
    }

    #[test]
    fn unchanged_file_not_rewritten_on_disk() {
        let fx = Fixture::new();
        fx.file("about.html", "x");
        let page = fx.file("index.html", r#"<a href="about.html">x</a>"#);
        let before = fs::metadata(&page).unwrap().modified().unwrap();

        let routes = RouteTable::default();
        let rewriter = Rewriter::new(fx.tmp.path(), &routes, &fx.map, &fx.config);
        let (_, changed) = rewriter.rewrite_file(&page).unwrap();
        assert!(!changed);
        assert_eq!(fs::metadata(&page).unwrap().modified().unwrap(), before);
    }
}
