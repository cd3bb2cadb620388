//! The rename map: a closed old→new mapping of project-relative paths.
//!
//! Every stage that renames or removes a file records the change here, and
//! every stage that rewrites text resolves references through it. The map
//! maintains two guarantees so that resolution is always a single lookup:
//!
//! - **No self-entries**: a key never maps to itself.
//! - **Closure**: inserting `b → c` when some `a → b` already exists rewrites
//!   the earlier entry to `a → c`. Chasing chains at lookup time is never
//!   needed; `resolve(resolve(x)) == resolve(x)` holds after any insert
//!   sequence.
//!
//! Keys use forward slashes. When a path contains a slash, a backslash
//! mirror of the entry is stored as well, so Windows-style references that
//! survive in exported markup still resolve.
//!
//! The map serializes to deterministic sorted-key JSON for the per-run
//! rename-map artifact.

use std::collections::BTreeMap;

/// Closed old→new relative-path mapping.
#[derive(Debug, Clone, Default)]
pub struct RenameMap {
    entries: BTreeMap<String, String>,
}

impl RenameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rename. No-op when `old == new`.
    ///
    /// Keeps the map closed: the stored value is fully resolved through any
    /// existing entries, and existing values equal to `old` are rewritten to
    /// the new final value. A backslash mirror is stored when the key itself
    /// carries a slash; a bare key has no distinct mirror form and must keep
    /// its forward-slash value.
    pub fn insert(&mut self, old: &str, new: &str) {
        self.insert_one(old, new);
        if old.contains('/') {
            self.insert_one(&old.replace('/', "\\"), &new.replace('/', "\\"));
        }
    }

    fn insert_one(&mut self, old: &str, new: &str) {
        if old == new || old.is_empty() {
            return;
        }

        // The map is closed, so one hop fully resolves the new value.
        let target = match self.entries.get(new) {
            Some(resolved) => resolved.clone(),
            None => new.to_string(),
        };
        if target == old {
            // Inserting the inverse of an existing chain; the rename cancels
            // out and keeping either entry would create a cycle.
            self.entries.remove(new);
            return;
        }
        self.entries.insert(old.to_string(), target.clone());

        // Re-close: anything that previously resolved to `old` now resolves
        // to the final target.
        for value in self.entries.values_mut() {
            if value == old {
                *value = target.clone();
            }
        }
        self.entries.retain(|k, v| k != v);
    }

    /// Resolve a path through the map; unknown paths come back unchanged.
    pub fn resolve<'a>(&'a self, path: &'a str) -> &'a str {
        match self.entries.get(path) {
            Some(new) => new.as_str(),
            None => path,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keys sorted longest-first, for whole-text substitution where longer
    /// paths must win over their own prefixes.
    pub fn keys_longest_first(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(|k| k.as_str()).collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        keys
    }

    /// Sorted, stable-keyed JSON snapshot for the run artifact.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }
}
