//! Specification store
//!
//! Loads documents from a directory tree organized by kind:
//!
//! ```text
//! <root>/units/<name>[.yaml|.yml|.json]
//! <root>/workflows/<name>...
//! <root>/tools/<name>...
//! <root>/models/<name>...
//! ```
//!
//! A bare name is searched in every kind directory (in [`SpecKind::ALL`]
//! order) with each extension in [`EXTENSIONS`] order. A name containing `/`
//! is a path relative to the root. Resolved documents are cached under the
//! name they were requested by.

use crate::cache::{CacheStats, SpecCache};
use crate::document::{SpecDocument, SpecKind};
use crate::error::{SpecError, SpecResult};
use crate::parsers::{default_parsers, ParserRegistry};
use crate::reference::ReferenceResolver;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Extension search order for names given without one
pub const EXTENSIONS: [&str; 4] = ["", ".yaml", ".yml", ".json"];

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory of the specification tree
    pub root: PathBuf,
    /// Maximum number of cached documents
    pub cache_capacity: u64,
    /// Maximum number of nested `$ref` hops
    pub max_ref_depth: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("specs"),
            cache_capacity: 1_000,
            max_ref_depth: 16,
        }
    }
}

impl StoreConfig {
    /// Create configuration rooted at `root`
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// With cache capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// With maximum `$ref` chain length
    #[inline]
    #[must_use]
    pub fn with_max_ref_depth(mut self, depth: usize) -> Self {
        self.max_ref_depth = depth;
        self
    }
}

/// Directory-backed, caching specification store
///
/// Cheap to clone; clones share the cache.
#[derive(Debug, Clone)]
pub struct SpecStore {
    root: PathBuf,
    parsers: Arc<ParserRegistry>,
    cache: SpecCache,
    max_ref_depth: usize,
}

impl SpecStore {
    /// Create store rooted at `root` with default settings
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(&StoreConfig::new(root))
    }

    /// Create store from configuration
    #[must_use]
    pub fn with_config(config: &StoreConfig) -> Self {
        Self {
            root: config.root.clone(),
            parsers: Arc::new(default_parsers()),
            cache: SpecCache::new(config.cache_capacity),
            max_ref_depth: config.max_ref_depth,
        }
    }

    /// Replace the parser registry
    #[inline]
    #[must_use]
    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = Arc::new(parsers);
        self
    }

    /// Store root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load a document by name, resolving every `$ref`
    ///
    /// # Errors
    /// - [`SpecError::NotFound`] if no candidate path exists
    /// - [`SpecError::Parse`] if the file is not valid YAML/JSON
    /// - [`SpecError::CyclicReference`] if `$ref` inclusion loops
    pub fn load(&self, name: &str) -> SpecResult<Arc<SpecDocument>> {
        self.cache.try_get_or_insert_with(name, || {
            let path = self.locate(name)?;
            tracing::debug!(name, path = %path.display(), "loading specification");
            let value = self.read_document(&path)?;
            let value = ReferenceResolver::new(self, self.max_ref_depth)
                .resolve_document(value, Some(&path))?;
            Ok(SpecDocument {
                name: name.to_string(),
                path: Some(path),
                value,
            })
        })
    }

    /// Load a document of a specific kind
    pub fn load_kind(&self, kind: SpecKind, name: &str) -> SpecResult<Arc<SpecDocument>> {
        self.load(&format!("{}/{name}", kind.directory()))
    }

    /// Resolve `$ref`s in a document that did not come from the store
    pub fn resolve_inline(&self, value: Value) -> SpecResult<SpecDocument> {
        let value = ReferenceResolver::new(self, self.max_ref_depth).resolve_document(value, None)?;
        Ok(SpecDocument::inline(value))
    }

    /// Drop the cached entry for `name` and load it again
    pub fn force_reload(&self, name: &str) -> SpecResult<Arc<SpecDocument>> {
        self.cache.invalidate(name);
        self.load(name)
    }

    /// Drop every cached document
    pub fn clear_all(&self) {
        self.cache.invalidate_all();
    }

    /// Check if `name` is currently cached
    #[inline]
    #[must_use]
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains(name)
    }

    /// Cache statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Names of all documents in a kind directory, sorted
    ///
    /// A missing directory lists as empty.
    pub fn list(&self, kind: SpecKind) -> SpecResult<Vec<String>> {
        let dir = self.root.join(kind.directory());
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SpecError::io_error(dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| SpecError::io_error(&dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            let known = match path.extension().and_then(|e| e.to_str()) {
                None => true,
                Some(ext) => EXTENSIONS.iter().any(|candidate| candidate.strip_prefix('.') == Some(ext)),
            };
            if let (true, Some(stem)) = (known, path.file_stem().and_then(|s| s.to_str())) {
                if !stem.starts_with('.') && !names.iter().any(|n| n == stem) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Find the file a name refers to
    pub fn locate(&self, name: &str) -> SpecResult<PathBuf> {
        let candidates = self.candidates(name)?;
        let searched = candidates.len();
        candidates
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| SpecError::NotFound {
                name: name.to_string(),
                searched,
            })
    }

    /// Find a file relative to `base_dir`, trying each extension
    pub(crate) fn locate_relative(&self, base_dir: &Path, target: &str) -> SpecResult<PathBuf> {
        let base = base_dir.join(target);
        let candidates: Vec<_> = EXTENSIONS.iter().map(|ext| with_suffix(&base, ext)).collect();
        let searched = candidates.len();
        let found = candidates
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| SpecError::NotFound {
                name: target.to_string(),
                searched,
            })?;
        self.ensure_within_root(&found)?;
        Ok(found)
    }

    /// Read and parse a single file, without reference resolution
    pub(crate) fn read_document(&self, path: &Path) -> SpecResult<Value> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SpecError::io_error(path, e))?;
        self.parsers.parse(&content, path)
    }

    fn candidates(&self, name: &str) -> SpecResult<Vec<PathBuf>> {
        let relative = Path::new(name);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(SpecError::OutsideRoot {
                path: relative.to_path_buf(),
            });
        }

        let bases: Vec<PathBuf> = if name.contains('/') {
            vec![self.root.join(relative)]
        } else {
            SpecKind::ALL
                .iter()
                .map(|kind| self.root.join(kind.directory()).join(name))
                .collect()
        };

        Ok(bases
            .iter()
            .flat_map(|base| EXTENSIONS.iter().map(move |ext| with_suffix(base, ext)))
            .collect())
    }

    fn ensure_within_root(&self, path: &Path) -> SpecResult<()> {
        let root = self
            .root
            .canonicalize()
            .map_err(|e| SpecError::io_error(&self.root, e))?;
        let path = path
            .canonicalize()
            .map_err(|e| SpecError::io_error(path, e))?;
        if path.starts_with(&root) {
            Ok(())
        } else {
            Err(SpecError::OutsideRoot { path })
        }
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut os = base.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn store() -> (TempDir, SpecStore) {
        let dir = TempDir::new().unwrap();
        let store = SpecStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn load_tries_extensions_in_order() {
        let (dir, store) = store();
        write(dir.path(), "units/writer.yml", "metadata: {name: from-yml}\n");
        write(dir.path(), "units/writer.json", r#"{"metadata": {"name": "from-json"}}"#);

        let doc = store.load("writer").unwrap();
        assert_eq!(doc.declared_name(), Some("from-yml"));
        assert!(doc.path.as_ref().unwrap().ends_with("units/writer.yml"));
    }

    #[test]
    fn load_extensionless_file_wins() {
        let (dir, store) = store();
        write(dir.path(), "units/plain", "metadata: {name: plain}\n");
        write(dir.path(), "units/plain.yaml", "metadata: {name: yaml}\n");

        assert_eq!(store.load("plain").unwrap().declared_name(), Some("plain"));
    }

    #[test]
    fn load_searches_kind_directories() {
        let (dir, store) = store();
        write(dir.path(), "tools/search.yaml", "kind: ToolSpec\n");

        let doc = store.load("search").unwrap();
        assert_eq!(doc.value["kind"], json!("ToolSpec"));
    }

    #[test]
    fn load_kind_restricts_directory() {
        let (dir, store) = store();
        write(dir.path(), "tools/search.yaml", "kind: ToolSpec\n");

        assert!(store.load_kind(SpecKind::ToolSpec, "search").is_ok());
        assert!(store
            .load_kind(SpecKind::UnitSpec, "search")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn load_missing_is_not_found() {
        let (_dir, store) = store();
        let err = store.load("ghost").unwrap_err();
        assert!(matches!(err, SpecError::NotFound { searched: 16, .. }));
    }

    #[test]
    fn load_rejects_parent_traversal() {
        let (_dir, store) = store();
        let err = store.load("../etc/passwd").unwrap_err();
        assert!(matches!(err, SpecError::OutsideRoot { .. }));
    }

    #[test]
    fn cache_keyed_by_request_name() {
        let (dir, store) = store();
        write(dir.path(), "units/a.yaml", "metadata: {name: v1}\n");

        assert_eq!(store.load("a").unwrap().declared_name(), Some("v1"));
        write(dir.path(), "units/a.yaml", "metadata: {name: v2}\n");

        // cached under "a"; another name for the same file reads fresh
        assert_eq!(store.load("a").unwrap().declared_name(), Some("v1"));
        assert_eq!(store.load("units/a").unwrap().declared_name(), Some("v2"));

        assert_eq!(store.force_reload("a").unwrap().declared_name(), Some("v2"));
    }

    #[test]
    fn clear_all_resets_cache() {
        let (dir, store) = store();
        write(dir.path(), "units/a.yaml", "metadata: {name: a}\n");
        write(dir.path(), "units/b.yaml", "metadata: {name: b}\n");
        store.load("a").unwrap();
        store.load("b").unwrap();
        assert!(store.is_cached("a"));

        store.clear_all();
        assert!(!store.is_cached("a"));
        assert!(!store.is_cached("b"));
    }

    #[test]
    fn ref_merges_with_own_fields_winning() {
        let (dir, store) = store();
        write(dir.path(), "units/base.yaml", "a: 1\nb: 2\n");
        write(dir.path(), "units/child.yaml", "$ref: base\nb: 3\nc: 4\n");

        let doc = store.load("child").unwrap();
        assert_eq!(doc.value, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn ref_resolves_in_nested_objects_and_lists() {
        let (dir, store) = store();
        write(dir.path(), "models/fast.yaml", "model: fast-1\ntemperature: 0.2\n");
        write(
            dir.path(),
            "units/leaf.yaml",
            "body:\n  model:\n    $ref: fast\n    temperature: 0.9\n  children:\n    - $ref: fast\n    - plain\n",
        );

        let doc = store.load("leaf").unwrap();
        assert_eq!(
            doc.value,
            json!({"body": {
                "model": {"model": "fast-1", "temperature": 0.9},
                "children": [{"model": "fast-1", "temperature": 0.2}, "plain"],
            }})
        );
    }

    #[test]
    fn ref_chains_resolve_transitively() {
        let (dir, store) = store();
        write(dir.path(), "units/a.yaml", "x: a\ny: a\nz: a\n");
        write(dir.path(), "units/b.yaml", "$ref: a\ny: b\n");
        write(dir.path(), "units/c.yaml", "$ref: b\nz: c\n");

        assert_eq!(store.load("c").unwrap().value, json!({"x": "a", "y": "b", "z": "c"}));
    }

    #[test]
    fn ref_relative_path() {
        let (dir, store) = store();
        write(dir.path(), "units/shared/base.yaml", "from: base\n");
        write(dir.path(), "units/top.yaml", "$ref: ./shared/base\nown: yes\n");

        assert_eq!(
            store.load("top").unwrap().value,
            json!({"from": "base", "own": "yes"})
        );
    }

    #[test]
    fn ref_relative_path_cannot_escape_root() {
        let outer = TempDir::new().unwrap();
        write(outer.path(), "secret.yaml", "token: x\n");
        write(outer.path(), "specs/units/top.yaml", "$ref: ../../secret\n");
        let store = SpecStore::new(outer.path().join("specs"));

        let err = store.load("top").unwrap_err();
        assert!(matches!(err, SpecError::OutsideRoot { .. }));
    }

    #[test]
    fn ref_cycle_detected() {
        let (dir, store) = store();
        write(dir.path(), "units/a.yaml", "$ref: b\n");
        write(dir.path(), "units/b.yaml", "$ref: a\n");

        match store.load("a").unwrap_err() {
            SpecError::CyclicReference { chain } => assert_eq!(chain.len(), 3),
            other => panic!("expected CyclicReference, got {other:?}"),
        }
    }

    #[test]
    fn ref_self_cycle_detected() {
        let (dir, store) = store();
        write(dir.path(), "units/a.yaml", "nested:\n  $ref: a\n");
        assert!(matches!(
            store.load("a").unwrap_err(),
            SpecError::CyclicReference { .. }
        ));
    }

    #[test]
    fn ref_diamond_is_not_a_cycle() {
        let (dir, store) = store();
        write(dir.path(), "units/base.yaml", "v: 1\n");
        write(dir.path(), "units/top.yaml", "left:\n  $ref: base\nright:\n  $ref: base\n");

        assert_eq!(
            store.load("top").unwrap().value,
            json!({"left": {"v": 1}, "right": {"v": 1}})
        );
    }

    #[test]
    fn ref_depth_limit() {
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            write(dir.path(), &format!("units/d{i}.yaml"), &format!("$ref: d{}\n", i + 1));
        }
        write(dir.path(), "units/d5.yaml", "end: true\n");

        let shallow = SpecStore::with_config(&StoreConfig::new(dir.path()).with_max_ref_depth(3));
        assert!(matches!(
            shallow.load("d0").unwrap_err(),
            SpecError::ReferenceDepthExceeded { limit: 3, .. }
        ));

        let deep = SpecStore::new(dir.path());
        assert_eq!(deep.load("d0").unwrap().value, json!({"end": true}));
    }

    #[test]
    fn ref_depth_limit_counts_hops() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "units/d0.yaml", "$ref: d1\n");
        write(dir.path(), "units/d1.yaml", "$ref: d2\n");
        write(dir.path(), "units/d2.yaml", "end: true\n");

        let exact = SpecStore::with_config(&StoreConfig::new(dir.path()).with_max_ref_depth(2));
        assert_eq!(exact.load("d0").unwrap().value, json!({"end": true}));
        assert_eq!(
            exact.resolve_inline(json!({"$ref": "d1"})).unwrap().value,
            json!({"end": true})
        );

        let short = SpecStore::with_config(&StoreConfig::new(dir.path()).with_max_ref_depth(1));
        assert!(matches!(
            short.load("d0").unwrap_err(),
            SpecError::ReferenceDepthExceeded { limit: 1, .. }
        ));
        assert!(matches!(
            short.resolve_inline(json!({"$ref": "d0"})).unwrap_err(),
            SpecError::ReferenceDepthExceeded { limit: 1, .. }
        ));
    }

    #[test]
    fn stats_track_cache_use() {
        let (dir, store) = store();
        write(dir.path(), "units/a.yaml", "v: 1\n");

        store.load("a").unwrap();
        store.load("a").unwrap();
        store.force_reload("a").unwrap();

        let stats = store.stats();
        assert_eq!((stats.hits, stats.misses, stats.entry_count), (1, 2, 1));
    }

    #[test]
    fn ref_to_missing_document() {
        let (dir, store) = store();
        write(dir.path(), "units/a.yaml", "$ref: nowhere\n");
        assert!(store.load("a").unwrap_err().is_not_found());
    }

    #[test]
    fn ref_must_be_string_and_object() {
        let (dir, store) = store();
        write(dir.path(), "units/num.yaml", "$ref: 3\n");
        write(dir.path(), "units/list.yaml", "- 1\n- 2\n");
        write(dir.path(), "units/to-list.yaml", "$ref: list\n");

        assert!(matches!(
            store.load("num").unwrap_err(),
            SpecError::InvalidReference { .. }
        ));
        assert!(matches!(
            store.load("to-list").unwrap_err(),
            SpecError::InvalidReference { .. }
        ));
    }

    #[test]
    fn resolve_inline_uses_store() {
        let (dir, store) = store();
        write(dir.path(), "units/base.yaml", "a: 1\n");

        let doc = store
            .resolve_inline(json!({"$ref": "base", "metadata": {"name": "preview"}}))
            .unwrap();
        assert_eq!(doc.name, "preview");
        assert_eq!(doc.value["a"], json!(1));
    }

    #[test]
    fn list_kind_directory() {
        let (dir, store) = store();
        write(dir.path(), "units/b.yaml", "x: 1\n");
        write(dir.path(), "units/a.json", "{}");
        write(dir.path(), "units/a.yaml", "x: 1\n");
        write(dir.path(), "units/notes.txt", "ignored");

        assert_eq!(store.list(SpecKind::UnitSpec).unwrap(), vec!["a", "b"]);
        assert!(store.list(SpecKind::ModelConfig).unwrap().is_empty());
    }
}
