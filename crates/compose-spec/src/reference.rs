//! `$ref` inclusion
//!
//! An object carrying `$ref: <name-or-path>` is replaced by the referenced
//! document with the object's own remaining fields laid over its top level
//! (own fields win). Resolution recurses into nested objects and arrays and
//! into the referenced documents themselves.
//!
//! The chain of documents currently being resolved is tracked so a `$ref`
//! loop fails with [`SpecError::CyclicReference`] instead of recursing
//! forever. Diamond-shaped inclusion (two siblings referencing one base) is
//! not a cycle.

use crate::error::{SpecError, SpecResult};
use crate::store::SpecStore;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Reserved key for inclusion directives
pub const REF_KEY: &str = "$ref";

/// Resolves `$ref` directives against a [`SpecStore`]
#[derive(Debug)]
pub(crate) struct ReferenceResolver<'a> {
    store: &'a SpecStore,
    limit: usize,
    chain: Vec<PathBuf>,
    hops: usize,
}

impl<'a> ReferenceResolver<'a> {
    pub(crate) fn new(store: &'a SpecStore, limit: usize) -> Self {
        Self {
            store,
            limit,
            chain: Vec::new(),
            hops: 0,
        }
    }

    /// Resolve every `$ref` inside a document loaded from `origin`
    ///
    /// Inline documents pass `None` and resolve names against the store root.
    pub(crate) fn resolve_document(
        mut self,
        value: Value,
        origin: Option<&Path>,
    ) -> SpecResult<Value> {
        if let Some(origin) = origin {
            self.chain.push(identity(origin));
        }
        let base_dir = origin
            .and_then(Path::parent)
            .map_or_else(|| self.store.root().to_path_buf(), Path::to_path_buf);
        self.resolve(value, &base_dir, origin)
    }

    fn resolve(&mut self, value: Value, base_dir: &Path, origin: Option<&Path>) -> SpecResult<Value> {
        match value {
            Value::Object(map) => self.resolve_object(map, base_dir, origin),
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.resolve(item, base_dir, origin))
                .collect::<SpecResult<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other),
        }
    }

    fn resolve_object(
        &mut self,
        mut map: Map<String, Value>,
        base_dir: &Path,
        origin: Option<&Path>,
    ) -> SpecResult<Value> {
        let merged = match map.remove(REF_KEY) {
            Some(target) => {
                let referencing = origin.unwrap_or(base_dir);
                let Some(target) = target.as_str() else {
                    return Err(SpecError::invalid_reference(
                        referencing,
                        format!("'{REF_KEY}' must be a string"),
                    ));
                };
                let base = self.include(target, base_dir, referencing)?;
                overlay(base, map)
            }
            None => map,
        };

        let mut resolved = Map::with_capacity(merged.len());
        for (key, value) in merged {
            resolved.insert(key, self.resolve(value, base_dir, origin)?);
        }
        Ok(Value::Object(resolved))
    }

    /// Load and fully resolve the document `target` refers to
    fn include(
        &mut self,
        target: &str,
        base_dir: &Path,
        referencing: &Path,
    ) -> SpecResult<Map<String, Value>> {
        let path = if target.starts_with("./") || target.starts_with("../") {
            self.store.locate_relative(base_dir, target)?
        } else {
            self.store.locate(target)?
        };

        let id = identity(&path);
        if self.chain.contains(&id) {
            let mut chain = self.chain.clone();
            chain.push(id);
            return Err(SpecError::CyclicReference { chain });
        }
        if self.hops >= self.limit {
            return Err(SpecError::ReferenceDepthExceeded {
                path: referencing.to_path_buf(),
                limit: self.limit,
            });
        }

        tracing::debug!(target, path = %path.display(), "resolving reference");
        let document = self.store.read_document(&path)?;

        self.chain.push(id);
        self.hops += 1;
        let ref_dir = path.parent().unwrap_or(base_dir).to_path_buf();
        let resolved = self.resolve(document, &ref_dir, Some(&path));
        self.hops -= 1;
        self.chain.pop();

        match resolved? {
            Value::Object(map) => Ok(map),
            _ => Err(SpecError::invalid_reference(
                referencing,
                format!("'{target}' does not resolve to an object"),
            )),
        }
    }
}

/// Stable identity for cycle detection
fn identity(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Overlay `own` onto `base`, own fields winning
///
/// The same top-level merge `$ref` resolution applies, usable on in-memory
/// trees.
#[must_use]
pub fn merge_over(base: &Value, own: &Value) -> Value {
    match (base, own) {
        (Value::Object(base), Value::Object(own)) => {
            let mut own = own.clone();
            own.remove(REF_KEY);
            Value::Object(overlay(base.clone(), own))
        }
        (_, own) => own.clone(),
    }
}

fn overlay(mut base: Map<String, Value>, own: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in own {
        base.insert(key, value);
    }
    base
}
