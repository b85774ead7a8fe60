//! Testing utilities for the compose workspace
//!
//! Temporary specification trees and custom classes for integration tests.

#![allow(missing_docs)]

use async_trait::async_trait;
use compose_engine::classes::{ClassError, ClassSignature, EntrypointSignature, Invocation, UnitClass};
use compose_engine::{CompositionFactory, FactoryConfig, RUN_ENTRYPOINT};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const API_VERSION: &str = "compose.dev/v1";

/// Specification tree in a temporary directory
#[derive(Debug)]
pub struct SpecFixture {
    dir: TempDir,
}

impl SpecFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` at `rel`, creating parent directories
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    /// Write a document as JSON
    pub fn write_json(&self, rel: &str, value: &Value) -> PathBuf {
        self.write(rel, &serde_json::to_string_pretty(value).unwrap())
    }

    /// `units/<name>.json` with `body`
    pub fn unit(&self, name: &str, body: Value) -> PathBuf {
        self.write_json(&format!("units/{name}.json"), &document("UnitSpec", name, body))
    }

    /// `workflows/<name>.json` with `body`
    pub fn workflow(&self, name: &str, body: Value) -> PathBuf {
        self.write_json(&format!("workflows/{name}.json"), &document("WorkflowTemplate", name, body))
    }

    /// Leaf unit with a default model
    pub fn leaf(&self, name: &str, instruction: &str) -> PathBuf {
        self.unit(name, json!({"type": "leaf", "model": "test-model", "instruction": instruction}))
    }

    /// Sequential, parallel or loop unit over `children`
    pub fn composite(&self, name: &str, unit_type: &str, children: &[&str]) -> PathBuf {
        let children: Vec<Value> = children.iter().map(|c| json!({"specRef": c})).collect();
        self.unit(name, json!({"type": unit_type, "children": children}))
    }

    /// `tools/<name>.json`
    pub fn tool(&self, name: &str, description: &str) -> PathBuf {
        self.write_json(
            &format!("tools/{name}.json"),
            &document("ToolSpec", name, json!({"description": description})),
        )
    }

    pub fn config(&self) -> FactoryConfig {
        FactoryConfig::new().with_root(self.root())
    }

    pub fn factory(&self) -> CompositionFactory {
        CompositionFactory::new(self.config()).unwrap()
    }

    pub fn factory_with(&self, config: FactoryConfig) -> CompositionFactory {
        CompositionFactory::new(config.with_root(self.root())).unwrap()
    }
}

impl Default for SpecFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Full document of `kind`
pub fn document(kind: &str, name: &str, body: Value) -> Value {
    json!({
        "apiVersion": API_VERSION,
        "kind": kind,
        "metadata": {"name": name},
        "body": body,
    })
}

/// Conforming class returning its invocation
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoClass;

#[async_trait]
impl UnitClass for EchoClass {
    fn signature(&self) -> ClassSignature {
        ClassSignature::runnable()
    }

    async fn run_async(&self, invocation: Invocation) -> Result<Value, ClassError> {
        Ok(serde_json::to_value(invocation).unwrap())
    }
}

/// Class that never lists the run entrypoint
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEntrypointClass;

impl UnitClass for NoEntrypointClass {}

/// Class whose run entrypoint is blocking
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockingClass;

impl UnitClass for BlockingClass {
    fn signature(&self) -> ClassSignature {
        ClassSignature::default()
            .with_entrypoint(EntrypointSignature::blocking(RUN_ENTRYPOINT, &["invocation"]))
    }
}
