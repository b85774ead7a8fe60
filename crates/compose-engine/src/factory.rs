//! Composition factory
//!
//! One build call walks `Loaded → Validated → Dispatched → ChildrenBuilt →
//! Constructed`. Any failure aborts the whole call; no partial unit is
//! returned.

use crate::body::UnitBody;
use crate::builders::{register_dynamic_class, BuildServices, BuilderRegistry, UnitBuilder};
use crate::classes::{ClassDefinitionLoader, ClassRegistry, DeclarativeClassLoader, UnitClass};
use crate::config::{BuildConfig, FactoryConfig};
use crate::context::BuildContext;
use crate::error::{BuildError, BuildResult};
use crate::tools::{
    ImportResolver, ImportToolLoader, InlineToolLoader, ModuleTable, RegistryToolLoader,
    SpecToolCatalog, ToolCatalog, ToolLoader, ToolLoaderRegistry,
};
use crate::unit::ExecutionUnit;
use compose_spec::{
    unit_types, SpecDocument, SpecKind, SpecStore, SpecValidator, Specification,
    ValidationReport,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Builds execution unit trees from specifications
pub struct CompositionFactory {
    store: SpecStore,
    validator: SpecValidator,
    builders: Arc<BuilderRegistry>,
    classes: Arc<ClassRegistry>,
    tools: ToolLoaderRegistry,
    class_loader: Option<Arc<dyn ClassDefinitionLoader>>,
    config: FactoryConfig,
}

impl CompositionFactory {
    /// Create factory from configuration with the built-in builders
    pub fn new(config: FactoryConfig) -> BuildResult<Self> {
        FactoryBuilder::new(config).build()
    }

    /// Start configuring a factory
    #[inline]
    #[must_use]
    pub fn builder(config: FactoryConfig) -> FactoryBuilder {
        FactoryBuilder::new(config)
    }

    /// Build the unit named `name`
    pub fn build(&self, name: &str, ctx: &BuildContext) -> BuildResult<ExecutionUnit> {
        let span = tracing::info_span!("build", unit = name, depth = ctx.depth());
        let _guard = span.enter();

        let limit = self.config.build.max_depth;
        if ctx.depth() >= limit {
            return Err(BuildError::DepthExceeded {
                unit: name.to_string(),
                limit,
            });
        }

        let document = self.store.load(name)?;
        tracing::debug!(path = ?document.path, "loaded");
        self.build_document(&document, ctx)
    }

    /// Build from a specification the caller already holds
    ///
    /// `$ref`s inside `spec` are still resolved against the store.
    pub fn build_from_inline_spec(&self, spec: Value, ctx: &BuildContext) -> BuildResult<ExecutionUnit> {
        let document = self.store.resolve_inline(spec)?;
        let span = tracing::info_span!("build", unit = %document.name, depth = ctx.depth(), inline = true);
        let _guard = span.enter();
        self.build_document(&document, ctx)
    }

    /// Load and validate `name` without building it
    pub fn validate(&self, name: &str) -> BuildResult<ValidationReport> {
        let document = self.store.load(name)?;
        Ok(self.validator.validate(&document)?)
    }

    /// Registered unit type tags
    #[must_use]
    pub fn list_supported_types(&self) -> Vec<&str> {
        self.builders.types()
    }

    /// Register a custom class
    ///
    /// Fails when the class does not implement the run contract.
    pub fn register_custom_unit(&self, name: impl Into<String>, class: Arc<dyn UnitClass>) -> BuildResult<()> {
        self.classes.register(name, class)
    }

    /// Spec store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &SpecStore {
        &self.store
    }

    /// Custom class registry
    #[inline]
    #[must_use]
    pub fn class_registry(&self) -> &ClassRegistry {
        &self.classes
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    fn build_document(&self, document: &SpecDocument, ctx: &BuildContext) -> BuildResult<ExecutionUnit> {
        let spec = self.validator.validate(document)?.specification;
        tracing::debug!(unit_type = ?spec.unit_type(), "validated");

        if !spec.kind().is_composable() {
            return Err(BuildError::specification(
                spec.name(),
                format!("{} documents cannot be composed", spec.kind()),
            ));
        }

        let id = self.document_key(document, &spec);
        if ctx.is_building(&id) {
            let mut chain = ctx.lineage().to_vec();
            chain.push(id);
            return Err(BuildError::CyclicBuild { chain });
        }

        let builder = self.dispatch(&spec)?;
        builder.validate_spec(&spec)?;
        tracing::debug!("dispatched");

        let unit = builder.build(&spec, &ctx.enter(id), self)?.normalized();
        tracing::info!(unit = unit.name(), unit_type = unit.type_tag(), size = unit.size(), "built");
        Ok(unit)
    }

    /// Identity of `document` within one build tree
    ///
    /// Stored documents are keyed by their file under the store root, so two
    /// files declaring the same name stay distinct. Inline documents fall
    /// back to their normalized name.
    fn document_key(&self, document: &SpecDocument, spec: &Specification) -> String {
        let Some(path) = document.path.as_deref() else {
            return spec.normalized_name();
        };
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let root = self.store.root();
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        path.strip_prefix(&root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn dispatch(&self, spec: &Specification) -> BuildResult<&Arc<dyn UnitBuilder>> {
        let unit_type = spec.unit_type().unwrap_or_default();
        self.builders.get(unit_type).ok_or_else(|| {
            BuildError::specification(
                spec.name(),
                format!("unsupported unit type '{unit_type}'"),
            )
        })
    }

    /// Register every class defined in `units/` specifications
    fn discover_classes(&self) -> BuildResult<usize> {
        let mut registered = 0;
        for name in self.store.list(SpecKind::UnitSpec)? {
            let discovered = self
                .store
                .load_kind(SpecKind::UnitSpec, &name)
                .map_err(BuildError::from)
                .and_then(|document| self.register_defined_class(&document));
            match discovered {
                Ok(true) => registered += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(spec = %name, error = %e, "class discovery skipped specification"),
            }
        }
        Ok(registered)
    }

    fn register_defined_class(&self, document: &SpecDocument) -> BuildResult<bool> {
        let defines_class = document.get_path("body.type").and_then(Value::as_str) == Some(unit_types::CUSTOM)
            && document.get_path("body.implementation.class_definition").is_some();
        if !defines_class {
            return Ok(false);
        }
        let spec = self.validator.validate(document)?.specification;
        let body = UnitBody::from_spec(&spec)?;
        register_dynamic_class(&spec, &body, self)?;
        Ok(true)
    }
}

impl BuildServices for CompositionFactory {
    fn build_child(&self, spec_ref: &str, ctx: &BuildContext) -> BuildResult<ExecutionUnit> {
        self.build(spec_ref, ctx)
    }

    fn tools(&self) -> &ToolLoaderRegistry {
        &self.tools
    }

    fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    fn class_loader(&self) -> Option<&dyn ClassDefinitionLoader> {
        self.class_loader.as_deref()
    }

    fn build_config(&self) -> &BuildConfig {
        &self.config.build
    }
}

impl fmt::Debug for CompositionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionFactory")
            .field("root", &self.store.root())
            .field("types", &self.builders.types())
            .field("classes", &self.classes)
            .field("tools", &self.tools)
            .field("dynamic_classes", &self.class_loader.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`CompositionFactory`]
pub struct FactoryBuilder {
    config: FactoryConfig,
    store: Option<SpecStore>,
    builders: BuilderRegistry,
    classes: Vec<(String, Arc<dyn UnitClass>)>,
    catalog: Option<Arc<dyn ToolCatalog>>,
    import_resolver: Option<Arc<dyn ImportResolver>>,
    extra_loaders: Vec<Arc<dyn ToolLoader>>,
    class_loader: Option<Arc<dyn ClassDefinitionLoader>>,
}

impl FactoryBuilder {
    /// Start from configuration with the built-in builders
    #[must_use]
    pub fn new(config: FactoryConfig) -> Self {
        Self {
            config,
            store: None,
            builders: BuilderRegistry::with_defaults(),
            classes: Vec::new(),
            catalog: None,
            import_resolver: None,
            extra_loaders: Vec::new(),
            class_loader: None,
        }
    }

    /// With an existing store instead of one built from `config.store`
    #[must_use]
    pub fn with_store(mut self, store: SpecStore) -> Self {
        self.store = Some(store);
        self
    }

    /// With a replacement builder registry
    #[must_use]
    pub fn with_builders(mut self, builders: BuilderRegistry) -> Self {
        self.builders = builders;
        self
    }

    /// With an additional builder, registered under every tag it reports
    #[must_use]
    pub fn with_builder(mut self, builder: Arc<dyn UnitBuilder>) -> Self {
        self.builders.register_builder(builder);
        self
    }

    /// With a custom class registered at build time
    #[must_use]
    pub fn with_class(mut self, name: impl Into<String>, class: Arc<dyn UnitClass>) -> Self {
        self.classes.push((name.into(), class));
        self
    }

    /// With the catalog behind `registry` tools
    #[must_use]
    pub fn with_tool_catalog(mut self, catalog: Arc<dyn ToolCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// With the resolver behind `import` tools
    #[must_use]
    pub fn with_import_resolver(mut self, resolver: Arc<dyn ImportResolver>) -> Self {
        self.import_resolver = Some(resolver);
        self
    }

    /// With a tool loader replacing the built-in one for its source
    #[must_use]
    pub fn with_tool_loader(mut self, loader: Arc<dyn ToolLoader>) -> Self {
        self.extra_loaders.push(loader);
        self
    }

    /// With the loader for dynamic class definitions
    ///
    /// Only used when `security.allow_dynamic_classes` is set.
    #[must_use]
    pub fn with_class_loader(mut self, loader: Arc<dyn ClassDefinitionLoader>) -> Self {
        self.class_loader = Some(loader);
        self
    }

    /// Assemble the factory
    ///
    /// Registers the programmatic classes, then, when dynamic classes are
    /// enabled, every class defined under `units/`.
    pub fn build(self) -> BuildResult<CompositionFactory> {
        let store = self
            .store
            .unwrap_or_else(|| SpecStore::with_config(&self.config.store));
        let validator = SpecValidator::with_config(self.config.validator.clone());

        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(SpecToolCatalog::new(store.clone(), validator.clone())));
        let resolver = self
            .import_resolver
            .unwrap_or_else(|| Arc::new(ModuleTable::new()));
        let mut tools = ToolLoaderRegistry::new();
        tools.register(Arc::new(RegistryToolLoader::new(catalog)));
        tools.register(Arc::new(InlineToolLoader::new(self.config.security.allow_inline_tools)));
        tools.register(Arc::new(ImportToolLoader::new(resolver)));
        for loader in self.extra_loaders {
            tools.register(loader);
        }

        let class_loader = self.config.security.allow_dynamic_classes.then(|| {
            self.class_loader
                .unwrap_or_else(|| Arc::new(DeclarativeClassLoader::new()))
        });

        let classes = Arc::new(ClassRegistry::new());
        for (name, class) in self.classes {
            classes.register(name, class)?;
        }

        let factory = CompositionFactory {
            store,
            validator,
            builders: Arc::new(self.builders),
            classes,
            tools,
            class_loader,
            config: self.config,
        };

        if factory.class_loader.is_some() {
            let found = factory.discover_classes()?;
            tracing::info!(classes = found, "dynamic class discovery finished");
        }
        tracing::debug!(types = ?factory.list_supported_types(), root = %factory.store.root().display(), "factory ready");
        Ok(factory)
    }
}

impl fmt::Debug for FactoryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryBuilder")
            .field("config", &self.config)
            .field("builders", &self.builders)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;
    use std::path::Path;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn leaf(name: &str) -> String {
        format!(
            "apiVersion: compose.dev/v1\nkind: UnitSpec\nmetadata: {{name: {name}}}\nbody: {{type: leaf, model: m, instruction: do {name}}}\n"
        )
    }

    fn factory(root: &Path) -> CompositionFactory {
        CompositionFactory::new(FactoryConfig::new().with_root(root)).unwrap()
    }

    #[test]
    fn builds_and_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "units/my-agent.yaml", &leaf("my-agent"));

        let unit = factory(dir.path()).build("my-agent", &BuildContext::new()).unwrap();
        assert_eq!(unit.name(), "my_agent");
        assert_eq!(unit.type_tag(), "leaf");
    }

    #[test]
    fn supported_types() {
        let dir = tempfile::tempdir().unwrap();
        let types = factory(dir.path()).list_supported_types().join(",");
        assert_eq!(types, "leaf,llm,sequential,parallel,loop,custom");
    }

    #[test]
    fn missing_spec_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = factory(dir.path()).build("ghost", &BuildContext::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn unsupported_type() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "units/odd.yaml",
            "apiVersion: compose.dev/v1\nkind: UnitSpec\nmetadata: {name: odd}\nbody: {type: agent}\n",
        );
        let err = factory(dir.path()).build("odd", &BuildContext::new()).unwrap_err();
        assert!(err.to_string().contains("unsupported unit type 'agent'"));
    }

    #[test]
    fn tool_specs_cannot_be_composed() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "tools/search.yaml",
            "apiVersion: compose.dev/v1\nkind: ToolSpec\nmetadata: {name: search}\nbody: {description: find}\n",
        );
        let err = factory(dir.path()).build("search", &BuildContext::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Specification);
    }

    #[test]
    fn cycles_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "workflows/a.yaml",
            "apiVersion: compose.dev/v1\nkind: WorkflowTemplate\nmetadata: {name: a}\nbody: {type: sequential, children: [b]}\n",
        );
        write(
            dir.path(),
            "workflows/b.yaml",
            "apiVersion: compose.dev/v1\nkind: WorkflowTemplate\nmetadata: {name: b}\nbody: {type: sequential, children: [a]}\n",
        );

        let err = factory(dir.path()).build("a", &BuildContext::new()).unwrap_err();
        match err.root_cause() {
            BuildError::CyclicBuild { chain } => {
                assert_eq!(chain, &["workflows/a.yaml", "workflows/b.yaml", "workflows/a.yaml"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        assert_eq!(err.unit_path(), vec!["a", "b"]);
    }

    #[test]
    fn shared_names_across_files_are_not_cycles() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "workflows/review.yaml",
            "apiVersion: compose.dev/v1\nkind: WorkflowTemplate\nmetadata: {name: review}\nbody: {type: sequential, children: [units/review]}\n",
        );
        write(dir.path(), "units/review.yaml", &leaf("review"));
        write(dir.path(), "units/a-b.yaml", &leaf("a-b"));
        write(
            dir.path(),
            "units/a.b.yaml",
            "apiVersion: compose.dev/v1\nkind: UnitSpec\nmetadata: {name: a.b}\nbody: {type: parallel, children: [a-b]}\n",
        );

        let factory = factory(dir.path());
        let unit = factory.build("workflows/review", &BuildContext::new()).unwrap();
        assert_eq!(unit.name(), "review");
        assert_eq!(unit.children()[0].type_tag(), "leaf");

        let unit = factory.build("a.b", &BuildContext::new()).unwrap();
        assert_eq!(unit.name(), "a_b");
        assert_eq!(unit.children()[0].name(), "a_b");
    }

    #[test]
    fn inherited_metadata_is_not_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "units/base.yaml", &leaf("base"));
        write(
            dir.path(),
            "workflows/base-flow.yaml",
            "$ref: ../units/base\nkind: WorkflowTemplate\nbody: {type: sequential, children: [units/base]}\n",
        );

        let unit = factory(dir.path()).build("base-flow", &BuildContext::new()).unwrap();
        assert_eq!(unit.name(), "base");
        assert_eq!(unit.children().len(), 1);
    }

    #[test]
    fn depth_limit() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "workflows/outer.yaml",
            "apiVersion: compose.dev/v1\nkind: WorkflowTemplate\nmetadata: {name: outer}\nbody: {type: sequential, children: [inner]}\n",
        );
        write(
            dir.path(),
            "workflows/inner.yaml",
            "apiVersion: compose.dev/v1\nkind: WorkflowTemplate\nmetadata: {name: inner}\nbody: {type: sequential, children: [leaf-x]}\n",
        );
        write(dir.path(), "units/leaf-x.yaml", &leaf("leaf-x"));

        let shallow = CompositionFactory::new(FactoryConfig::new().with_root(dir.path()).with_max_depth(2)).unwrap();
        let err = shallow.build("outer", &BuildContext::new()).unwrap_err();
        assert!(matches!(err.root_cause(), BuildError::DepthExceeded { limit: 2, .. }));

        assert_eq!(factory(dir.path()).build("outer", &BuildContext::new()).unwrap().size(), 3);
    }

    #[test]
    fn inline_spec() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "units/helper.yaml", &leaf("helper"));

        let unit = factory(dir.path())
            .build_from_inline_spec(
                serde_json::json!({
                    "apiVersion": "compose.dev/v1",
                    "kind": "WorkflowTemplate",
                    "metadata": {"name": "preview-flow"},
                    "body": {"type": "parallel", "children": ["helper"]},
                }),
                &BuildContext::new(),
            )
            .unwrap();
        assert_eq!(unit.name(), "preview_flow");
        assert_eq!(unit.children()[0].name(), "helper");
    }
}
