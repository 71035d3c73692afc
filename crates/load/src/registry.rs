//! Builder registries, where constructor ids are resolved to factories.
//!
//! The [`BuilderRegistry`] is assembled once at startup and is read-only
//! afterwards. The [`OptionalBuilderRegistry`] holds pluggable namespaces
//! that a caller injects per load, possibly as lazily-resolved modules.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{BuildError, ModuleLoadError};
use crate::keys::AliasTable;
use crate::node::NAMESPACE_DELIMITER;
use crate::serializable::{unique_name, Buildable, Serializable, TypeDecl};
use crate::value::Kwargs;

/// Root package every built-in namespace lives under.
pub const DEFAULT_ROOT: &str = "langchain";

/// Namespaces recognized as pluggable even before anything is injected for them.
pub const DEFAULT_OPTIONAL_ENTRYPOINTS: &[&str] = &[
    "langchain/llms/cohere",
    "langchain/llms/hf",
    "langchain/llms/replicate",
    "langchain/embeddings/cohere",
    "langchain/vectorstores/pinecone",
    "langchain/vectorstores/qdrant",
    "langchain/cache/redis",
    "langchain/stores/message/redis",
];

type BuildFn = dyn Fn(Kwargs) -> Result<Arc<dyn Serializable>, BuildError> + Send + Sync;

/// A factory that turns transcoded kwargs into a component instance.
#[derive(Clone)]
pub struct Builder {
    name: String,
    ancestry: &'static [TypeDecl],
    construct: Arc<BuildFn>,
}

impl Builder {
    pub fn new<F>(name: impl Into<String>, ancestry: &'static [TypeDecl], construct: F) -> Self
    where
        F: Fn(Kwargs) -> Result<Arc<dyn Serializable>, BuildError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            ancestry,
            construct: Arc::new(construct),
        }
    }

    /// A builder for a [`Buildable`] type, exported under the type's given name.
    pub fn of<T: Buildable>() -> Self {
        let name = T::ANCESTRY.first().map(|decl| decl.name).unwrap_or_default();
        Self::new(name, T::ANCESTRY, |kwargs| {
            T::build(kwargs).map(|object| Arc::new(object) as Arc<dyn Serializable>)
        })
    }

    /// The name this builder is exported under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The constructed type's own unique name, independent of the export name.
    pub fn unique_name(&self) -> &'static str {
        unique_name(self.ancestry)
    }

    pub fn ancestry(&self) -> &'static [TypeDecl] {
        self.ancestry
    }

    pub fn alias_table(&self) -> AliasTable {
        AliasTable::from_ancestry(self.ancestry)
    }

    pub fn build(&self, kwargs: Kwargs) -> Result<Arc<dyn Serializable>, BuildError> {
        (self.construct)(kwargs)
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("name", &self.name)
            .field("unique_name", &self.unique_name())
            .finish()
    }
}

/// One named export of a module.
#[derive(Debug, Clone)]
pub enum Export {
    Builder(Builder),
    /// A non-invocable export; resolving to it is an error.
    Constant(Value),
}

/// A set of named exports addressed by one namespace.
#[derive(Debug, Clone, Default)]
pub struct Module {
    exports: BTreeMap<String, Export>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export a builder under its own name.
    pub fn with_builder(mut self, builder: Builder) -> Self {
        self.exports
            .insert(builder.name().to_string(), Export::Builder(builder));
        self
    }

    pub fn with_export(mut self, name: impl Into<String>, export: Export) -> Self {
        self.exports.insert(name.into(), export);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Export> {
        self.exports.get(name)
    }

    pub fn builders(&self) -> impl Iterator<Item = &Builder> {
        self.exports.values().filter_map(|export| match export {
            Export::Builder(builder) => Some(builder),
            Export::Constant(_) => None,
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.exports.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}

/// Process-wide mapping root → namespace → module.
///
/// Namespaces are stored without their root segment and joined with `/`,
/// e.g. `llms/openai` under root `langchain`.
#[derive(Debug, Clone, Default)]
pub struct BuilderRegistry {
    roots: BTreeMap<String, BTreeMap<String, Arc<Module>>>,
}

impl BuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Replaces any module already at that namespace.
    pub fn register(&mut self, root: &str, namespace: &str, module: Module) {
        debug!(root, namespace, exports = module.len(), "Registered module");
        self.roots
            .entry(root.to_string())
            .or_default()
            .insert(namespace.to_string(), Arc::new(module));
    }

    pub fn with_module(mut self, root: &str, namespace: &str, module: Module) -> Self {
        self.register(root, namespace, module);
        self
    }

    /// The namespace table under one root.
    pub fn root(&self, root: &str) -> Option<&BTreeMap<String, Arc<Module>>> {
        self.roots.get(root)
    }

    pub fn get(&self, root: &str, namespace: &str) -> Option<Arc<Module>> {
        self.roots.get(root)?.get(namespace).cloned()
    }

    /// All registered `root/namespace` keys.
    pub fn list(&self) -> Vec<String> {
        self.roots
            .iter()
            .flat_map(|(root, table)| {
                table
                    .keys()
                    .map(move |ns| format!("{root}{NAMESPACE_DELIMITER}{ns}"))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.roots.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves a pluggable module on first use.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<Module>, ModuleLoadError>;
}

/// Memoizes a loader: the first successful load is reused, failures are retried.
pub struct CachedLoader<L> {
    inner: L,
    cell: OnceCell<Arc<Module>>,
}

impl<L: ModuleLoader> CachedLoader<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cell: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

#[async_trait]
impl<L: ModuleLoader> ModuleLoader for CachedLoader<L> {
    async fn load(&self) -> Result<Arc<Module>, ModuleLoadError> {
        self.cell
            .get_or_try_init(|| self.inner.load())
            .await
            .map(Arc::clone)
    }
}

/// An entry in the optional registry.
#[derive(Clone)]
pub enum OptionalModule {
    Ready(Arc<Module>),
    Lazy(Arc<dyn ModuleLoader>),
}

impl OptionalModule {
    pub async fn resolve(&self) -> Result<Arc<Module>, ModuleLoadError> {
        match self {
            OptionalModule::Ready(module) => Ok(Arc::clone(module)),
            OptionalModule::Lazy(loader) => loader.load().await,
        }
    }
}

impl fmt::Debug for OptionalModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionalModule::Ready(module) => f.debug_tuple("Ready").field(&module.names()).finish(),
            OptionalModule::Lazy(_) => f.write_str("Lazy"),
        }
    }
}

/// Pluggable namespaces, keyed by their full `/`-joined namespace.
#[derive(Debug, Clone)]
pub struct OptionalBuilderRegistry {
    modules: HashMap<String, OptionalModule>,
    entrypoints: BTreeSet<String>,
    root_aliases: BTreeMap<String, String>,
}

impl Default for OptionalBuilderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionalBuilderRegistry {
    /// An empty registry that recognizes the default entrypoints and the
    /// `langchain_community` → `langchain` root alias.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.entrypoints = DEFAULT_OPTIONAL_ENTRYPOINTS
            .iter()
            .map(|s| s.to_string())
            .collect();
        registry
            .root_aliases
            .insert("langchain_community".into(), DEFAULT_ROOT.into());
        registry
    }

    /// No entrypoints, no aliases, no modules.
    pub fn empty() -> Self {
        Self {
            modules: HashMap::new(),
            entrypoints: BTreeSet::new(),
            root_aliases: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, namespace: impl Into<String>, module: OptionalModule) {
        self.modules.insert(namespace.into(), module);
    }

    pub fn with_module(mut self, namespace: impl Into<String>, module: Module) -> Self {
        self.insert(namespace, OptionalModule::Ready(Arc::new(module)));
        self
    }

    pub fn with_loader(mut self, namespace: impl Into<String>, loader: Arc<dyn ModuleLoader>) -> Self {
        self.insert(namespace, OptionalModule::Lazy(loader));
        self
    }

    pub fn add_entrypoint(&mut self, namespace: impl Into<String>) {
        self.entrypoints.insert(namespace.into());
    }

    /// Also try `to/...` when looking up a namespace rooted at `from`.
    pub fn alias_root(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.root_aliases.insert(from.into(), to.into());
    }

    pub fn is_pluggable(&self, namespace: &str) -> bool {
        self.entrypoints.contains(namespace)
    }

    pub fn get(&self, namespace: &str) -> Option<&OptionalModule> {
        self.modules.get(namespace)
    }

    pub fn entrypoints(&self) -> impl Iterator<Item = &str> {
        self.entrypoints.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Keys under which `namespace` may have been injected: the namespace
    /// itself, then its root-aliased form.
    pub(crate) fn candidates(&self, namespace: &[String]) -> Vec<String> {
        let mut keys = vec![namespace.join(NAMESPACE_DELIMITER)];
        if let Some((root, rest)) = namespace.split_first() {
            if let Some(alias) = self.root_aliases.get(root) {
                let mut aliased = vec![alias.clone()];
                aliased.extend(rest.iter().cloned());
                keys.push(aliased.join(NAMESPACE_DELIMITER));
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::Echo;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        calls: Arc<AtomicUsize>,
        fail_first: bool,
    }

    #[async_trait]
    impl ModuleLoader for CountingLoader {
        async fn load(&self) -> Result<Arc<Module>, ModuleLoadError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(ModuleLoadError("transient".into()));
            }
            Ok(Arc::new(Module::new().with_builder(Builder::of::<Echo>())))
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = BuilderRegistry::new();
        assert!(registry.is_empty());
        registry.register(DEFAULT_ROOT, "llms/openai", Module::new().with_builder(Builder::of::<Echo>()));

        assert_eq!(registry.len(), 1);
        assert!(registry.get(DEFAULT_ROOT, "llms/openai").is_some());
        assert!(registry.get(DEFAULT_ROOT, "llms").is_none());
        assert!(registry.get("other", "llms/openai").is_none());
        assert_eq!(registry.list(), vec!["langchain/llms/openai"]);
    }

    #[test]
    fn module_exports_builders_and_constants() {
        let module = Module::new()
            .with_builder(Builder::of::<Echo>())
            .with_export("VERSION", Export::Constant(Value::from("1")));
        assert_eq!(module.len(), 2);
        assert_eq!(module.builders().count(), 1);
        assert!(matches!(module.get("VERSION"), Some(Export::Constant(_))));
        assert!(matches!(module.get("Echo"), Some(Export::Builder(_))));
    }

    #[test]
    fn optional_candidates_include_root_alias() {
        let registry = OptionalBuilderRegistry::new();
        let ns: Vec<String> = ["langchain_community", "llms", "hf"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            registry.candidates(&ns),
            vec!["langchain_community/llms/hf", "langchain/llms/hf"]
        );
        assert!(registry.is_pluggable("langchain/llms/hf"));
        assert!(!OptionalBuilderRegistry::empty().is_pluggable("langchain/llms/hf"));
    }

    #[tokio::test]
    async fn cached_loader_memoizes_success_and_retries_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = CachedLoader::new(CountingLoader {
            calls: Arc::clone(&calls),
            fail_first: true,
        });

        assert!(loader.load().await.is_err());
        assert!(!loader.is_loaded());
        assert!(loader.load().await.is_ok());
        assert!(loader.load().await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(loader.is_loaded());
    }

    #[tokio::test]
    async fn optional_module_resolves_ready_and_lazy() {
        let ready = OptionalModule::Ready(Arc::new(Module::new()));
        assert!(ready.resolve().await.unwrap().is_empty());

        let lazy = OptionalModule::Lazy(Arc::new(CountingLoader {
            calls: Arc::new(AtomicUsize::new(0)),
            fail_first: false,
        }));
        assert_eq!(lazy.resolve().await.unwrap().len(), 1);
    }
}
