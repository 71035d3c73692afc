//! Rebuild live components from a snapshot.
//!
//! Children of a list, a map, or a constructor's kwargs are decoded as
//! independent futures and joined in their original order. The first child
//! to fail aborts the whole load; no partial graph is ever returned.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{LoadError, Result};
use crate::node::{IdPath, SerializedNode};
use crate::registry::{BuilderRegistry, OptionalBuilderRegistry};
use crate::resolve::resolve;
use crate::value::{Instance, Kwargs, LiveValue};

/// Default maximum nesting depth accepted while decoding.
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Per-call options for [`load`] and [`decode`].
#[derive(Clone)]
pub struct LoadOptions {
    /// Secret key → plaintext, consulted before the environment.
    pub secrets_map: HashMap<String, String>,

    /// Fall back to an identically-named environment variable for secrets
    /// missing from `secrets_map`.
    pub secrets_from_env: bool,

    /// Pluggable namespaces injected for this call.
    pub optional_registry: OptionalBuilderRegistry,

    /// Nodes nested deeper than this are rejected.
    pub max_depth: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            secrets_map: HashMap::new(),
            secrets_from_env: true,
            optional_registry: OptionalBuilderRegistry::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets_map.insert(key.into(), value.into());
        self
    }

    pub fn with_secrets<I, K, V>(mut self, secrets: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.secrets_map
            .extend(secrets.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_secrets_from_env(mut self, enabled: bool) -> Self {
        self.secrets_from_env = enabled;
        self
    }

    pub fn with_optional_registry(mut self, registry: OptionalBuilderRegistry) -> Self {
        self.optional_registry = registry;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.secrets_map.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("LoadOptions")
            .field("secrets_map", &format_args!("[REDACTED: {}]", keys.join(", ")))
            .field("secrets_from_env", &self.secrets_from_env)
            .field("optional_registry", &self.optional_registry)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

/// Parse snapshot text and rebuild it against `registry`.
pub async fn load(text: &str, registry: &BuilderRegistry, options: &LoadOptions) -> Result<LiveValue> {
    let value: Value = serde_json::from_str(text)?;
    let node = SerializedNode::from_value(value)?;
    decode(&node, registry, options).await
}

/// Rebuild an already-classified node tree, rooted at path `$`.
pub async fn decode(
    node: &SerializedNode,
    registry: &BuilderRegistry,
    options: &LoadOptions,
) -> Result<LiveValue> {
    let reviver = Reviver { registry, options };
    reviver.revive(node, vec!["$".to_string()]).await
}

/// A registry handle that can be shared by any number of concurrent loads.
#[derive(Debug, Clone)]
pub struct Loader {
    registry: Arc<BuilderRegistry>,
}

impl Loader {
    pub fn new(registry: Arc<BuilderRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &BuilderRegistry {
        &self.registry
    }

    pub async fn load(&self, text: &str, options: &LoadOptions) -> Result<LiveValue> {
        load(text, &self.registry, options).await
    }

    pub async fn decode(&self, node: &SerializedNode, options: &LoadOptions) -> Result<LiveValue> {
        decode(node, &self.registry, options).await
    }
}

struct Reviver<'a> {
    registry: &'a BuilderRegistry,
    options: &'a LoadOptions,
}

impl Reviver<'_> {
    /// `path` always starts at `$`, so its length tracks the nesting depth.
    fn revive<'s>(&'s self, node: &'s SerializedNode, path: Vec<String>) -> BoxFuture<'s, Result<LiveValue>> {
        async move {
            let depth = path.len() - 1;
            if depth > self.options.max_depth {
                return Err(LoadError::MaxDepthExceeded {
                    max_depth: self.options.max_depth,
                    path: path.join("."),
                });
            }

            match node {
                SerializedNode::Escaped(raw) => Ok(LiveValue::Json(raw.clone())),
                SerializedNode::Secret { id } => self.secret(id.terminal(), &path),
                SerializedNode::NotImplemented { .. } => Err(LoadError::UnsupportedSerialization {
                    path: path.join("."),
                    node: node.to_json_string(),
                }),
                SerializedNode::Constructor { id, kwargs } => {
                    self.construct(node, id, kwargs, path).await
                }
                SerializedNode::List(items) => {
                    let children = items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| self.revive(item, child_path(&path, &i.to_string())));
                    Ok(LiveValue::List(try_join_all(children).await?))
                }
                SerializedNode::Map(entries) => {
                    let revived = self.revive_entries(entries, &path).await?;
                    Ok(LiveValue::Map(revived))
                }
                SerializedNode::Plain(value) => Ok(LiveValue::Json(value.clone())),
            }
        }
        .boxed()
    }

    async fn revive_entries(
        &self,
        entries: &BTreeMap<String, SerializedNode>,
        path: &[String],
    ) -> Result<BTreeMap<String, LiveValue>> {
        let children = entries.iter().map(|(key, value)| {
            let child = self.revive(value, child_path(path, key));
            async move { Ok::<_, LoadError>((key.clone(), child.await?)) }
        });
        Ok(try_join_all(children).await?.into_iter().collect())
    }

    fn secret(&self, key: &str, path: &[String]) -> Result<LiveValue> {
        if let Some(value) = self.options.secrets_map.get(key) {
            return Ok(LiveValue::Json(Value::String(value.clone())));
        }
        if self.options.secrets_from_env {
            if let Ok(value) = std::env::var(key) {
                if !value.is_empty() {
                    debug!(key, path = %path.join("."), "Loaded secret from environment");
                    return Ok(LiveValue::Json(Value::String(value)));
                }
            }
        }
        Err(LoadError::MissingSecret {
            path: path.join("."),
            key: key.to_string(),
        })
    }

    async fn construct(
        &self,
        node: &SerializedNode,
        id: &IdPath,
        kwargs: &BTreeMap<String, SerializedNode>,
        path: Vec<String>,
    ) -> Result<LiveValue> {
        let builder = resolve(id, self.registry, &self.options.optional_registry)
            .await
            .map_err(|reason| LoadError::Resolution {
                path: path.join("."),
                node: node.to_json_string(),
                reason,
            })?;
        debug!(id = %id, builder = builder.name(), "Resolved builder");

        let kwargs_path = child_path(&path, "kwargs");
        let revived = self.revive_entries(kwargs, &kwargs_path).await?;
        let fields = builder.alias_table().decode_keys(revived);

        let object = builder
            .build(Kwargs::from(fields))
            .map_err(|source| LoadError::Build {
                path: path.join("."),
                name: id.terminal().to_string(),
                source,
            })?;

        Ok(LiveValue::Instance(
            Instance::from_arc(object).with_label(id.terminal()),
        ))
    }
}

fn child_path(path: &[String], segment: &str) -> Vec<String> {
    let mut child = Vec::with_capacity(path.len() + 1);
    child.extend_from_slice(path);
    child.push(segment.to_string());
    child
}
