//! Constructor id → builder resolution.
//!
//! Resolution is a pure function of the id and the two registries. The only
//! suspension point is awaiting a lazily-resolved optional module.

use tracing::{debug, info};

use crate::error::ResolutionReason;
use crate::node::{IdPath, NAMESPACE_DELIMITER};
use crate::registry::{Builder, BuilderRegistry, Export, Module, OptionalBuilderRegistry};
use std::sync::Arc;

/// Resolve a constructor id to the builder that can rebuild it.
pub async fn resolve(
    id: &IdPath,
    builders: &BuilderRegistry,
    optional: &OptionalBuilderRegistry,
) -> Result<Builder, ResolutionReason> {
    let module = resolve_module(id.namespace(), builders, optional).await?;
    find_builder(&module, id.terminal())
}

async fn resolve_module(
    namespace: &[String],
    builders: &BuilderRegistry,
    optional: &OptionalBuilderRegistry,
) -> Result<Arc<Module>, ResolutionReason> {
    let joined = namespace.join(NAMESPACE_DELIMITER);
    let injected = optional
        .candidates(namespace)
        .into_iter()
        .find(|key| optional.get(key).is_some());

    if optional.is_pluggable(&joined) || injected.is_some() {
        // Being a known entrypoint is not enough: the caller must have injected it.
        let Some(key) = injected else {
            return Err(ResolutionReason::MissingOptionalNamespace(joined));
        };
        let Some(entry) = optional.get(&key) else {
            return Err(ResolutionReason::MissingOptionalNamespace(joined));
        };
        let module = entry
            .resolve()
            .await
            .map_err(|e| ResolutionReason::ModuleLoad {
                namespace: key.clone(),
                reason: e.to_string(),
            })?;
        info!(namespace = %key, "Resolved optional module");
        return Ok(module);
    }

    let Some((root, rest)) = namespace.split_first() else {
        return Err(ResolutionReason::InvalidNamespace);
    };
    let Some(table) = builders.root(root) else {
        return Err(ResolutionReason::InvalidNamespace);
    };

    // Longest registered prefix wins: `llms/openai/v2` falls back to `llms/openai`.
    for len in (1..=rest.len()).rev() {
        let key = rest[..len].join(NAMESPACE_DELIMITER);
        if let Some(module) = table.get(&key) {
            debug!(root = %root, namespace = %key, "Matched registry namespace");
            return Ok(Arc::clone(module));
        }
    }
    Err(ResolutionReason::InvalidNamespace)
}

fn find_builder(module: &Module, name: &str) -> Result<Builder, ResolutionReason> {
    match module.get(name) {
        Some(Export::Builder(builder)) => Ok(builder.clone()),
        Some(Export::Constant(_)) => Err(ResolutionReason::NotInvocable(name.to_string())),
        // The export name may differ from the type's own name; match on the latter.
        None => module
            .builders()
            .find(|builder| builder.unique_name() == name)
            .cloned()
            .ok_or_else(|| ResolutionReason::UnknownIdentifier(name.to_string())),
    }
}
