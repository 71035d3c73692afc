//! # RustedClaw Load
//!
//! Snapshots of component graphs, and the loader that turns them back into
//! live components.
//!
//! A snapshot is plain JSON. Components appear as `constructor` nodes naming
//! a registered builder, credentials appear as `secret` placeholders that are
//! filled from caller-supplied maps or the environment, and anything that
//! cannot be rebuilt is marked `not_implemented`. Loading never executes code
//! that was not registered ahead of time in a [`BuilderRegistry`].
//!
//! ## Flow
//!
//! - [`encode`] / [`dumps`]: live component → node tree → text
//! - [`load`] / [`decode`]: text → node tree → resolve → build
//! - [`resolve`](resolve::resolve): constructor id → [`Builder`]

pub mod error;
pub mod node;
pub mod value;
pub mod serializable;
pub mod keys;
pub mod registry;
pub mod resolve;
pub mod encode;
pub mod decode;

#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export key types at crate root for ergonomics
pub use error::{BuildError, LoadError, ModuleLoadError, ResolutionReason, Result};
pub use node::{IdPath, SerializedNode, LC_VERSION};
pub use value::{Instance, Kwargs, LiveValue};
pub use serializable::{Buildable, Serializable, TypeDecl};
pub use keys::AliasTable;
pub use registry::{
    Builder, BuilderRegistry, CachedLoader, Export, Module, ModuleLoader, OptionalBuilderRegistry,
    OptionalModule, DEFAULT_ROOT,
};
pub use encode::{dumps, dumps_pretty, encode, encode_value};
pub use decode::{decode, load, LoadOptions, Loader, DEFAULT_MAX_DEPTH};
