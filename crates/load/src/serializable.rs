//! The host type system the protocol runs against.
//!
//! A component opts into snapshots by implementing [`Serializable`]. Its
//! declarations (aliases, secret paths, name override) live in a static
//! ancestry list ordered from the concrete type up through every ancestor,
//! so nothing is discovered by reflection at runtime.

use serde_json::{Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::BuildError;
use crate::node::IdPath;
use crate::value::{Kwargs, LiveValue};

/// What one level of a type's ancestry declares about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDecl {
    /// The type's given name.
    pub name: &'static str,

    /// Name override that stays stable even when `name` does not.
    pub lc_name: Option<&'static str>,

    /// In-memory field name → wire field name.
    pub aliases: &'static [(&'static str, &'static str)],

    /// Dot-separated field path → secret key.
    pub secrets: &'static [(&'static str, &'static str)],
}

impl TypeDecl {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            lc_name: None,
            aliases: &[],
            secrets: &[],
        }
    }

    pub const fn with_lc_name(mut self, lc_name: &'static str) -> Self {
        self.lc_name = Some(lc_name);
        self
    }

    pub const fn with_aliases(mut self, aliases: &'static [(&'static str, &'static str)]) -> Self {
        self.aliases = aliases;
        self
    }

    pub const fn with_secrets(mut self, secrets: &'static [(&'static str, &'static str)]) -> Self {
        self.secrets = secrets;
        self
    }
}

/// A live component that can describe itself as a snapshot.
pub trait Serializable: Any + Send + Sync + fmt::Debug {
    /// Declarations of the concrete type first, then each ancestor in order.
    fn lc_ancestry(&self) -> &'static [TypeDecl];

    /// Namespace segments, root package first (e.g. `["langchain", "llms", "openai"]`).
    fn lc_namespace(&self) -> &'static [&'static str];

    /// Whether this instance opts into snapshots.
    fn lc_serializable(&self) -> bool {
        true
    }

    /// The arguments this instance was constructed with.
    ///
    /// Anything other than [`LiveValue::Map`] cannot be replayed and is
    /// encoded as a `not_implemented` node.
    fn lc_kwargs(&self) -> LiveValue;

    /// Current value of a live field, if the instance has it and it is set.
    fn lc_field(&self, _field: &str) -> Option<LiveValue> {
        None
    }

    /// Extra attributes declared at one level of the ancestry.
    fn lc_attributes(&self, _level: &TypeDecl) -> Option<Map<String, Value>> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    /// `[...namespace, unique name]`.
    fn lc_id(&self) -> IdPath {
        let mut segments: Vec<String> = self.lc_namespace().iter().map(|s| s.to_string()).collect();
        segments.push(unique_name(self.lc_ancestry()).to_string());
        IdPath::new(segments)
    }
}

/// A [`Serializable`] type that can be rebuilt from decoded kwargs.
pub trait Buildable: Serializable + Sized {
    /// Same list [`Serializable::lc_ancestry`] returns, available without an instance.
    const ANCESTRY: &'static [TypeDecl];

    fn build(kwargs: Kwargs) -> Result<Self, BuildError>;
}

/// Declarations folded over a whole ancestry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    pub aliases: BTreeMap<String, String>,
    pub secrets: BTreeMap<String, String>,
}

impl Declarations {
    /// Fold from the concrete type towards the root.
    ///
    /// On key collision the more ancestral declaration is applied last and
    /// wins. This mirrors the reference loader's observed behaviour.
    pub fn fold(ancestry: &[TypeDecl]) -> Self {
        let mut folded = Self::default();
        for level in ancestry {
            for (field, wire) in level.aliases {
                folded.aliases.insert(field.to_string(), wire.to_string());
            }
            for (path, key) in level.secrets {
                folded.secrets.insert(path.to_string(), key.to_string());
            }
        }
        folded
    }
}

/// The terminal name a type is addressed by on the wire.
///
/// The `lc_name` override is used when the concrete level's effective
/// override differs from its parent's; otherwise the given type name.
pub fn unique_name(ancestry: &[TypeDecl]) -> &'static str {
    let Some(first) = ancestry.first() else {
        return "";
    };
    let own = effective_lc_name(ancestry);
    let parent = effective_lc_name(&ancestry[1..]);
    match own {
        Some(name) if own != parent => name,
        _ => first.name,
    }
}

fn effective_lc_name(levels: &[TypeDecl]) -> Option<&'static str> {
    levels.iter().find_map(|level| level.lc_name)
}
