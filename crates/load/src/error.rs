//! Error types for the snapshot protocol.
//!
//! Uses `thiserror` for ergonomic error definitions. Every decode-time
//! error is fatal to the whole `load` call and carries the dotted path of
//! the node that failed (`$.kwargs.llm.kwargs.openAIApiKey`).

use thiserror::Error;

/// The top-level error type for decoding a snapshot.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A `not_implemented` node was encountered.
    #[error("Trying to load an object that doesn't implement serialization: {path} -> {node}")]
    UnsupportedSerialization { path: String, node: String },

    /// A `secret` node referenced a key found in neither the secrets map nor the environment.
    #[error("Missing secret \"{key}\" at {path}")]
    MissingSecret { path: String, key: String },

    /// A `constructor` node could not be resolved to a builder.
    #[error("{reason}: {path} -> {node}")]
    Resolution {
        path: String,
        node: String,
        reason: ResolutionReason,
    },

    #[error("Maximum recursion depth ({max_depth}) exceeded during deserialization at {path}")]
    MaxDepthExceeded { max_depth: usize, path: String },

    /// A protocol-shaped object that violates the node shape rules.
    #[error("Malformed node at {path}: {reason}")]
    Malformed { path: String, reason: String },

    /// The resolved builder rejected its kwargs.
    #[error("Failed to build {name} at {path}: {source}")]
    Build {
        path: String,
        name: String,
        #[source]
        source: BuildError,
    },

    #[error("Invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type alias for decoding.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Why a constructor id failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionReason {
    #[error("Invalid namespace")]
    InvalidNamespace,

    #[error("Missing key \"{0}\" in optional registry")]
    MissingOptionalNamespace(String),

    #[error("Invalid identifier \"{0}\"")]
    UnknownIdentifier(String),

    #[error("Export \"{0}\" is not a builder")]
    NotInvocable(String),

    #[error("Failed to load optional module \"{namespace}\": {reason}")]
    ModuleLoad { namespace: String, reason: String },
}

/// Errors raised by a builder while constructing an instance from kwargs.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("invalid value for field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("{0}")]
    Custom(String),
}

/// Errors raised by a lazily-resolved optional module.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ModuleLoadError(pub String);
