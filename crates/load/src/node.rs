//! Wire model: the tagged union every snapshot value is made of.
//!
//! A snapshot is plain JSON. Objects carrying `"lc": 1`, a known `"type"` and
//! an `"id"` are protocol nodes; everything else is ordinary data. Plain
//! objects that would be mistaken for protocol nodes travel wrapped as
//! `{"__lc_escaped__": {...}}`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::LoadError;

/// Format version marker carried in the `lc` field of every protocol node.
pub const LC_VERSION: u64 = 1;

/// Key of the wrapper object used for escaped user data.
pub const ESCAPE_KEY: &str = "__lc_escaped__";

/// Delimiter used when joining namespace segments into a registry key.
pub const NAMESPACE_DELIMITER: &str = "/";

const TYPE_CONSTRUCTOR: &str = "constructor";
const TYPE_SECRET: &str = "secret";
const TYPE_NOT_IMPLEMENTED: &str = "not_implemented";

/// An ordered identity path: `[...namespace, terminal]`, or `[secretKey]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdPath(Vec<String>);

impl IdPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All segments except the last.
    pub fn namespace(&self) -> &[String] {
        match self.0.split_last() {
            Some((_, namespace)) => namespace,
            None => &[],
        }
    }

    /// The last segment (class name for constructors, key for secrets).
    pub fn terminal(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// The namespace joined with [`NAMESPACE_DELIMITER`].
    pub fn joined_namespace(&self) -> String {
        self.namespace().join(NAMESPACE_DELIMITER)
    }
}

impl fmt::Display for IdPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// The wire representation of any value.
#[derive(Debug, Clone, PartialEq)]
pub enum SerializedNode {
    /// String, number, boolean or null.
    Plain(Value),
    List(Vec<SerializedNode>),
    Map(BTreeMap<String, SerializedNode>),
    /// A reconstructable instance.
    Constructor {
        id: IdPath,
        kwargs: BTreeMap<String, SerializedNode>,
    },
    /// A redacted secret; `id` holds exactly one element, the secret key.
    Secret { id: IdPath },
    /// A value that declined serialization.
    NotImplemented { id: IdPath },
    /// User data that must never be revived as a protocol node.
    Escaped(Value),
}

impl SerializedNode {
    pub fn secret(key: impl Into<String>) -> Self {
        SerializedNode::Secret {
            id: IdPath::new([key.into()]),
        }
    }

    /// Classify a parsed JSON tree into nodes.
    ///
    /// Protocol-shaped objects with a bad `id` or `kwargs` are rejected
    /// instead of being passed through as plain maps.
    pub fn from_value(value: Value) -> Result<Self, LoadError> {
        let mut path = vec!["$".to_string()];
        classify(value, &mut path)
    }

    /// Render the node back into plain JSON.
    pub fn to_value(&self) -> Value {
        match self {
            SerializedNode::Plain(v) => v.clone(),
            SerializedNode::List(items) => Value::Array(items.iter().map(Self::to_value).collect()),
            SerializedNode::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
            SerializedNode::Constructor { id, kwargs } => {
                let mut obj = protocol_header(TYPE_CONSTRUCTOR, id);
                obj.insert(
                    "kwargs".into(),
                    Value::Object(kwargs.iter().map(|(k, v)| (k.clone(), v.to_value())).collect()),
                );
                Value::Object(obj)
            }
            SerializedNode::Secret { id } => Value::Object(protocol_header(TYPE_SECRET, id)),
            SerializedNode::NotImplemented { id } => {
                Value::Object(protocol_header(TYPE_NOT_IMPLEMENTED, id))
            }
            SerializedNode::Escaped(inner) => {
                let mut obj = Map::new();
                obj.insert(ESCAPE_KEY.into(), inner.clone());
                Value::Object(obj)
            }
        }
    }

    /// Compact JSON text of this node, used in error messages.
    pub fn to_json_string(&self) -> String {
        self.to_value().to_string()
    }

    /// Visit this node and every descendant, depth first, with its dotted path.
    ///
    /// Escaped payloads are opaque and not descended into.
    pub fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(&[String], &SerializedNode),
    {
        let mut path = vec!["$".to_string()];
        self.visit_inner(&mut path, f);
    }

    fn visit_inner<F>(&self, path: &mut Vec<String>, f: &mut F)
    where
        F: FnMut(&[String], &SerializedNode),
    {
        f(path, self);
        match self {
            SerializedNode::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    path.push(i.to_string());
                    item.visit_inner(path, f);
                    path.pop();
                }
            }
            SerializedNode::Map(entries) => {
                for (key, value) in entries {
                    path.push(key.clone());
                    value.visit_inner(path, f);
                    path.pop();
                }
            }
            SerializedNode::Constructor { kwargs, .. } => {
                path.push("kwargs".into());
                for (key, value) in kwargs {
                    path.push(key.clone());
                    value.visit_inner(path, f);
                    path.pop();
                }
                path.pop();
            }
            _ => {}
        }
    }
}

impl Serialize for SerializedNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SerializedNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        SerializedNode::from_value(value).map_err(D::Error::custom)
    }
}

impl From<&SerializedNode> for Value {
    fn from(node: &SerializedNode) -> Self {
        node.to_value()
    }
}

/// Whether a plain object must be wrapped before it goes on the wire.
///
/// Any object with an `lc` key could be read back as a protocol node, and an
/// object that already looks like an escape wrapper would be unwrapped.
pub fn needs_escaping(map: &Map<String, Value>) -> bool {
    map.contains_key("lc") || is_escape_wrapper(map)
}

fn is_escape_wrapper(map: &Map<String, Value>) -> bool {
    map.len() == 1 && map.contains_key(ESCAPE_KEY)
}

fn protocol_header(kind: &str, id: &IdPath) -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert("lc".into(), Value::from(LC_VERSION));
    obj.insert("type".into(), Value::from(kind));
    obj.insert(
        "id".into(),
        Value::Array(id.segments().iter().cloned().map(Value::String).collect()),
    );
    obj
}

fn classify(value: Value, path: &mut Vec<String>) -> Result<SerializedNode, LoadError> {
    match value {
        Value::Array(items) => {
            let mut nodes = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                path.push(i.to_string());
                nodes.push(classify(item, path)?);
                path.pop();
            }
            Ok(SerializedNode::List(nodes))
        }
        Value::Object(map) => classify_object(map, path),
        scalar => Ok(SerializedNode::Plain(scalar)),
    }
}

fn classify_object(
    mut map: Map<String, Value>,
    path: &mut Vec<String>,
) -> Result<SerializedNode, LoadError> {
    if is_escape_wrapper(&map) {
        let inner = map.remove(ESCAPE_KEY).unwrap_or(Value::Null);
        return Ok(SerializedNode::Escaped(inner));
    }

    if let Some(kind) = protocol_kind(&map) {
        let id = parse_id(map.get("id"), path)?;
        return match kind {
            TYPE_SECRET => {
                if id.len() != 1 {
                    return Err(malformed(path, "secret id must hold exactly one key"));
                }
                Ok(SerializedNode::Secret { id })
            }
            TYPE_NOT_IMPLEMENTED => Ok(SerializedNode::NotImplemented { id }),
            _ => {
                if id.is_empty() {
                    return Err(malformed(path, "constructor id must not be empty"));
                }
                let Some(Value::Object(raw_kwargs)) = map.remove("kwargs") else {
                    return Err(malformed(path, "constructor kwargs must be an object"));
                };
                path.push("kwargs".into());
                let mut kwargs = BTreeMap::new();
                for (key, value) in raw_kwargs {
                    path.push(key.clone());
                    let node = classify(value, path)?;
                    path.pop();
                    kwargs.insert(key, node);
                }
                path.pop();
                Ok(SerializedNode::Constructor { id, kwargs })
            }
        };
    }

    let mut entries = BTreeMap::new();
    for (key, value) in map {
        path.push(key.clone());
        let node = classify(value, path)?;
        path.pop();
        entries.insert(key, node);
    }
    Ok(SerializedNode::Map(entries))
}

/// The node type of a protocol-shaped object, if it is one.
fn protocol_kind(map: &Map<String, Value>) -> Option<&'static str> {
    if !map.get("lc").is_some_and(is_lc_version) || !map.contains_key("id") {
        return None;
    }
    match map.get("type").and_then(Value::as_str)? {
        TYPE_CONSTRUCTOR => Some(TYPE_CONSTRUCTOR),
        TYPE_SECRET => Some(TYPE_SECRET),
        TYPE_NOT_IMPLEMENTED => Some(TYPE_NOT_IMPLEMENTED),
        _ => None,
    }
}

/// `1` and `1.0` are the same number on the wire.
fn is_lc_version(value: &Value) -> bool {
    value.as_f64() == Some(LC_VERSION as f64)
}

fn parse_id(raw: Option<&Value>, path: &[String]) -> Result<IdPath, LoadError> {
    let Some(Value::Array(items)) = raw else {
        return Err(malformed(path, "id must be an array of strings"));
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| malformed(path, "id must be an array of strings"))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(IdPath)
}

fn malformed(path: &[String], reason: &str) -> LoadError {
    LoadError::Malformed {
        path: path.join("."),
        reason: reason.into(),
    }
}
