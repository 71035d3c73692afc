//! Snapshot a live component as a constructor node.
//!
//! The snapshot reflects the component as it is now, not as it was built:
//! stored constructor arguments are overlaid with current field values.
//! Declared secrets are always written as `secret` nodes, never plaintext.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::keys::AliasTable;
use crate::node::{needs_escaping, SerializedNode};
use crate::serializable::{Declarations, Serializable};
use crate::value::LiveValue;

/// Encode a component into its wire node.
///
/// Components that opt out, or whose constructor arguments are not a plain
/// field map, come back as `not_implemented` rather than failing.
pub fn encode(instance: &dyn Serializable) -> SerializedNode {
    let id = instance.lc_id();
    if !instance.lc_serializable() {
        debug!(id = %id, "Component opted out of serialization");
        return SerializedNode::NotImplemented { id };
    }
    let LiveValue::Map(stored) = instance.lc_kwargs() else {
        debug!(id = %id, "Constructor arguments are not a field map");
        return SerializedNode::NotImplemented { id };
    };

    let mut kwargs: BTreeMap<String, LiveValue> = stored
        .into_iter()
        .map(|(key, stored_value)| {
            let current = instance.lc_field(&key).unwrap_or(stored_value);
            (key, current)
        })
        .collect();

    let ancestry = instance.lc_ancestry();
    let declarations = Declarations::fold(ancestry);
    for level in ancestry {
        if let Some(attributes) = instance.lc_attributes(level) {
            for (key, value) in attributes {
                kwargs.insert(key, LiveValue::Json(value));
            }
        }
    }

    for path in declarations.secrets.keys() {
        copy_secret_source(instance, &mut kwargs, path);
    }

    let mut encoded: BTreeMap<String, SerializedNode> = kwargs
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect();
    for (path, secret_key) in &declarations.secrets {
        redact(&mut encoded, path, secret_key);
    }

    let aliases = AliasTable::from_aliases(declarations.aliases);
    SerializedNode::Constructor {
        id,
        kwargs: aliases.encode_keys(encoded),
    }
}

/// Encode a component and render it as JSON text.
pub fn dumps(instance: &dyn Serializable) -> Result<String, serde_json::Error> {
    serde_json::to_string(&encode(instance))
}

/// Pretty-printed variant of [`dumps`].
pub fn dumps_pretty(instance: &dyn Serializable) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&encode(instance))
}

/// Encode any live value; nested components are encoded recursively.
pub fn encode_value(value: &LiveValue) -> SerializedNode {
    match value {
        LiveValue::Json(json) => encode_json(json),
        LiveValue::List(items) => SerializedNode::List(items.iter().map(encode_value).collect()),
        LiveValue::Map(entries) => {
            let node = SerializedNode::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), encode_value(v)))
                    .collect(),
            );
            if entries.contains_key("lc") || looks_escaped(entries) {
                SerializedNode::Escaped(node.to_value())
            } else {
                node
            }
        }
        LiveValue::Instance(instance) => encode(instance.object()),
    }
}

fn encode_json(value: &Value) -> SerializedNode {
    match value {
        Value::Object(obj) if needs_escaping(obj) => SerializedNode::Escaped(value.clone()),
        Value::Object(obj) => SerializedNode::Map(
            obj.iter()
                .map(|(k, v)| (k.clone(), encode_json(v)))
                .collect(),
        ),
        Value::Array(items) => SerializedNode::List(items.iter().map(encode_json).collect()),
        scalar => SerializedNode::Plain(scalar.clone()),
    }
}

fn looks_escaped(entries: &BTreeMap<String, LiveValue>) -> bool {
    entries.len() == 1 && entries.contains_key(crate::node::ESCAPE_KEY)
}

/// Where a secret path is read from: the component itself, then plain values.
enum ReadCursor<'a> {
    Root(&'a dyn Serializable),
    Value(LiveValue),
}

impl ReadCursor<'_> {
    fn child(&self, segment: &str) -> Option<LiveValue> {
        match self {
            ReadCursor::Root(instance) => instance.lc_field(segment),
            ReadCursor::Value(value) => value.child(segment),
        }
    }
}

/// Make sure the value behind a secret path is present in `kwargs`, so
/// redaction has a slot to overwrite even for fields never passed at
/// construction time. Intermediate containers mirror the read side's shape.
fn copy_secret_source(
    instance: &dyn Serializable,
    kwargs: &mut BTreeMap<String, LiveValue>,
    path: &str,
) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut root = LiveValue::Map(std::mem::take(kwargs));
    copy_along(ReadCursor::Root(instance), &mut root, parents, last);
    if let LiveValue::Map(map) = root {
        *kwargs = map;
    }
}

fn copy_along(mut read: ReadCursor<'_>, root: &mut LiveValue, parents: &[&str], last: &str) {
    let mut write = root;
    for segment in parents {
        let Some(next) = read.child(segment) else {
            return;
        };
        let Some(slot) = child_slot(write, segment, &next) else {
            return;
        };
        read = ReadCursor::Value(next);
        write = slot;
    }
    if let Some(value) = read.child(last) {
        fill_if_empty(write, last, value);
    }
}

/// Turn plain JSON containers into live containers so they can be written into.
fn lift(value: &mut LiveValue) {
    match value {
        LiveValue::Json(Value::Object(obj)) => {
            let obj = std::mem::take(obj);
            *value = LiveValue::Map(obj.into_iter().map(|(k, v)| (k, LiveValue::Json(v))).collect());
        }
        LiveValue::Json(Value::Array(items)) => {
            let items = std::mem::take(items);
            *value = LiveValue::List(items.into_iter().map(LiveValue::Json).collect());
        }
        _ => {}
    }
}

fn empty_like(shape: &LiveValue) -> Option<LiveValue> {
    if shape.is_map_like() {
        Some(LiveValue::Map(BTreeMap::new()))
    } else if shape.is_list_like() {
        Some(LiveValue::List(Vec::new()))
    } else {
        None
    }
}

fn child_slot<'w>(write: &'w mut LiveValue, segment: &str, shape: &LiveValue) -> Option<&'w mut LiveValue> {
    lift(write);
    match write {
        LiveValue::Map(entries) => {
            if !entries.contains_key(segment) {
                entries.insert(segment.to_string(), empty_like(shape)?);
            }
            entries.get_mut(segment)
        }
        LiveValue::List(items) => {
            let index = segment.parse::<usize>().ok()?;
            if index >= items.len() {
                let filler = empty_like(shape)?;
                items.resize_with(index, LiveValue::null);
                items.push(filler);
            }
            items.get_mut(index)
        }
        _ => None,
    }
}

fn fill_if_empty(write: &mut LiveValue, last: &str, value: LiveValue) {
    lift(write);
    match write {
        LiveValue::Map(entries) => {
            let slot = entries.entry(last.to_string()).or_insert_with(LiveValue::null);
            if slot.is_null() {
                *slot = value;
            }
        }
        LiveValue::List(items) => {
            let Ok(index) = last.parse::<usize>() else {
                return;
            };
            if index >= items.len() {
                items.resize_with(index + 1, LiveValue::null);
            }
            if items[index].is_null() {
                items[index] = value;
            }
        }
        _ => {}
    }
}

/// Overwrite the slot at `path` with a secret node, if the slot exists.
fn redact(encoded: &mut BTreeMap<String, SerializedNode>, path: &str, secret_key: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut root = SerializedNode::Map(std::mem::take(encoded));
    redact_node(&mut root, parents, last, secret_key);
    if let SerializedNode::Map(map) = root {
        *encoded = map;
    }
}

fn redact_node(root: &mut SerializedNode, parents: &[&str], last: &str, secret_key: &str) {
    let mut current = root;
    for segment in parents {
        let next = match current {
            SerializedNode::Map(entries) => entries.get_mut(*segment),
            SerializedNode::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
            _ => None,
        };
        let Some(next) = next else {
            return;
        };
        current = next;
    }
    let slot = match current {
        SerializedNode::Map(entries) => entries.get_mut(last),
        SerializedNode::List(items) => last.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        _ => None,
    };
    if let Some(slot) = slot {
        *slot = SerializedNode::secret(secret_key);
    }
}
