//! Live values: what encode reads from and decode produces.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::BuildError;
use crate::serializable::{unique_name, Serializable};

/// A constructed component plus the label it is shown under in debug output.
///
/// The decoder stamps the label with the wire terminal name, so traces keep
/// the registry name even when the concrete type is named differently.
#[derive(Clone)]
pub struct Instance {
    object: Arc<dyn Serializable>,
    label: Option<String>,
}

impl Instance {
    pub fn new<T: Serializable>(object: T) -> Self {
        Self::from_arc(Arc::new(object))
    }

    pub fn from_arc(object: Arc<dyn Serializable>) -> Self {
        Self {
            object,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn object(&self) -> &dyn Serializable {
        self.object.as_ref()
    }

    pub fn arc(&self) -> Arc<dyn Serializable> {
        Arc::clone(&self.object)
    }

    /// The stamped label, or the type's unique name if none was stamped.
    pub fn debug_label(&self) -> &str {
        self.label
            .as_deref()
            .unwrap_or_else(|| unique_name(self.object.lc_ancestry()))
    }

    pub fn downcast_ref<T: Serializable>(&self) -> Option<&T> {
        self.object.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Serializable>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(self.debug_label()).field(&self.object).finish()
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.object), Arc::as_ptr(&other.object))
    }
}

/// A live value: plain data, containers, or component instances.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveValue {
    Json(Value),
    List(Vec<LiveValue>),
    Map(BTreeMap<String, LiveValue>),
    Instance(Instance),
}

impl LiveValue {
    pub fn null() -> Self {
        LiveValue::Json(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, LiveValue::Json(Value::Null))
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            LiveValue::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LiveValue::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Convert to plain JSON; `None` if an instance is nested anywhere inside.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            LiveValue::Json(value) => Some(value.clone()),
            LiveValue::List(items) => items
                .iter()
                .map(LiveValue::to_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            LiveValue::Map(entries) => entries
                .iter()
                .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                .collect::<Option<Map<_, _>>>()
                .map(Value::Object),
            LiveValue::Instance(_) => None,
        }
    }

    /// Read one path segment: a map key, a list index, or an instance field.
    pub fn child(&self, segment: &str) -> Option<LiveValue> {
        match self {
            LiveValue::Map(entries) => entries.get(segment).cloned(),
            LiveValue::List(items) => items.get(segment.parse::<usize>().ok()?).cloned(),
            LiveValue::Instance(instance) => instance.object().lc_field(segment),
            LiveValue::Json(Value::Object(obj)) => obj.get(segment).cloned().map(LiveValue::Json),
            LiveValue::Json(Value::Array(items)) => items
                .get(segment.parse::<usize>().ok()?)
                .cloned()
                .map(LiveValue::Json),
            LiveValue::Json(_) => None,
        }
    }

    pub(crate) fn is_map_like(&self) -> bool {
        matches!(
            self,
            LiveValue::Map(_) | LiveValue::Instance(_) | LiveValue::Json(Value::Object(_))
        )
    }

    pub(crate) fn is_list_like(&self) -> bool {
        matches!(self, LiveValue::List(_) | LiveValue::Json(Value::Array(_)))
    }
}

impl From<Value> for LiveValue {
    fn from(value: Value) -> Self {
        LiveValue::Json(value)
    }
}

impl From<&str> for LiveValue {
    fn from(value: &str) -> Self {
        LiveValue::Json(Value::from(value))
    }
}

impl From<String> for LiveValue {
    fn from(value: String) -> Self {
        LiveValue::Json(Value::from(value))
    }
}

impl From<f64> for LiveValue {
    fn from(value: f64) -> Self {
        LiveValue::Json(Value::from(value))
    }
}

impl From<bool> for LiveValue {
    fn from(value: bool) -> Self {
        LiveValue::Json(Value::from(value))
    }
}

impl From<Instance> for LiveValue {
    fn from(value: Instance) -> Self {
        LiveValue::Instance(value)
    }
}

impl<T: Into<LiveValue>> From<Option<T>> for LiveValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_else(LiveValue::null)
    }
}

/// Decoded, key-transcoded constructor arguments handed to a builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kwargs(BTreeMap<String, LiveValue>);

impl Kwargs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<LiveValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&LiveValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn take(&mut self, key: &str) -> Option<LiveValue> {
        self.0.remove(key)
    }

    /// Remove and deserialize a plain field. Absent and `null` both yield `None`.
    pub fn take_as<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, BuildError> {
        let Some(value) = self.0.remove(key) else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }
        let json = value.to_json().ok_or_else(|| BuildError::InvalidField {
            field: key.into(),
            reason: "expected plain data, found a component instance".into(),
        })?;
        serde_json::from_value(json)
            .map(Some)
            .map_err(|e| BuildError::InvalidField {
                field: key.into(),
                reason: e.to_string(),
            })
    }

    pub fn require<T: DeserializeOwned>(&mut self, key: &str) -> Result<T, BuildError> {
        self.take_as(key)?
            .ok_or_else(|| BuildError::MissingField(key.into()))
    }

    /// Remove a nested component instance.
    pub fn take_instance(&mut self, key: &str) -> Result<Option<Instance>, BuildError> {
        match self.0.remove(key) {
            None => Ok(None),
            Some(LiveValue::Instance(instance)) => Ok(Some(instance)),
            Some(v) if v.is_null() => Ok(None),
            Some(_) => Err(BuildError::InvalidField {
                field: key.into(),
                reason: "expected a component instance".into(),
            }),
        }
    }

    pub fn require_instance(&mut self, key: &str) -> Result<Instance, BuildError> {
        self.take_instance(key)?
            .ok_or_else(|| BuildError::MissingField(key.into()))
    }

    pub fn into_inner(self) -> BTreeMap<String, LiveValue> {
        self.0
    }
}

impl From<BTreeMap<String, LiveValue>> for Kwargs {
    fn from(map: BTreeMap<String, LiveValue>) -> Self {
        Self(map)
    }
}

impl From<Kwargs> for LiveValue {
    fn from(kwargs: Kwargs) -> Self {
        LiveValue::Map(kwargs.0)
    }
}

impl<K: Into<String>, V: Into<LiveValue>> FromIterator<(K, V)> for Kwargs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
