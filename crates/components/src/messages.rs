//! Chat messages.
//!
//! `additionalKwargs` is free-form provider data. It is carried as plain
//! data, so protocol-shaped objects inside it are escaped on the wire and
//! never revived.

use rustedclaw_load::{BuildError, Buildable, Kwargs, LiveValue, Serializable, TypeDecl};
use serde_json::{Map, Value};
use std::any::Any;

pub const BASE_MESSAGE: TypeDecl = TypeDecl::new("BaseMessage");

const NAMESPACE: &[&str] = &["langchain", "schema", "messages"];

#[derive(Debug, Clone, Default, PartialEq)]
struct MessageFields {
    content: String,
    additional_kwargs: Map<String, Value>,
}

impl MessageFields {
    fn new(content: String, additional_kwargs: Map<String, Value>) -> (Self, Kwargs) {
        let mut kwargs = Kwargs::new();
        kwargs.insert("content", content.clone());
        if !additional_kwargs.is_empty() {
            kwargs.insert("additionalKwargs", Value::Object(additional_kwargs.clone()));
        }
        (
            Self {
                content,
                additional_kwargs,
            },
            kwargs,
        )
    }

    fn from_kwargs(kwargs: &mut Kwargs) -> Result<Self, BuildError> {
        Ok(Self {
            content: kwargs.require("content")?,
            additional_kwargs: kwargs.take_as("additionalKwargs")?.unwrap_or_default(),
        })
    }

    fn field(&self, field: &str) -> Option<LiveValue> {
        match field {
            "content" => Some(self.content.clone().into()),
            "additionalKwargs" => Some(LiveValue::Json(Value::Object(self.additional_kwargs.clone()))),
            _ => None,
        }
    }
}

/// A message from the user.
#[derive(Debug, Clone)]
pub struct HumanMessage {
    fields: MessageFields,
    kwargs: Kwargs,
}

impl HumanMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_additional_kwargs(content, Map::new())
    }

    pub fn with_additional_kwargs(content: impl Into<String>, additional_kwargs: Map<String, Value>) -> Self {
        let (fields, kwargs) = MessageFields::new(content.into(), additional_kwargs);
        Self { fields, kwargs }
    }

    pub fn content(&self) -> &str {
        &self.fields.content
    }

    pub fn additional_kwargs(&self) -> &Map<String, Value> {
        &self.fields.additional_kwargs
    }
}

impl Serializable for HumanMessage {
    fn lc_ancestry(&self) -> &'static [TypeDecl] {
        Self::ANCESTRY
    }

    fn lc_namespace(&self) -> &'static [&'static str] {
        NAMESPACE
    }

    fn lc_kwargs(&self) -> LiveValue {
        self.kwargs.clone().into()
    }

    fn lc_field(&self, field: &str) -> Option<LiveValue> {
        self.fields.field(field)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Buildable for HumanMessage {
    const ANCESTRY: &'static [TypeDecl] = &[TypeDecl::new("HumanMessage"), BASE_MESSAGE];

    fn build(mut kwargs: Kwargs) -> Result<Self, BuildError> {
        let stored = kwargs.clone();
        Ok(Self {
            fields: MessageFields::from_kwargs(&mut kwargs)?,
            kwargs: stored,
        })
    }
}

/// A message produced by a model.
#[derive(Debug, Clone)]
pub struct AiMessage {
    fields: MessageFields,
    kwargs: Kwargs,
}

impl AiMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_additional_kwargs(content, Map::new())
    }

    pub fn with_additional_kwargs(content: impl Into<String>, additional_kwargs: Map<String, Value>) -> Self {
        let (fields, kwargs) = MessageFields::new(content.into(), additional_kwargs);
        Self { fields, kwargs }
    }

    pub fn content(&self) -> &str {
        &self.fields.content
    }

    pub fn additional_kwargs(&self) -> &Map<String, Value> {
        &self.fields.additional_kwargs
    }
}

impl Serializable for AiMessage {
    fn lc_ancestry(&self) -> &'static [TypeDecl] {
        Self::ANCESTRY
    }

    fn lc_namespace(&self) -> &'static [&'static str] {
        NAMESPACE
    }

    fn lc_kwargs(&self) -> LiveValue {
        self.kwargs.clone().into()
    }

    fn lc_field(&self, field: &str) -> Option<LiveValue> {
        self.fields.field(field)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Buildable for AiMessage {
    const ANCESTRY: &'static [TypeDecl] = &[TypeDecl::new("AIMessage"), BASE_MESSAGE];

    fn build(mut kwargs: Kwargs) -> Result<Self, BuildError> {
        let stored = kwargs.clone();
        Ok(Self {
            fields: MessageFields::from_kwargs(&mut kwargs)?,
            kwargs: stored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustedclaw_load::{encode, SerializedNode};
    use serde_json::json;

    #[test]
    fn protocol_shaped_data_is_escaped() {
        let extra = json!({
            "function_call": {"lc": 1, "type": "secret", "id": ["OPENAI_API_KEY"]},
            "plain": {"n": 1}
        });
        let Value::Object(extra) = extra else {
            unreachable!()
        };
        let message = AiMessage::with_additional_kwargs("done", extra);

        let node = encode(&message);
        let SerializedNode::Constructor { id, kwargs } = &node else {
            panic!("expected constructor");
        };
        assert_eq!(id.terminal(), "AIMessage");
        let SerializedNode::Map(extra) = &kwargs["additional_kwargs"] else {
            panic!("expected map");
        };
        assert!(matches!(extra["function_call"], SerializedNode::Escaped(_)));
        assert!(matches!(extra["plain"], SerializedNode::Map(_)));
    }

    #[test]
    fn build_requires_content() {
        assert!(matches!(
            HumanMessage::build(Kwargs::new()),
            Err(BuildError::MissingField(ref f)) if f == "content"
        ));
        let kwargs: Kwargs = [("content", "hi")].into_iter().collect();
        let message = HumanMessage::build(kwargs).unwrap();
        assert_eq!(message.content(), "hi");
        assert!(message.additional_kwargs().is_empty());
    }
}
