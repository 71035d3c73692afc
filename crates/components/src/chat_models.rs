//! Chat model components.

use rustedclaw_load::{BuildError, Buildable, Kwargs, LiveValue, Serializable, TypeDecl};
use serde_json::Value;
use std::any::Any;
use std::fmt;

use crate::llms::redact;

pub const BASE_CHAT_MODEL: TypeDecl = TypeDecl::new("BaseChatModel");

pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic's Messages API as a chat model.
///
/// The type's given name is `ChatAnthropicMessages`; it is addressed on the
/// wire as `ChatAnthropic`.
#[derive(Clone)]
pub struct ChatAnthropic {
    model_name: String,
    temperature: Option<f64>,
    max_tokens: u32,
    api_key: Option<String>,
    kwargs: Kwargs,
}

impl ChatAnthropic {
    pub fn new(model_name: impl Into<String>) -> Self {
        let model_name = model_name.into();
        let mut kwargs = Kwargs::new();
        kwargs.insert("modelName", model_name.clone());
        Self {
            model_name,
            temperature: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            api_key: None,
            kwargs,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self.kwargs.insert("temperature", temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self.kwargs.insert("maxTokens", LiveValue::Json(Value::from(max_tokens)));
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

impl fmt::Debug for ChatAnthropic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatAnthropic")
            .field("model_name", &self.model_name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &redact(&self.api_key))
            .field("kwargs", &self.kwargs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Serializable for ChatAnthropic {
    fn lc_ancestry(&self) -> &'static [TypeDecl] {
        Self::ANCESTRY
    }

    fn lc_namespace(&self) -> &'static [&'static str] {
        &["langchain", "chat_models", "anthropic"]
    }

    fn lc_kwargs(&self) -> LiveValue {
        self.kwargs.clone().into()
    }

    fn lc_field(&self, field: &str) -> Option<LiveValue> {
        match field {
            "modelName" => Some(self.model_name.clone().into()),
            "temperature" => self.temperature.map(LiveValue::from),
            "maxTokens" => Some(LiveValue::Json(Value::from(self.max_tokens))),
            "anthropicApiKey" => self.api_key.clone().map(LiveValue::from),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Buildable for ChatAnthropic {
    const ANCESTRY: &'static [TypeDecl] = &[
        TypeDecl::new("ChatAnthropicMessages")
            .with_lc_name("ChatAnthropic")
            .with_aliases(&[("modelName", "model")])
            .with_secrets(&[("anthropicApiKey", "ANTHROPIC_API_KEY")]),
        BASE_CHAT_MODEL,
    ];

    fn build(mut kwargs: Kwargs) -> Result<Self, BuildError> {
        let stored = kwargs.clone();
        let max_tokens = kwargs.take_as("maxTokens")?.unwrap_or(DEFAULT_MAX_TOKENS);
        if max_tokens == 0 {
            return Err(BuildError::InvalidField {
                field: "maxTokens".into(),
                reason: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            model_name: kwargs
                .take_as("modelName")?
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: kwargs.take_as("temperature")?,
            max_tokens,
            api_key: kwargs.take_as("anthropicApiKey")?,
            kwargs: stored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustedclaw_load::{encode, Instance};
    use serde_json::json;

    #[test]
    fn addressed_by_override_name() {
        let chat = ChatAnthropic::new("claude-3-5-sonnet-latest");
        assert_eq!(
            chat.lc_id().segments(),
            ["langchain", "chat_models", "anthropic", "ChatAnthropic"]
        );
        assert_eq!(Instance::new(chat).debug_label(), "ChatAnthropic");
    }

    #[test]
    fn encode_redacts_key_under_default_wire_name() {
        let chat = ChatAnthropic::new("claude-3-5-sonnet-latest").with_api_key("sk-ant-xyz");
        let value = encode(&chat).to_value();
        assert_eq!(
            value["kwargs"],
            json!({
                "model": "claude-3-5-sonnet-latest",
                "anthropic_api_key": {"lc": 1, "type": "secret", "id": ["ANTHROPIC_API_KEY"]}
            })
        );
    }

    #[test]
    fn setters_are_recorded_in_snapshot() {
        let chat = ChatAnthropic::new("claude-3-5-sonnet-latest")
            .with_temperature(0.5)
            .with_max_tokens(256);
        let value = encode(&chat).to_value();
        assert_eq!(value["kwargs"]["temperature"], json!(0.5));
        assert_eq!(value["kwargs"]["max_tokens"], json!(256));
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let kwargs: Kwargs = [("maxTokens", LiveValue::Json(json!(0)))].into_iter().collect();
        assert!(ChatAnthropic::build(kwargs).is_err());
    }
}
