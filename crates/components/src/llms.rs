//! Completion-style LLM components.

use rustedclaw_load::{BuildError, Buildable, Kwargs, LiveValue, Serializable, TypeDecl};
use serde_json::Value;
use std::any::Any;
use std::fmt;

/// Shared ancestor of every completion LLM.
pub const BASE_LLM: TypeDecl = TypeDecl::new("BaseLLM");

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-instruct";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// The OpenAI completions model.
///
/// The API key and organization are declared secrets: snapshots carry
/// `OPENAI_API_KEY` / `OPENAI_ORGANIZATION` placeholders, never the values.
#[derive(Clone)]
pub struct OpenAI {
    model_name: String,
    temperature: f64,
    max_tokens: Option<u32>,
    api_key: Option<String>,
    organization: Option<String>,
    kwargs: Kwargs,
}

impl OpenAI {
    pub fn new(model_name: impl Into<String>) -> Self {
        let model_name = model_name.into();
        let mut kwargs = Kwargs::new();
        kwargs.insert("modelName", model_name.clone());
        Self {
            model_name,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            api_key: None,
            organization: None,
            kwargs,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self.kwargs.insert("temperature", temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self.kwargs.insert("maxTokens", LiveValue::Json(Value::from(max_tokens)));
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    /// The arguments this instance was constructed with.
    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }
}

impl fmt::Debug for OpenAI {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAI")
            .field("model_name", &self.model_name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &redact(&self.api_key))
            .field("organization", &redact(&self.organization))
            .field("kwargs", &self.kwargs.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Debug rendering of an optional secret.
pub(crate) fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl Serializable for OpenAI {
    fn lc_ancestry(&self) -> &'static [TypeDecl] {
        Self::ANCESTRY
    }

    fn lc_namespace(&self) -> &'static [&'static str] {
        &["langchain", "llms", "openai"]
    }

    fn lc_kwargs(&self) -> LiveValue {
        self.kwargs.clone().into()
    }

    fn lc_field(&self, field: &str) -> Option<LiveValue> {
        match field {
            "modelName" => Some(self.model_name.clone().into()),
            "temperature" => Some(self.temperature.into()),
            "maxTokens" => self.max_tokens.map(|n| LiveValue::Json(Value::from(n))),
            "openAIApiKey" => self.api_key.clone().map(LiveValue::from),
            "organization" => self.organization.clone().map(LiveValue::from),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Buildable for OpenAI {
    const ANCESTRY: &'static [TypeDecl] = &[
        TypeDecl::new("OpenAI")
            .with_aliases(&[("modelName", "model"), ("openAIApiKey", "openai_api_key")])
            .with_secrets(&[
                ("openAIApiKey", "OPENAI_API_KEY"),
                ("organization", "OPENAI_ORGANIZATION"),
            ]),
        BASE_LLM,
    ];

    fn build(mut kwargs: Kwargs) -> Result<Self, BuildError> {
        let stored = kwargs.clone();

        let temperature = kwargs.take_as("temperature")?.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(BuildError::InvalidField {
                field: "temperature".into(),
                reason: format!("{temperature} is outside 0.0..=2.0"),
            });
        }

        Ok(Self {
            model_name: kwargs
                .take_as("modelName")?
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature,
            max_tokens: kwargs.take_as("maxTokens")?,
            api_key: kwargs.take_as("openAIApiKey")?,
            organization: kwargs.take_as("organization")?,
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
    fn build_applies_defaults() {
        let llm = OpenAI::build(Kwargs::new()).unwrap();
        assert_eq!(llm.model_name(), DEFAULT_MODEL);
        assert_eq!(llm.temperature(), DEFAULT_TEMPERATURE);
        assert!(llm.api_key().is_none());
    }

    #[test]
    fn build_rejects_out_of_range_temperature() {
        let kwargs: Kwargs = [("temperature", LiveValue::from(3.5))].into_iter().collect();
        assert!(matches!(
            OpenAI::build(kwargs),
            Err(BuildError::InvalidField { ref field, .. }) if field == "temperature"
        ));
    }

    #[test]
    fn encode_uses_aliases_and_current_values() {
        let llm = OpenAI::new("gpt-4o-mini").with_temperature(0.2).with_max_tokens(64);
        let node = encode(&llm).to_value();
        assert_eq!(node["id"], json!(["langchain", "llms", "openai", "OpenAI"]));
        assert_eq!(
            node["kwargs"],
            json!({"model": "gpt-4o-mini", "temperature": 0.2, "max_tokens": 64})
        );
    }

    #[test]
    fn setters_survive_rebuild_from_kwargs() {
        let llm = OpenAI::new("m").with_temperature(0.2).with_max_tokens(64);
        let rebuilt = OpenAI::build(llm.kwargs().clone()).unwrap();
        assert_eq!(rebuilt.temperature(), 0.2);
        assert_eq!(rebuilt.max_tokens(), Some(64));
    }

    #[test]
    fn api_key_set_after_construction_is_still_redacted() {
        let llm = OpenAI::new("gpt-4o-mini")
            .with_api_key("sk-live-123")
            .with_organization("org-9");
        let node = encode(&llm);
        let SerializedNode::Constructor { kwargs, .. } = &node else {
            panic!("expected constructor");
        };
        assert_eq!(kwargs["openai_api_key"], SerializedNode::secret("OPENAI_API_KEY"));
        assert_eq!(kwargs["organization"], SerializedNode::secret("OPENAI_ORGANIZATION"));
        assert!(!node.to_json_string().contains("sk-live-123"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let kwargs: Kwargs = [("openAIApiKey", LiveValue::from("sk-debug"))].into_iter().collect();
        let llm = OpenAI::build(kwargs).unwrap();
        let debug = format!("{llm:?}");
        assert!(!debug.contains("sk-debug"));
        assert!(debug.contains("[REDACTED]"));
    }
}
