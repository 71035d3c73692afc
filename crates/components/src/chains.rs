//! Chains composed from other components.

use rustedclaw_load::{BuildError, Buildable, Instance, Kwargs, LiveValue, Serializable, TypeDecl};
use std::any::Any;
use tracing::debug;

use crate::prompts::PromptTemplate;

pub const BASE_CHAIN: TypeDecl = TypeDecl::new("BaseChain");

const DEFAULT_OUTPUT_KEY: &str = "text";

/// A prompt piped into a language model.
///
/// Both parts are nested components, so a snapshot of the chain carries
/// their snapshots inline.
#[derive(Debug, Clone)]
pub struct LlmChain {
    prompt: Instance,
    llm: Instance,
    output_key: String,
    kwargs: Kwargs,
}

impl LlmChain {
    pub fn new<L: Serializable>(prompt: PromptTemplate, llm: L) -> Self {
        let prompt = Instance::new(prompt);
        let llm = Instance::new(llm);
        let mut kwargs = Kwargs::new();
        kwargs.insert("prompt", prompt.clone());
        kwargs.insert("llm", llm.clone());
        Self {
            prompt,
            llm,
            output_key: DEFAULT_OUTPUT_KEY.to_string(),
            kwargs,
        }
    }

    pub fn prompt(&self) -> Option<&PromptTemplate> {
        self.prompt.downcast_ref()
    }

    pub fn llm(&self) -> &Instance {
        &self.llm
    }

    pub fn output_key(&self) -> &str {
        &self.output_key
    }
}

impl Serializable for LlmChain {
    fn lc_ancestry(&self) -> &'static [TypeDecl] {
        Self::ANCESTRY
    }

    fn lc_namespace(&self) -> &'static [&'static str] {
        &["langchain", "chains", "llm"]
    }

    fn lc_kwargs(&self) -> LiveValue {
        self.kwargs.clone().into()
    }

    fn lc_field(&self, field: &str) -> Option<LiveValue> {
        match field {
            "prompt" => Some(self.prompt.clone().into()),
            "llm" => Some(self.llm.clone().into()),
            "outputKey" => Some(self.output_key.clone().into()),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Buildable for LlmChain {
    const ANCESTRY: &'static [TypeDecl] = &[TypeDecl::new("LLMChain"), BASE_CHAIN];

    fn build(mut kwargs: Kwargs) -> Result<Self, BuildError> {
        let stored = kwargs.clone();

        let prompt = kwargs.require_instance("prompt")?;
        if !prompt.is::<PromptTemplate>() {
            return Err(BuildError::InvalidField {
                field: "prompt".into(),
                reason: format!("expected a PromptTemplate, found {}", prompt.debug_label()),
            });
        }
        let llm = kwargs.require_instance("llm")?;
        debug!(llm = llm.debug_label(), "Assembled LLM chain");

        Ok(Self {
            prompt,
            llm,
            output_key: kwargs
                .take_as("outputKey")?
                .unwrap_or_else(|| DEFAULT_OUTPUT_KEY.to_string()),
            kwargs: stored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llms::OpenAI;
    use rustedclaw_load::{encode, SerializedNode};

    #[test]
    fn snapshot_nests_components() {
        let prompt = PromptTemplate::new("Summarize: {text}").unwrap();
        let chain = LlmChain::new(prompt, OpenAI::new("gpt-4o-mini").with_api_key("sk-nested"));

        let node = encode(&chain);
        let SerializedNode::Constructor { kwargs, .. } = &node else {
            panic!("expected constructor");
        };
        let SerializedNode::Constructor { id, kwargs: llm_kwargs } = &kwargs["llm"] else {
            panic!("expected nested constructor");
        };
        assert_eq!(id.terminal(), "OpenAI");
        assert_eq!(llm_kwargs["openai_api_key"], SerializedNode::secret("OPENAI_API_KEY"));
        assert!(!node.to_json_string().contains("sk-nested"));
    }

    #[test]
    fn build_requires_prompt_template() {
        let kwargs: Kwargs = [
            ("prompt", Instance::new(OpenAI::new("a"))),
            ("llm", Instance::new(OpenAI::new("b"))),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            LlmChain::build(kwargs),
            Err(BuildError::InvalidField { ref field, .. }) if field == "prompt"
        ));

        let kwargs: Kwargs = [("llm", Instance::new(OpenAI::new("b")))].into_iter().collect();
        assert!(matches!(LlmChain::build(kwargs), Err(BuildError::MissingField(_))));
    }
}
