//! The registry of built-in components.

use rustedclaw_load::{Builder, BuilderRegistry, Export, Module, DEFAULT_ROOT};
use serde_json::Value;

use crate::chains::LlmChain;
use crate::chat_models::ChatAnthropic;
use crate::llms::{OpenAI, DEFAULT_MODEL};
use crate::messages::{AiMessage, HumanMessage};
use crate::prompts::PromptTemplate;

/// Every built-in component under the `langchain` root.
///
/// `ChatAnthropic` is exported under its given name and found by its wire
/// name through the unique-name fallback.
pub fn default_registry() -> BuilderRegistry {
    BuilderRegistry::new()
        .with_module(
            DEFAULT_ROOT,
            "prompts/prompt",
            Module::new().with_builder(Builder::of::<PromptTemplate>()),
        )
        .with_module(
            DEFAULT_ROOT,
            "llms/openai",
            Module::new()
                .with_builder(Builder::of::<OpenAI>())
                .with_export("DEFAULT_MODEL", Export::Constant(Value::from(DEFAULT_MODEL))),
        )
        .with_module(
            DEFAULT_ROOT,
            "chat_models/anthropic",
            Module::new().with_builder(Builder::of::<ChatAnthropic>()),
        )
        .with_module(
            DEFAULT_ROOT,
            "chains/llm",
            Module::new().with_builder(Builder::of::<LlmChain>()),
        )
        .with_module(
            DEFAULT_ROOT,
            "schema/messages",
            Module::new()
                .with_builder(Builder::of::<HumanMessage>())
                .with_builder(Builder::of::<AiMessage>()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_namespace() {
        let registry = default_registry();
        let listed = registry.list();
        for expected in [
            "langchain/prompts/prompt",
            "langchain/llms/openai",
            "langchain/chat_models/anthropic",
            "langchain/chains/llm",
            "langchain/schema/messages",
        ] {
            assert!(listed.iter().any(|ns| ns == expected), "missing {expected}");
        }
    }

    #[test]
    fn chat_anthropic_exported_under_given_name() {
        let module = default_registry()
            .get(DEFAULT_ROOT, "chat_models/anthropic")
            .unwrap();
        assert_eq!(module.names(), ["ChatAnthropicMessages"]);
    }
}
