//! # RustedClaw Components
//!
//! Built-in components that can be snapshotted and revived, plus the
//! [`default_registry`] that maps their wire ids back to builders.
//!
//! | Namespace                 | Exports                         |
//! |---------------------------|---------------------------------|
//! | `prompts/prompt`          | `PromptTemplate`                |
//! | `llms/openai`             | `OpenAI`                        |
//! | `chat_models/anthropic`   | `ChatAnthropic`                 |
//! | `chains/llm`              | `LLMChain`                      |
//! | `schema/messages`         | `HumanMessage`, `AIMessage`     |

pub mod prompts;
pub mod llms;
pub mod chat_models;
pub mod chains;
pub mod messages;
pub mod registry;

pub use prompts::{FormatError, PromptTemplate, TemplateFormat};
pub use llms::OpenAI;
pub use chat_models::ChatAnthropic;
pub use chains::LlmChain;
pub use messages::{AiMessage, HumanMessage};
pub use registry::default_registry;
