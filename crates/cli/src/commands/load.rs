//! `rustedclaw load`: Rebuild a snapshot against the built-in registry.

use rustedclaw_components::default_registry;
use rustedclaw_config::LoaderConfig;
use rustedclaw_load::{
    decode, encode_value, LiveValue, LoadError, LoadOptions, Serializable, SerializedNode,
};
use serde_json::Value;
use std::path::Path;
use tracing::info;

use super::inspect::summarize;

const REDACTED: &str = "[REDACTED]";

/// Parse `KEY=VALUE`.
pub fn parse_secret(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    if key.is_empty() {
        return Err("secret key must not be empty".into());
    }
    Ok((key.to_string(), value.to_string()))
}

pub fn options(
    config: LoaderConfig,
    secrets: Vec<(String, String)>,
    no_env: bool,
    max_depth: Option<usize>,
) -> Result<LoadOptions, Box<dyn std::error::Error>> {
    let mut options = config.into_options()?.with_secrets(secrets);
    if no_env {
        options = options.with_secrets_from_env(false);
    }
    if let Some(depth) = max_depth {
        options = options.with_max_depth(depth);
    }
    Ok(options)
}

/// Labels of every instance in a revived tree, depth first.
pub fn instance_labels(value: &LiveValue) -> Vec<String> {
    let mut labels = Vec::new();
    collect_labels(value, &mut labels);
    labels
}

fn collect_labels(value: &LiveValue, labels: &mut Vec<String>) {
    match value {
        LiveValue::Instance(instance) => {
            labels.push(instance.debug_label().to_string());
            collect_labels(&instance.object().lc_kwargs(), labels);
        }
        LiveValue::List(items) => items.iter().for_each(|item| collect_labels(item, labels)),
        LiveValue::Map(entries) => entries.values().for_each(|v| collect_labels(v, labels)),
        LiveValue::Json(_) => {}
    }
}

/// `(key, value)` of every secret the snapshot references that this load
/// can supply, longest value first.
pub fn substituted_secrets(node: &SerializedNode, options: &LoadOptions) -> Vec<(String, String)> {
    let mut secrets: Vec<(String, String)> = summarize(node)
        .secrets
        .into_iter()
        .filter_map(|key| {
            let value = options.secrets_map.get(&key).cloned().or_else(|| {
                options
                    .secrets_from_env
                    .then(|| std::env::var(&key).ok())
                    .flatten()
            })?;
            (!value.is_empty()).then_some((key, value))
        })
        .collect();
    secrets.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    secrets
}

/// Replace every occurrence of a secret value in an encoded tree.
///
/// A string equal to a secret becomes that secret's placeholder; a string
/// merely containing one has it replaced with `[REDACTED]`.
pub fn mask_secrets(node: SerializedNode, secrets: &[(String, String)]) -> SerializedNode {
    match node {
        SerializedNode::Plain(Value::String(text)) => {
            match secrets.iter().find(|(_, value)| *value == text) {
                Some((key, _)) => SerializedNode::secret(key.clone()),
                None => SerializedNode::Plain(Value::String(mask_text(&text, secrets))),
            }
        }
        SerializedNode::List(items) => {
            SerializedNode::List(items.into_iter().map(|n| mask_secrets(n, secrets)).collect())
        }
        SerializedNode::Map(entries) => SerializedNode::Map(
            entries
                .into_iter()
                .map(|(k, v)| (mask_text(&k, secrets), mask_secrets(v, secrets)))
                .collect(),
        ),
        SerializedNode::Constructor { id, kwargs } => SerializedNode::Constructor {
            id,
            kwargs: kwargs
                .into_iter()
                .map(|(k, v)| (k, mask_secrets(v, secrets)))
                .collect(),
        },
        SerializedNode::Escaped(value) => SerializedNode::Escaped(mask_json(value, secrets)),
        other => other,
    }
}

fn mask_json(value: Value, secrets: &[(String, String)]) -> Value {
    match value {
        Value::String(text) => Value::String(mask_text(&text, secrets)),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| mask_json(v, secrets)).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (mask_text(&k, secrets), mask_json(v, secrets)))
                .collect(),
        ),
        other => other,
    }
}

pub fn mask_text(text: &str, secrets: &[(String, String)]) -> String {
    secrets
        .iter()
        .fold(text.to_string(), |acc, (_, value)| acc.replace(value.as_str(), REDACTED))
}

fn parse(text: &str) -> Result<SerializedNode, LoadError> {
    SerializedNode::from_value(serde_json::from_str(text)?)
}

pub async fn run(
    file: &Path,
    secrets: Vec<(String, String)>,
    no_env: bool,
    max_depth: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = LoaderConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let options = options(config, secrets, no_env, max_depth)?;

    let text = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;

    let node = match parse(&text) {
        Ok(node) => node,
        Err(e) => {
            println!("   ❌ Load failed: {e}");
            return Err(e.into());
        }
    };
    let supplied = substituted_secrets(&node, &options);

    let registry = default_registry();
    let revived = match decode(&node, &registry, &options).await {
        Ok(value) => value,
        Err(e) => {
            let message = mask_text(&e.to_string(), &supplied);
            println!("   ❌ Load failed: {message}");
            return Err(message.into());
        }
    };

    let labels = instance_labels(&revived);
    info!(instances = labels.len(), "Snapshot loaded");
    println!("   ✅ Loaded {} component(s): {}", labels.len(), labels.join(", "));
    println!();

    // Re-encode, then mask values the declared secret paths did not cover.
    let output = mask_secrets(encode_value(&revived), &supplied);
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustedclaw_components::{default_registry, LlmChain, OpenAI, PromptTemplate};
    use rustedclaw_load::Instance;
    use serde_json::json;

    #[test]
    fn parse_secret_splits_on_first_equals() {
        assert_eq!(
            parse_secret("OPENAI_API_KEY=sk=abc").unwrap(),
            ("OPENAI_API_KEY".to_string(), "sk=abc".to_string())
        );
        assert!(parse_secret("NOVALUE").is_err());
        assert!(parse_secret("=value").is_err());
    }

    #[test]
    fn flags_override_config() {
        let options = options(
            LoaderConfig::default(),
            vec![("K".into(), "v".into())],
            true,
            Some(5),
        )
        .unwrap();
        assert!(!options.secrets_from_env);
        assert_eq!(options.max_depth, 5);
        assert_eq!(options.secrets_map["K"], "v");
    }

    #[test]
    fn labels_cover_nested_instances() {
        let chain = LlmChain::new(PromptTemplate::new("{q}").unwrap(), OpenAI::new("m"));
        let labels = instance_labels(&LiveValue::Instance(Instance::new(chain)));
        // Fields are visited in key order: `llm` before `prompt`.
        assert_eq!(labels, ["LLMChain", "OpenAI", "PromptTemplate"]);
    }

    #[tokio::test]
    async fn undeclared_secrets_are_masked_in_output() {
        let node = SerializedNode::from_value(json!({
            "lc": 1, "type": "constructor",
            "id": ["langchain", "schema", "messages", "HumanMessage"],
            "kwargs": {
                "content": "hi",
                "metadata": {"token": {"lc": 1, "type": "secret", "id": ["MSG_TOKEN"]}},
                "tags": [{"lc": 1, "type": "secret", "id": ["MSG_TOKEN"]}]
            }
        }))
        .unwrap();
        let options = LoadOptions::new()
            .with_secrets_from_env(false)
            .with_secret("MSG_TOKEN", "sk-plaintext");

        let supplied = substituted_secrets(&node, &options);
        assert_eq!(supplied, [("MSG_TOKEN".to_string(), "sk-plaintext".to_string())]);

        let revived = decode(&node, &default_registry(), &options).await.unwrap();
        let masked = mask_secrets(encode_value(&revived), &supplied);
        let printed = serde_json::to_string(&masked).unwrap();
        assert!(!printed.contains("sk-plaintext"));

        let value = masked.to_value();
        let placeholder = json!({"lc": 1, "type": "secret", "id": ["MSG_TOKEN"]});
        assert_eq!(value["kwargs"]["metadata"]["token"], placeholder);
        assert_eq!(value["kwargs"]["tags"][0], placeholder);
    }

    #[test]
    fn embedded_secret_is_redacted() {
        let secrets = [("K".to_string(), "sk-123".to_string())];
        let masked = mask_secrets(SerializedNode::Plain(json!("Bearer sk-123")), &secrets);
        assert_eq!(masked, SerializedNode::Plain(json!("Bearer [REDACTED]")));

        let escaped = mask_secrets(SerializedNode::Escaped(json!({"lc": 1, "v": ["sk-123"]})), &secrets);
        assert_eq!(escaped, SerializedNode::Escaped(json!({"lc": 1, "v": ["[REDACTED]"]})));
    }

    #[test]
    fn env_secrets_only_counted_when_enabled() {
        let node = SerializedNode::secret("PATH");
        assert!(substituted_secrets(&node, &LoadOptions::new().with_secrets_from_env(false)).is_empty());
        let supplied = substituted_secrets(&node, &LoadOptions::new());
        assert_eq!(supplied.len(), usize::from(std::env::var("PATH").is_ok_and(|v| !v.is_empty())));
    }
}
