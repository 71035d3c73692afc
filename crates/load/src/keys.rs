//! Field-name transcoding between in-memory and wire names.
//!
//! Explicit aliases declared along a type's ancestry always win. Any field
//! without an alias goes through the default rule: camelCase in memory,
//! snake_case on the wire.

use std::collections::BTreeMap;

use crate::serializable::{Declarations, TypeDecl};

/// Default in-memory → wire rule (`modelName` → `model_name`, `openAIApiKey` → `open_ai_api_key`).
pub fn key_to_wire(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Default wire → in-memory rule (`model_name` → `modelName`).
///
/// Keys without an underscore pass through unchanged; leading underscores are kept.
pub fn key_from_wire(key: &str) -> String {
    if !key.contains('_') {
        return key.to_string();
    }
    let trimmed = key.trim_start_matches('_');
    let mut out: String = "_".repeat(key.len() - trimmed.len());
    for (i, part) in trimmed.split('_').filter(|p| !p.is_empty()).enumerate() {
        if i == 0 {
            out.push_str(part);
            continue;
        }
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Bidirectional alias table for one concrete type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    to_wire: BTreeMap<String, String>,
    from_wire: BTreeMap<String, String>,
}

impl AliasTable {
    /// Build from a type's ancestry, using the [`Declarations::fold`] precedence.
    pub fn from_ancestry(ancestry: &[TypeDecl]) -> Self {
        Self::from_aliases(Declarations::fold(ancestry).aliases)
    }

    pub fn from_aliases(to_wire: BTreeMap<String, String>) -> Self {
        let from_wire = to_wire
            .iter()
            .map(|(field, wire)| (wire.clone(), field.clone()))
            .collect();
        Self { to_wire, from_wire }
    }

    pub fn wire_name(&self, field: &str) -> String {
        self.to_wire
            .get(field)
            .cloned()
            .unwrap_or_else(|| key_to_wire(field))
    }

    pub fn field_name(&self, wire: &str) -> String {
        self.from_wire
            .get(wire)
            .cloned()
            .unwrap_or_else(|| key_from_wire(wire))
    }

    /// Rename top-level keys for the wire.
    pub fn encode_keys<V>(&self, fields: BTreeMap<String, V>) -> BTreeMap<String, V> {
        fields
            .into_iter()
            .map(|(k, v)| (self.wire_name(&k), v))
            .collect()
    }

    /// Rename top-level wire keys back to in-memory names.
    pub fn decode_keys<V>(&self, fields: BTreeMap<String, V>) -> BTreeMap<String, V> {
        fields
            .into_iter()
            .map(|(k, v)| (self.field_name(&k), v))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.to_wire.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rule_camel_to_snake() {
        assert_eq!(key_to_wire("temperature"), "temperature");
        assert_eq!(key_to_wire("modelName"), "model_name");
        assert_eq!(key_to_wire("openAIApiKey"), "open_ai_api_key");
        assert_eq!(key_to_wire("maxTokens2"), "max_tokens2");
        assert_eq!(key_to_wire("already_snake"), "already_snake");
    }

    #[test]
    fn default_rule_snake_to_camel() {
        assert_eq!(key_from_wire("model_name"), "modelName");
        assert_eq!(key_from_wire("openAIApiKey"), "openAIApiKey");
        assert_eq!(key_from_wire("input_variables"), "inputVariables");
        assert_eq!(key_from_wire("_private_field"), "_privateField");
    }

    #[test]
    fn explicit_aliases_beat_default_rule() {
        const OPENAI: TypeDecl = TypeDecl::new("OpenAI")
            .with_aliases(&[("modelName", "model"), ("openAIApiKey", "openai_api_key")]);
        let table = AliasTable::from_ancestry(&[OPENAI]);

        assert_eq!(table.wire_name("modelName"), "model");
        assert_eq!(table.wire_name("openAIApiKey"), "openai_api_key");
        assert_eq!(table.wire_name("maxTokens"), "max_tokens");

        assert_eq!(table.field_name("model"), "modelName");
        assert_eq!(table.field_name("openai_api_key"), "openAIApiKey");
        assert_eq!(table.field_name("max_tokens"), "maxTokens");
    }

    #[test]
    fn encode_then_decode_keys_restores_fields() {
        let table = AliasTable::from_aliases(BTreeMap::from([(
            "openAIApiKey".to_string(),
            "openai_api_key".to_string(),
        )]));
        let fields = BTreeMap::from([
            ("openAIApiKey".to_string(), 1),
            ("topP".to_string(), 2),
        ]);
        let wire = table.encode_keys(fields.clone());
        assert!(wire.contains_key("openai_api_key"));
        assert!(wire.contains_key("top_p"));
        assert_eq!(table.decode_keys(wire), fields);
    }
}
