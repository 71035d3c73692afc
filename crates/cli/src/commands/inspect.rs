//! `rustedclaw inspect`: Classify a snapshot without resolving anything.

use rustedclaw_load::SerializedNode;
use std::collections::BTreeSet;
use std::path::Path;

/// What a snapshot references.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Inspection {
    /// `(path, id)` of every constructor node.
    pub constructors: Vec<(String, String)>,
    /// Distinct secret keys.
    pub secrets: BTreeSet<String>,
    /// Paths of `not_implemented` nodes; loading fails if any exist.
    pub not_implemented: Vec<String>,
    /// Number of escaped user-data objects.
    pub escaped: usize,
}

pub fn summarize(node: &SerializedNode) -> Inspection {
    let mut inspection = Inspection::default();
    node.visit(&mut |path: &[String], node: &SerializedNode| {
        let path = path.join(".");
        match node {
            SerializedNode::Constructor { id, .. } => {
                inspection.constructors.push((path, id.to_string()));
            }
            SerializedNode::Secret { id } => {
                inspection.secrets.insert(id.terminal().to_string());
            }
            SerializedNode::NotImplemented { .. } => inspection.not_implemented.push(path),
            SerializedNode::Escaped(_) => inspection.escaped += 1,
            _ => {}
        }
    });
    inspection
}

pub async fn run(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let node = SerializedNode::from_value(serde_json::from_str(&text)?)?;
    let inspection = summarize(&node);

    println!("🔍 Snapshot: {}", file.display());
    println!("==================");
    println!("  Constructors: {}", inspection.constructors.len());
    for (path, id) in &inspection.constructors {
        println!("    {path:<32} {id}");
    }
    println!("  Secrets:      {}", inspection.secrets.len());
    for key in &inspection.secrets {
        println!("    {key}");
    }
    println!("  Escaped data: {}", inspection.escaped);

    if inspection.not_implemented.is_empty() {
        println!("\n  ✅ No unsupported nodes");
    } else {
        println!("\n  ⚠️  Unsupported nodes (loading will fail):");
        for path in &inspection.not_implemented {
            println!("    {path}");
        }
    }

    Ok(())
}
