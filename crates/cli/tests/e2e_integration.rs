//! End-to-end tests for the `rustedclaw` binary.
//!
//! Each test runs the built binary with `HOME` pointed at a scratch
//! directory, so no user configuration leaks in.

use std::path::Path;
use std::process::{Command, Output};

const SNAPSHOT: &str = r#"{
  "lc": 1,
  "type": "constructor",
  "id": ["langchain", "chains", "llm", "LLMChain"],
  "kwargs": {
    "prompt": {
      "lc": 1, "type": "constructor", "id": ["langchain", "prompts", "prompt", "PromptTemplate"],
      "kwargs": {"template": "Summarize: {text}", "input_variables": ["text"]}
    },
    "llm": {
      "lc": 1, "type": "constructor", "id": ["langchain", "llms", "openai", "OpenAI"],
      "kwargs": {"model": "gpt-4o-mini", "openai_api_key": {"lc": 1, "type": "secret", "id": ["E2E_OPENAI_KEY_5d1f"]}}
    }
  }
}"#;

fn rustedclaw(home: &Path, args: &[&str]) -> Output {
    rustedclaw_with_env(home, args, &[])
}

fn rustedclaw_with_env(home: &Path, args: &[&str], vars: &[(&str, &str)]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rustedclaw"))
        .args(args)
        .env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("RUST_LOG")
        .env_remove("RUSTEDCLAW_LOAD_MAX_DEPTH")
        .env_remove("RUSTEDCLAW_LOAD_SECRETS_FROM_ENV")
        .env_remove("E2E_OPENAI_KEY_5d1f")
        .env_remove("E2E_MSG_TOKEN_7a3c")
        .envs(vars.iter().copied())
        .output()
        .expect("failed to run rustedclaw")
}

fn write_snapshot(dir: &Path, text: &str) -> String {
    let path = dir.join("snapshot.json");
    std::fs::write(&path, text).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn inspect_lists_references() {
    let home = tempfile::tempdir().unwrap();
    let file = write_snapshot(home.path(), SNAPSHOT);

    let output = rustedclaw(home.path(), &["inspect", &file]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("langchain.chains.llm.LLMChain"));
    assert!(stdout.contains("langchain.llms.openai.OpenAI"));
    assert!(stdout.contains("E2E_OPENAI_KEY_5d1f"));
    assert!(stdout.contains("No unsupported nodes"));
}

#[test]
fn load_with_secret_prints_redacted_tree() {
    let home = tempfile::tempdir().unwrap();
    let file = write_snapshot(home.path(), SNAPSHOT);

    let output = rustedclaw(
        home.path(),
        &["load", &file, "--secret", "E2E_OPENAI_KEY_5d1f=sk-e2e-secret"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("LLMChain"));
    assert!(stdout.contains("OPENAI_API_KEY"));
    assert!(!stdout.contains("sk-e2e-secret"));
}

const UNDECLARED_SECRET_SNAPSHOT: &str = r#"{
  "lc": 1,
  "type": "constructor",
  "id": ["langchain", "schema", "messages", "HumanMessage"],
  "kwargs": {
    "content": "hi",
    "metadata": {"token": {"lc": 1, "type": "secret", "id": ["E2E_MSG_TOKEN_7a3c"]}}
  }
}"#;

#[test]
fn load_masks_secrets_outside_declared_paths() {
    let home = tempfile::tempdir().unwrap();
    let file = write_snapshot(home.path(), UNDECLARED_SECRET_SNAPSHOT);

    let from_flag = rustedclaw(
        home.path(),
        &["load", &file, "--secret", "E2E_MSG_TOKEN_7a3c=sk-plaintext-e2e"],
    );
    let from_env = rustedclaw_with_env(
        home.path(),
        &["load", &file],
        &[("E2E_MSG_TOKEN_7a3c", "sk-plaintext-e2e")],
    );

    for output in [from_flag, from_env] {
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("HumanMessage"));
        assert!(stdout.contains("E2E_MSG_TOKEN_7a3c"));
        assert!(!stdout.contains("sk-plaintext-e2e"));
        assert!(!String::from_utf8_lossy(&output.stderr).contains("sk-plaintext-e2e"));
    }
}

#[test]
fn load_without_secret_fails() {
    let home = tempfile::tempdir().unwrap();
    let file = write_snapshot(home.path(), SNAPSHOT);

    let output = rustedclaw(home.path(), &["load", &file, "--no-env"]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Missing secret"));
    assert!(stdout.contains("$.kwargs.llm.kwargs.openai_api_key"));
}

#[test]
fn load_rejects_not_implemented() {
    let home = tempfile::tempdir().unwrap();
    let file = write_snapshot(
        home.path(),
        r#"{"lc": 1, "type": "not_implemented", "id": ["langchain", "tools", "Shell"]}"#,
    );

    let output = rustedclaw(home.path(), &["load", &file]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("doesn't implement serialization"));
}

#[test]
fn config_reads_load_toml() {
    let home = tempfile::tempdir().unwrap();
    let output = rustedclaw(home.path(), &["config"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("max_depth = 50"));

    let dir = home.path().join(".rustedclaw");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("load.toml"), "max_depth = 12\n").unwrap();

    let output = rustedclaw(home.path(), &["config"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("max_depth = 12"));
}
