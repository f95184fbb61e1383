use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const GOVERNMENT_JSON: &str = r#"{
  "category": "government",
  "description": "State institutions",
  "qa_pairs": [
    {
      "id": "gov_capital",
      "question_variants": ["ما هي عاصمة سوريا"],
      "answer": "عاصمة سوريا هي دمشق.",
      "keywords": ["عاصمة"],
      "source": "manual"
    }
  ]
}"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let data_dir = root.join("knowledge");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(data_dir.join("government.json"), GOVERNMENT_JSON).unwrap();
    fs::write(data_dir.join("broken.json"), "{ not json").unwrap();

    let config_content = format!(
        r#"[knowledge]
source = "dir"
dir = "{}"
files = ["government.json", "broken.json"]

[model]
provider = "disabled"

[logging]
level = "warn"
"#,
        data_dir.display()
    );
    let config_path = root.join("sqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_sqa(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sqa"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run sqa")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_classify() {
    let (_tmp, config) = setup_test_env();

    let identity = run_sqa(&config, &["classify", "who are you"]);
    assert!(identity.status.success());
    assert_eq!(stdout(&identity).trim(), "identity");

    let domain = run_sqa(&config, &["classify", "ما هي عاصمة سوريا"]);
    assert_eq!(stdout(&domain).trim(), "domain");

    let general = run_sqa(&config, &["classify", "tell me a joke"]);
    assert_eq!(stdout(&general).trim(), "general");
}

#[test]
fn test_ask_local_answer() {
    let (_tmp, config) = setup_test_env();

    let output = run_sqa(&config, &["ask", "ما هي عاصمة سوريا"]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("عاصمة سوريا هي دمشق."));
    assert!(out.contains("source: local-exact"));
}

#[test]
fn test_ask_with_model_disabled_falls_back() {
    let (_tmp, config) = setup_test_env();

    let output = run_sqa(&config, &["ask", "tell me a joke"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("source: final-fallback"));
}

#[test]
fn test_ask_with_history_file() {
    let (tmp, config) = setup_test_env();
    let history = tmp.path().join("turns.json");
    fs::write(
        &history,
        r#"[{"sender": "user", "content": "hello"}, {"sender": "assistant", "content": "hi there"}]"#,
    )
    .unwrap();

    let output = run_sqa(
        &config,
        &["ask", "who are you", "--history-file", history.to_str().unwrap()],
    );

    assert!(output.status.success());
    assert!(stdout(&output).contains("source: identity"));
}

#[test]
fn test_ask_empty_question_fails() {
    let (_tmp, config) = setup_test_env();

    let output = run_sqa(&config, &["ask", "   "]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("question must not be empty"));
}

#[test]
fn test_match_reports_both_passes() {
    let (_tmp, config) = setup_test_env();

    let output = run_sqa(&config, &["match", "عاصمة سوريا"]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("exact  government/gov_capital via=Variant"));
    assert!(out.contains("fuzzy  government/gov_capital via=Scored score="));
}

#[test]
fn test_categories_reports_failures() {
    let (_tmp, config) = setup_test_env();

    let output = run_sqa(&config, &["categories"]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("government"));
    assert!(out.contains("1 entries in 1 categories"));
    assert!(out.contains("failed: broken.json"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("sqa.toml");
    fs::write(&config, "[cache]\nttl_secs = 0\n").unwrap();

    let output = run_sqa(&config, &["classify", "hello"]);

    assert!(!output.status.success());
}
