use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;
use triage_common::LlmConfig;
use triage_common::observability::LogFormat;
use triage_config::{Provider, TriageConfigLoader};

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
#[serial]
fn loads_file_and_expands_key() {
    let tmp = TempDir::new().unwrap();
    let file_yaml = r#"
llm:
  provider: openai
  model: "gpt-4o-mini"
  api_key: "${TRIAGE_TEST_OPENAI_KEY}"
  temperature: 0.2
  max_tokens: 512
retry:
  max_retries: 2
  base_delay_ms: 250
logging:
  format: json
  stderr: true
"#;
    let p = write_yaml(&tmp, "triage.yaml", file_yaml);

    temp_env::with_var("TRIAGE_TEST_OPENAI_KEY", Some("sk-test"), || {
        let config = TriageConfigLoader::new()
            .with_file(&p)
            .load()
            .expect("load config");

        assert_eq!(config.llm.provider, Provider::OpenAi);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.base_delay().as_millis(), 250);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.logging.stderr);

        match config.llm_config().expect("resolved") {
            LlmConfig::OpenAi { api_key, model, .. } => {
                assert_eq!(api_key, "sk-test");
                assert_eq!(model, "gpt-4o-mini");
            }
            other => panic!("expected OpenAI configuration, got {other:?}"),
        }
    });
}

#[test]
#[serial]
fn environment_overrides_file() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(
        &tmp,
        "triage.yaml",
        "llm:\n  provider: ollama\n  model: llama3\nretry:\n  max_retries: 5\n",
    );

    temp_env::with_vars(
        [
            ("TRIAGE__LLM__MODEL", Some("mistral")),
            ("TRIAGE__RETRY__MAX_RETRIES", Some("1")),
        ],
        || {
            let config = TriageConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load config");
            assert_eq!(config.llm.model.as_deref(), Some("mistral"));
            assert_eq!(config.retry.max_retries, 1);
        },
    );
}

#[test]
#[serial]
fn optional_file_may_be_missing() {
    let tmp = TempDir::new().unwrap();
    let config = TriageConfigLoader::new()
        .with_optional_file(tmp.path().join("absent.yaml"))
        .load()
        .expect("defaults load");

    assert_eq!(config.llm.provider, Provider::Gemini);
    assert_eq!(config.retry.max_retries, 3);
    assert_eq!(config.retry.base_delay_ms, 1000);
    assert_eq!(config.logging.filter, "info");
}

#[test]
#[serial]
fn required_file_must_exist() {
    let tmp = TempDir::new().unwrap();
    let result = TriageConfigLoader::new()
        .with_file(tmp.path().join("absent.yaml"))
        .load();
    assert!(result.is_err());
}

#[test]
#[serial]
fn shipped_example_loads() {
    let example = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../triage.example.yaml");
    temp_env::with_var("GEMINI_API_KEY", Some("g-example"), || {
        let config = TriageConfigLoader::new()
            .with_file(&example)
            .load()
            .expect("example parses");
        assert_eq!(config.llm.provider, Provider::Gemini);
        assert_eq!(config.llm.max_tokens, Some(2048));
        assert!(matches!(
            config.llm_config().expect("key from env"),
            LlmConfig::Gemini { api_key, .. } if api_key == "g-example"
        ));
    });
}
