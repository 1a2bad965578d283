use std::sync::OnceLock;

use triage_common::observability::{LogConfig, LogFormat};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let log_dir = std::env::temp_dir().join("triage-tests");
        let config = LogConfig {
            app_name: "triage-tests",
            log_dir: Some(log_dir),
            emit_stderr: true,
            format: if std::env::var("TRIAGE_LOG_FORMAT")
                .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "debug".to_string(),
        };

        triage_common::observability::init_logging(config).unwrap_or_default()
    });
}
