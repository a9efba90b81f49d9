use std::sync::OnceLock;

use perspec_common::observability::{LogConfig, LogFormat};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "perspec-tests".to_string(),
            log_dir: Some(std::env::temp_dir().join("perspec-tests")),
            emit_stderr: true,
            format: LogFormat::from_name(
                &std::env::var("PERSPEC_LOG_FORMAT").unwrap_or_default(),
            ),
            default_filter: "debug".to_string(),
        };

        perspec_common::observability::init_logging(config).unwrap_or_default()
    });
}
