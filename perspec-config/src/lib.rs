//! Loader for Perspec configuration with YAML + environment overlays.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults (every section is optional)
//! 2. a YAML/TOML/JSON file (`with_file` / `with_optional_file`) or inline YAML
//! 3. `PERSPEC__`-prefixed environment variables, `__` between path segments
//!    (`PERSPEC__SERVER__PORT=8080`)
//!
//! String values then go through `${VAR}` expansion. Credentials left blank
//! fall back to the conventional `TWITTER_BEARER_TOKEN` / `OPENAI_API_KEY`
//! variables. [`PerspecConfig::credentials`] is the single place that
//! decides whether the service can talk to its upstreams.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

pub const TWITTER_TOKEN_ENV: &str = "TWITTER_BEARER_TOKEN";
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PerspecConfig {
    pub server: ServerConfig,
    pub twitter: TwitterConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: bool,
    pub request_timeout_secs: u64,
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            cors: true,
            request_timeout_secs: 90,
            worker_threads: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub bearer_token: String,
    pub base_url: String,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            bearer_token: String::new(),
            base_url: "https://api.twitter.com".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI or any endpoint speaking the chat completions protocol.
    #[default]
    Openai,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    /// Per use case (`extract_terms`, `answer_as`, ...) generation overrides.
    pub overrides: HashMap<String, ProfileOverride>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Openai,
            api_key: String::new(),
            endpoint: default_openai_endpoint(),
            model: "gpt-4o-mini".into(),
            overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProfileOverride {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTermsSetting {
    #[default]
    Require,
    FallBackToTimeline,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub token_limit: usize,
    pub analysis_token_limit: usize,
    pub min_words: usize,
    pub search_terms: SearchTermsSetting,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            token_limit: 3400,
            analysis_token_limit: 3500,
            min_words: 5,
            search_terms: SearchTermsSetting::Require,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub app_name: String,
    pub dir: Option<String>,
    pub format: String,
    pub emit_stderr: bool,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: "perspec".into(),
            dir: None,
            format: "text".into(),
            emit_stderr: true,
            filter: "info".into(),
        }
    }
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".into()
}

/// Secrets required before any upstream call may be attempted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub twitter_bearer: String,
    pub llm_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("twitter_bearer", &"<redacted>")
            .field("llm_api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigIssue {
    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

impl PerspecConfig {
    /// Validate that both upstream credentials are present.
    ///
    /// ```
    /// use perspec_config::{ConfigIssue, PerspecConfig};
    ///
    /// let cfg = PerspecConfig::default();
    /// assert_eq!(
    ///     cfg.credentials(),
    ///     Err(ConfigIssue::Missing(vec!["twitter.bearer_token", "llm.api_key"]))
    /// );
    /// ```
    pub fn credentials(&self) -> Result<Credentials, ConfigIssue> {
        let mut missing = Vec::new();
        if !is_usable_secret(&self.twitter.bearer_token) {
            missing.push("twitter.bearer_token");
        }
        if !is_usable_secret(&self.llm.api_key) {
            missing.push("llm.api_key");
        }
        if !missing.is_empty() {
            return Err(ConfigIssue::Missing(missing));
        }
        Ok(Credentials {
            twitter_bearer: self.twitter.bearer_token.trim().to_string(),
            llm_api_key: self.llm.api_key.trim().to_string(),
        })
    }

    fn fill_conventional_env(&mut self) {
        fill_from_env(&mut self.twitter.bearer_token, TWITTER_TOKEN_ENV);
        fill_from_env(&mut self.llm.api_key, OPENAI_KEY_ENV);
    }
}

/// Blank values and unexpanded `${VAR}` placeholders do not count.
fn is_usable_secret(value: &str) -> bool {
    let v = value.trim();
    !v.is_empty() && !v.contains("${")
}

fn fill_from_env(slot: &mut String, var: &str) {
    if is_usable_secret(slot) {
        return;
    }
    if let Ok(value) = std::env::var(var) {
        if is_usable_secret(&value) {
            *slot = value;
        }
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (files + env overrides).
pub struct PerspecConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for PerspecConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PerspecConfigLoader {
    /// Start empty; `PERSPEC__` env overrides are layered on top at [`load`](Self::load).
    ///
    /// ```
    /// use perspec_config::PerspecConfigLoader;
    ///
    /// let config = PerspecConfigLoader::new()
    ///     .with_yaml_str("server:\n  port: 8081")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.server.port, 8081);
    /// assert_eq!(config.pipeline.token_limit, 3400);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a required file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent (env-only deployments).
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// ```
    /// use perspec_config::PerspecConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOC_TWITTER_TOKEN", "from-env"); }
    ///
    /// let config = PerspecConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// twitter:
    ///   bearer_token: "${DOC_TWITTER_TOKEN}"
    /// llm:
    ///   api_key: "sk-test"
    ///   model: "gpt-4o"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// let creds = config.credentials().expect("complete");
    /// assert_eq!(creds.twitter_bearer, "from-env");
    /// assert_eq!(config.llm.model, "gpt-4o");
    /// assert_eq!(config.llm.endpoint, "https://api.openai.com/v1");
    ///
    /// unsafe { std::env::remove_var("DOC_TWITTER_TOKEN"); }
    /// ```
    pub fn load(self) -> Result<PerspecConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("PERSPEC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let mut typed: PerspecConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.fill_conventional_env();

        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("CITY", Some("Winston")), ("STATE", Some("NC"))], || {
            let mut v = json!(["hello-$CITY", { "loc": "${CITY}-${STATE}" }, 42, null]);
            expand_env_in_value(&mut v);
            assert_eq!(v, json!(["hello-Winston", { "loc": "Winston-NC" }, 42, null]));
        });
    }

    #[test]
    fn stops_on_cycles() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn placeholders_do_not_count_as_secrets() {
        assert!(!is_usable_secret("${TWITTER_BEARER_TOKEN}"));
        assert!(!is_usable_secret("  "));
        assert!(is_usable_secret("AAAA"));
    }

    #[test]
    fn missing_credentials_are_listed() {
        let mut cfg = PerspecConfig::default();
        cfg.twitter.bearer_token = "token".into();
        assert_eq!(
            cfg.credentials(),
            Err(ConfigIssue::Missing(vec!["llm.api_key"]))
        );
        cfg.llm.api_key = "sk".into();
        assert!(cfg.credentials().is_ok());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let creds = Credentials {
            twitter_bearer: "tw-secret".into(),
            llm_api_key: "sk-secret".into(),
        };
        let shown = format!("{creds:?}");
        assert!(!shown.contains("secret\""));
        assert!(shown.contains("<redacted>"));
    }
}
