use std::path::PathBuf;

use crate::errors::StreamError;

/// Prefix that marks a line as carrying an event frame.
pub const DEFAULT_FRAME_PREFIX: &str = "data: ";

/// Filter used when neither the config nor `RUST_LOG` names one.
pub const DEFAULT_LOG_FILTER: &str = "completion_stream=info";

const FRAME_PREFIX_ENV: &str = "COMPLETION_STREAM_FRAME_PREFIX";
const LOG_ENABLED_ENV: &str = "COMPLETION_STREAM_OBSERVABILITY_ENABLED";
const LOG_FILTER_ENV: &str = "COMPLETION_STREAM_LOG_LEVEL";
const LOG_PATH_ENV: &str = "COMPLETION_STREAM_JSON_LOG_PATH";

/// Where decoder logs go once [`crate::observability::init_observability`] runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LogOutput {
    /// Compact lines on stderr.
    #[default]
    Console,
    /// One JSON object per event, appended to this file.
    JsonFile(PathBuf),
}

/// Tracing subscriber settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogConfig {
    pub enabled: bool,
    /// `EnvFilter` directives; `None` defers to `RUST_LOG`.
    pub filter: Option<String>,
    pub output: LogOutput,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: None,
            output: LogOutput::Console,
        }
    }
}

impl LogConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn filter(mut self, directives: impl Into<String>) -> Self {
        self.filter = Some(directives.into());
        self
    }

    pub fn json_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = LogOutput::JsonFile(path.into());
        self
    }
}

/// Decoder settings shared by every session created from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Lines that do not start with this prefix are ignored.
    pub frame_prefix: String,
    pub log: LogConfig,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderConfig {
    /// Creates a config with the default `data: ` frame prefix.
    pub fn new() -> Self {
        Self {
            frame_prefix: DEFAULT_FRAME_PREFIX.to_string(),
            log: LogConfig::default(),
        }
    }

    /// Builds a config from the process environment.
    ///
    /// - `COMPLETION_STREAM_FRAME_PREFIX`: frame prefix (default `data: `).
    /// - `COMPLETION_STREAM_OBSERVABILITY_ENABLED`: `true`/`false` style flag.
    /// - `COMPLETION_STREAM_LOG_LEVEL`: filter directives, e.g. `debug`.
    /// - `COMPLETION_STREAM_JSON_LOG_PATH`: write JSON lines here instead of stderr.
    pub fn from_env() -> Result<Self, StreamError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`DecoderConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StreamError> {
        let mut config = Self::new();
        if let Some(prefix) = lookup(FRAME_PREFIX_ENV) {
            config.frame_prefix = prefix;
        }
        if let Some(raw) = lookup(LOG_ENABLED_ENV) {
            config.log.enabled = parse_flag(&raw).ok_or_else(|| {
                StreamError::Config(format!("{LOG_ENABLED_ENV} is not a boolean: {raw:?}"))
            })?;
        }
        if let Some(filter) = lookup(LOG_FILTER_ENV).filter(|f| !f.trim().is_empty()) {
            config.log.filter = Some(filter);
        }
        if let Some(path) = lookup(LOG_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            config.log.output = LogOutput::JsonFile(PathBuf::from(path));
        }
        config.validated()
    }

    /// Overrides the frame prefix.
    pub fn frame_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.frame_prefix = prefix.into();
        self
    }

    /// Replaces the log settings.
    pub fn log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Rejects settings the decoder cannot work with.
    pub fn validated(self) -> Result<Self, StreamError> {
        if self.frame_prefix.is_empty() {
            return Err(StreamError::Config(
                "frame prefix must not be empty".into(),
            ));
        }
        Ok(self)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_vars(vars: &[(&str, &str)]) -> Result<DecoderConfig, StreamError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DecoderConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn default_prefix_is_sse_data_field() {
        assert_eq!(DecoderConfig::new().frame_prefix, "data: ");
        assert_eq!(from_vars(&[]).expect("config"), DecoderConfig::new());
    }

    #[test]
    fn validated_rejects_empty_prefix() {
        let result = DecoderConfig::new().frame_prefix("").validated();
        assert!(
            matches!(result, Err(StreamError::Config(message)) if message.contains("frame prefix"))
        );
        assert!(from_vars(&[("COMPLETION_STREAM_FRAME_PREFIX", "")]).is_err());
    }

    #[test]
    fn environment_values_fill_every_setting() {
        let config = from_vars(&[
            ("COMPLETION_STREAM_FRAME_PREFIX", "event-data:"),
            ("COMPLETION_STREAM_OBSERVABILITY_ENABLED", " Off "),
            ("COMPLETION_STREAM_LOG_LEVEL", "completion_stream=debug"),
            ("COMPLETION_STREAM_JSON_LOG_PATH", "logs/decoder.jsonl"),
        ])
        .expect("config");
        assert_eq!(config.frame_prefix, "event-data:");
        assert_eq!(
            config.log,
            LogConfig::disabled()
                .filter("completion_stream=debug")
                .json_file("logs/decoder.jsonl")
        );
    }

    #[test]
    fn blank_log_values_are_ignored() {
        let config = from_vars(&[
            ("COMPLETION_STREAM_LOG_LEVEL", "  "),
            ("COMPLETION_STREAM_JSON_LOG_PATH", ""),
        ])
        .expect("config");
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn unparseable_enable_flag_is_a_config_error() {
        let err = from_vars(&[("COMPLETION_STREAM_OBSERVABILITY_ENABLED", "maybe")])
            .expect_err("invalid flag");
        assert!(matches!(err, StreamError::Config(message) if message.contains("maybe")));
    }
}
