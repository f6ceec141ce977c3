use std::ffi::OsString;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogConfig, LogOutput, DEFAULT_LOG_FILTER};

const DEFAULT_JSON_LOG_FILE: &str = "completion-stream.jsonl";

static INSTALLED: OnceCell<bool> = OnceCell::new();

/// Installs the decoder's tracing subscriber, once per process.
///
/// Returns whether a subscriber from this crate is active. The first call
/// decides: later calls return the same answer whatever config they pass.
/// Hosts that already own a global subscriber get `false` and keep theirs.
pub fn init_observability(config: &LogConfig) -> bool {
    *INSTALLED.get_or_init(|| install(config))
}

fn install(config: &LogConfig) -> bool {
    if !config.enabled {
        return false;
    }
    let registry = tracing_subscriber::registry().with(env_filter(config));
    match &config.output {
        LogOutput::Console => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .is_ok(),
        LogOutput::JsonFile(path) => {
            let (dir, file_name) = split_log_path(path);
            if std::fs::create_dir_all(&dir).is_err() {
                return false;
            }
            let writer = tracing_appender::rolling::never(dir, file_name);
            registry
                .with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_current_span(false)
                        .with_writer(writer),
                )
                .try_init()
                .is_ok()
        }
    }
}

/// Explicit directives first, then `RUST_LOG`, then the crate default.
fn env_filter(config: &LogConfig) -> EnvFilter {
    config
        .filter
        .as_deref()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn split_log_path(path: &Path) -> (PathBuf, OsString) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| OsString::from(DEFAULT_JSON_LOG_FILE));
    (dir, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_splits_into_directory_and_file() {
        assert_eq!(
            split_log_path(Path::new("logs/decoder.jsonl")),
            (PathBuf::from("logs"), OsString::from("decoder.jsonl"))
        );
        assert_eq!(
            split_log_path(Path::new("decoder.jsonl")),
            (PathBuf::from("."), OsString::from("decoder.jsonl"))
        );
        assert_eq!(
            split_log_path(Path::new("/")),
            (PathBuf::from("."), OsString::from(DEFAULT_JSON_LOG_FILE))
        );
    }

    #[test]
    fn explicit_filter_wins() {
        let config = LogConfig::default().filter("completion_stream=trace");
        assert_eq!(env_filter(&config).to_string(), "completion_stream=trace");
    }

    #[test]
    fn init_answers_consistently() {
        let first = init_observability(&LogConfig::disabled());
        let second = init_observability(&LogConfig::default());
        assert_eq!(first, second);
    }
}
