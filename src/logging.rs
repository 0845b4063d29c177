/*!
 * Logging and tracing initialization for extraction runs
 *
 * Events from this crate follow the configured level. The store SDKs are
 * held at `warn` so credential and region problems still show up, and
 * open up to `debug` only when this crate traces. `RUST_LOG` replaces both.
 */

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::ExtractConfig;
use crate::error::{ExtractError, Result};

/// Targets of the object store clients behind the backends
const STORE_SDK_TARGETS: &[&str] = &["aws_config", "aws_sdk_s3", "aws_smithy_runtime", "object_store"];

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber for a run
///
/// Fails with `ExtractError::Config` if the log file cannot be created or a
/// subscriber is already installed.
pub fn init_logging(config: &ExtractConfig) -> Result<()> {
    let filter = build_filter(config)?;
    let output = output_layer(config)?;

    tracing_subscriber::registry()
        .with(output.with_filter(filter))
        .try_init()
        .map_err(|e| ExtractError::Config(format!("Failed to install log subscriber: {}", e)))
}

/// Level requested by the configuration; `verbose` forces debug
fn effective_level(config: &ExtractConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

/// Filter directives used when `RUST_LOG` is unset
fn default_directives(config: &ExtractConfig) -> String {
    let level = effective_level(config);
    let sdk_level = if level == Level::TRACE {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let mut directives = vec![format!("orbit_extract={}", level)];
    directives.extend(
        STORE_SDK_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, sdk_level)),
    );
    directives.join(",").to_ascii_lowercase()
}

fn build_filter(config: &ExtractConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(config)))
        .map_err(|e| ExtractError::Config(format!("Failed to create log filter: {}", e)))
}

/// Compact human output on stdout, or JSON lines with span timings in `log_file`
fn output_layer(config: &ExtractConfig) -> Result<BoxedLayer> {
    match &config.log_file {
        Some(path) => json_file_layer(path),
        None => Ok(fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::NONE)
            .compact()
            .boxed()),
    }
}

fn json_file_layer(path: &Path) -> Result<BoxedLayer> {
    let file = File::create(path).map_err(|e| {
        ExtractError::Config(format!("Failed to create log file {}: {}", path.display(), e))
    })?;

    Ok(fmt::layer()
        .with_writer(Mutex::new(file))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .json()
        .boxed())
}

/// Route debug output of this crate to the test harness
#[cfg(test)]
pub(crate) fn init_test_logging() {
    use std::sync::OnceLock;
    static INIT: OnceLock<()> = OnceLock::new();

    INIT.get_or_init(|| {
        let config = ExtractConfig {
            verbose: true,
            ..Default::default()
        };
        if let Ok(filter) = build_filter(&config) {
            let layer = fmt::layer().with_test_writer().with_target(false).compact();
            // Another test harness may already own the global subscriber
            let _ = tracing_subscriber::registry()
                .with(layer.with_filter(filter))
                .try_init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_verbose_selects_debug() {
        let config = ExtractConfig {
            log_level: LogLevel::Error,
            verbose: true,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::DEBUG);

        let config = ExtractConfig {
            log_level: LogLevel::Warn,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::WARN);
    }

    #[test]
    fn test_store_sdks_capped_at_warn() {
        let directives = default_directives(&ExtractConfig::default());
        assert!(directives.starts_with("orbit_extract=info,"));
        assert!(directives.contains("aws_smithy_runtime=warn"));
        assert!(directives.contains("object_store=warn"));
    }

    #[test]
    fn test_trace_opens_store_sdks() {
        let config = ExtractConfig {
            log_level: LogLevel::Trace,
            ..Default::default()
        };
        let directives = default_directives(&config);
        assert!(directives.starts_with("orbit_extract=trace,"));
        assert!(directives.contains("aws_sdk_s3=debug"));
    }

    #[test]
    fn test_log_file_in_missing_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = ExtractConfig {
            log_file: Some(dir.path().join("missing").join("extract.log")),
            ..Default::default()
        };
        assert!(matches!(
            output_layer(&config),
            Err(ExtractError::Config(_))
        ));
    }

    #[test]
    fn test_json_file_layer_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("extract.log");
        assert!(json_file_layer(&path).is_ok());
        assert!(path.exists());
    }
}
