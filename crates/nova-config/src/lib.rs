use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once, OnceLock};

use parking_lot::ReentrantMutex;
use thiserror::Error;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

mod diagnostics;
mod schema;
mod validation;

pub use diagnostics::{
    ConfigDiagnostics, ConfigValidationError, ConfigWarning, ValidationDiagnostics,
};
pub use schema::json_schema;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[schemars(deny_unknown_fields)]
/// Top-level Nova configuration loaded from TOML.
///
/// ```toml
/// [logging]
/// level = "info"
///
/// [call_graph]
/// active = true
/// threads = 0
/// ```
///
/// Note: the legacy alias `[callgraph]` is also accepted for `[call_graph]`.
pub struct NovaConfig {
    /// Global logging settings for Nova crates.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Call graph construction settings.
    #[serde(default, alias = "callgraph")]
    pub call_graph: CallGraphConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct CallGraphConfig {
    /// Build and maintain the call graph.
    ///
    /// When disabled the graph still exists but never visits any class, so every
    /// query answers with an empty result.
    #[serde(default = "CallGraphConfig::default_active")]
    pub active: bool,

    /// Worker threads used for the initial bulk visit of all classes.
    ///
    /// `0` picks the number of available CPUs.
    #[serde(default)]
    pub threads: usize,
}

impl CallGraphConfig {
    fn default_active() -> bool {
        true
    }

    /// Number of workers for bulk initialization, never zero.
    pub fn effective_threads(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

impl Default for CallGraphConfig {
    fn default() -> Self {
        Self {
            active: Self::default_active(),
            threads: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level for all Nova crates.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,

    /// Write logs to stderr.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append logs to the given file path.
    ///
    /// If the file cannot be opened, file logging is disabled while other sinks
    /// remain active.
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            // Simple levels should be forgiving about casing and synonyms.
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            // Anything else is treated as an `EnvFilter` directive string.
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// Create the effective `EnvFilter` for Nova tracing.
    ///
    /// `LoggingConfig.level` may be either a simple level (`info`, `debug`, ...)
    /// or a full `tracing_subscriber::EnvFilter` directive string
    /// (`info,nova.callgraph=debug`).
    ///
    /// If `RUST_LOG` is set, it is merged into the resulting filter.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The `Display` of `toml::de::Error` embeds a multi-line source snippet;
        // keep only the message so errors stay on one line in CLI output.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl NovaConfig {
    /// Load a config file from TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    /// Load a config from a TOML string.
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file from TOML and return diagnostics (unknown keys, deprecated keys, and
    /// semantic validation failures).
    pub fn load_from_path_with_diagnostics(
        path: impl AsRef<Path>,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str_with_diagnostics(&text)
    }

    /// Load a config from a TOML string and return diagnostics.
    pub fn load_from_str_with_diagnostics(
        text: &str,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let (config, unknown_keys) =
            diagnostics::deserialize_toml_with_unknown_keys::<NovaConfig>(text)?;

        let mut diagnostics = ConfigDiagnostics {
            unknown_keys,
            ..ConfigDiagnostics::default()
        };

        if let Ok(value) = toml::from_str::<toml::Value>(text) {
            diagnostics.warnings.extend(deprecation_warnings(&value));
        }

        diagnostics.extend_validation(config.validate());

        Ok((config, diagnostics))
    }
}

pub const NOVA_CONFIG_ENV_VAR: &str = "NOVA_CONFIG";

static CONFIG_ENV_LOCK: OnceLock<ReentrantMutex<()>> = OnceLock::new();

fn config_env_lock() -> &'static ReentrantMutex<()> {
    CONFIG_ENV_LOCK.get_or_init(|| ReentrantMutex::new(()))
}

/// Run `f` while holding Nova's config environment lock.
///
/// Environment variables are process-global; tests that temporarily set
/// [`NOVA_CONFIG_ENV_VAR`] wrap the mutation and the discovery in this helper so
/// concurrent discovery never observes the override.
pub fn with_config_env_lock<R>(f: impl FnOnce() -> R) -> R {
    let _guard = config_env_lock().lock();
    f()
}

/// Discover the Nova configuration file for a workspace root.
///
/// Search order:
/// 1) `NOVA_CONFIG` (absolute or relative to `workspace_root`)
/// 2) `nova.toml` in `workspace_root`
/// 3) `.nova.toml` in `workspace_root`
pub fn discover_config_path(workspace_root: &Path) -> Option<PathBuf> {
    let _guard = config_env_lock().lock();
    if let Some(value) = std::env::var_os(NOVA_CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(value);
        let path = if candidate.is_absolute() {
            candidate
        } else {
            workspace_root.join(candidate)
        };
        return Some(path.canonicalize().unwrap_or(path));
    }

    ["nova.toml", ".nova.toml"]
        .into_iter()
        .map(|name| workspace_root.join(name))
        .find(|path| path.is_file())
        .map(|path| path.canonicalize().unwrap_or(path))
}

/// Load the Nova configuration for a workspace root.
///
/// If no config is present, returns [`NovaConfig::default`] and `None`.
pub fn load_for_workspace(
    workspace_root: &Path,
) -> Result<(NovaConfig, Option<PathBuf>), ConfigError> {
    let Some(path) = discover_config_path(workspace_root) else {
        return Ok((NovaConfig::default(), None));
    };

    let config = NovaConfig::load_from_path(&path)?;
    Ok((config, Some(path)))
}

fn deprecation_warnings(value: &toml::Value) -> Vec<ConfigWarning> {
    let mut out = Vec::new();

    if value.get("callgraph").is_some() {
        out.push(ConfigWarning::DeprecatedKey {
            path: "callgraph".to_string(),
            message: "[callgraph] is deprecated; use [call_graph] instead".to_string(),
        });
    }

    out
}

struct MutexFileMakeWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl<'a> MakeWriter<'a> for MutexFileMakeWriter {
    type Writer = MutexFileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        // A writer that panicked mid-line leaves the file usable.
        let guard = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        MutexFileWriter { guard }
    }
}

struct MutexFileWriter<'a> {
    guard: std::sync::MutexGuard<'a, std::fs::File>,
}

impl Write for MutexFileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.guard.flush()
    }
}

static TRACING_INIT: Once = Once::new();

/// Initializes structured `tracing` logging.
///
/// This function is safe to call multiple times; only the first call installs a
/// global subscriber. Later calls (and calls made after another subscriber was
/// installed) are no-ops.
pub fn init_tracing(logging: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = logging.env_filter();

        let file_path = logging.file.clone();
        let file = file_path
            .as_ref()
            .and_then(|path| {
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .ok()
            })
            .map(|file| Arc::new(Mutex::new(file)));
        let file_open_failed = file_path.is_some() && file.is_none();

        let mut make_writer = BoxMakeWriter::new(io::sink);
        if logging.stderr {
            // `cargo test` output capture only works for the stdlib's `print!/eprint!`
            // macros. Using `TestWriter` in debug builds keeps unit tests quiet
            // while still providing real-time logs for `cargo run` workflows.
            if cfg!(debug_assertions) {
                make_writer = BoxMakeWriter::new(tracing_subscriber::fmt::writer::TestWriter::with_stderr);
            } else {
                make_writer = BoxMakeWriter::new(io::stderr);
            }
        }
        if let Some(file) = file {
            make_writer = BoxMakeWriter::new(make_writer.and(MutexFileMakeWriter { file }));
        }

        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if logging.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        if tracing::subscriber::set_global_default(subscriber).is_ok() && file_open_failed {
            if let Some(path) = file_path.as_ref() {
                tracing::warn!(
                    target: "nova.config",
                    path = %path.display(),
                    "failed to open log file; file logging disabled"
                );
            }
        }
    });
}
