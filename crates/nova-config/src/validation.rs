use crate::diagnostics::{ConfigValidationError, ConfigWarning, ValidationDiagnostics};
use crate::{LoggingConfig, NovaConfig};

/// Upper bound for `call_graph.threads`; larger pools only add scheduling overhead.
pub(crate) const MAX_CALL_GRAPH_THREADS: usize = 256;

impl NovaConfig {
    /// Validate semantic invariants for a configuration.
    ///
    /// Validation is best-effort: it attempts to report as many problems as possible in one pass.
    #[must_use]
    pub fn validate(&self) -> ValidationDiagnostics {
        let mut out = ValidationDiagnostics::default();

        validate_logging(self, &mut out);
        validate_call_graph(self, &mut out);

        out
    }
}

fn validate_logging(config: &NovaConfig, out: &mut ValidationDiagnostics) {
    let normalized = LoggingConfig::normalize_level_directives(&config.logging.level);
    if !config.logging.level.trim().is_empty()
        && tracing_subscriber::EnvFilter::try_new(normalized.clone()).is_err()
    {
        out.warnings.push(ConfigWarning::LoggingLevelInvalid {
            value: config.logging.level.clone(),
            normalized,
        });
    }

    if let Some(parent) = config
        .logging
        .file
        .as_deref()
        .and_then(|file| file.parent())
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        if !parent.is_dir() {
            out.warnings.push(ConfigWarning::LoggingFileParentMissing {
                resolved: parent.to_path_buf(),
            });
        }
    }
}

fn validate_call_graph(config: &NovaConfig, out: &mut ValidationDiagnostics) {
    let call_graph = &config.call_graph;

    if call_graph.threads > MAX_CALL_GRAPH_THREADS {
        out.errors.push(ConfigValidationError::InvalidValue {
            toml_path: "call_graph.threads".to_string(),
            message: format!("must be <= {MAX_CALL_GRAPH_THREADS}"),
        });
    }

    if !call_graph.active && call_graph.threads != 0 {
        out.warnings.push(ConfigWarning::InvalidValue {
            toml_path: "call_graph.threads".to_string(),
            message: "has no effect when call_graph.active is false".to_string(),
        });
    }
}
