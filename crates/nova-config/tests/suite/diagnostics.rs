use nova_config::{ConfigValidationError, ConfigWarning, NovaConfig};
use pretty_assertions::assert_eq;

#[test]
fn clean_config_has_no_diagnostics() {
    let text = r#"
[logging]
level = "debug"

[call_graph]
active = true
threads = 4
"#;

    let (config, diagnostics) =
        NovaConfig::load_from_str_with_diagnostics(text).expect("config should parse");
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
    assert_eq!(config.call_graph.threads, 4);
}

#[test]
fn unknown_keys_are_reported_with_full_paths() {
    let text = r#"
[call_graph]
actve = false

[loging]
level = "info"
"#;

    let (config, diagnostics) =
        NovaConfig::load_from_str_with_diagnostics(text).expect("config should parse");
    assert!(config.call_graph.active);
    assert_eq!(diagnostics.unknown_keys, vec!["call_graph.actve", "loging"]);
}

#[test]
fn legacy_callgraph_table_warns() {
    let (config, diagnostics) =
        NovaConfig::load_from_str_with_diagnostics("[callgraph]\nactive = false\n")
            .expect("config should parse");
    assert!(!config.call_graph.active);
    assert_eq!(
        diagnostics.warnings,
        vec![ConfigWarning::DeprecatedKey {
            path: "callgraph".to_string(),
            message: "[callgraph] is deprecated; use [call_graph] instead".to_string(),
        }]
    );
}

#[test]
fn oversized_thread_pool_is_an_error() {
    let (_config, diagnostics) =
        NovaConfig::load_from_str_with_diagnostics("[call_graph]\nthreads = 100000\n")
            .expect("config should parse");
    assert!(!diagnostics.is_ok());
    assert_eq!(
        diagnostics.errors,
        vec![ConfigValidationError::InvalidValue {
            toml_path: "call_graph.threads".to_string(),
            message: "must be <= 256".to_string(),
        }]
    );
}

#[test]
fn threads_without_active_graph_warns() {
    let (_config, diagnostics) = NovaConfig::load_from_str_with_diagnostics(
        "[call_graph]\nactive = false\nthreads = 2\n",
    )
    .expect("config should parse");
    assert!(diagnostics.is_ok());
    assert_eq!(
        diagnostics.warnings,
        vec![ConfigWarning::InvalidValue {
            toml_path: "call_graph.threads".to_string(),
            message: "has no effect when call_graph.active is false".to_string(),
        }]
    );
}

#[test]
fn invalid_logging_directive_warns() {
    let (_config, diagnostics) =
        NovaConfig::load_from_str_with_diagnostics("[logging]\nlevel = \"nova=[\"\n")
            .expect("config should parse");
    assert!(matches!(
        diagnostics.warnings.as_slice(),
        [ConfigWarning::LoggingLevelInvalid { .. }]
    ));
}

#[test]
fn logging_file_in_missing_directory_warns() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("missing").join("nova.log");
    let text = format!("[logging]\nfile = {:?}\n", file.display().to_string());

    let (_config, diagnostics) =
        NovaConfig::load_from_str_with_diagnostics(&text).expect("config should parse");
    assert_eq!(
        diagnostics.warnings,
        vec![ConfigWarning::LoggingFileParentMissing {
            resolved: dir.path().join("missing"),
        }]
    );
}
