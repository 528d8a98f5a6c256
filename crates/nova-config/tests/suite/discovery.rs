use std::ffi::OsString;
use std::sync::Mutex;

use nova_config::{discover_config_path, load_for_workspace, NovaConfig, NOVA_CONFIG_ENV_VAR};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

static ENV_LOCK: Mutex<()> = Mutex::new(());

struct EnvVarGuard {
    key: &'static str,
    prev: Option<OsString>,
}

impl EnvVarGuard {
    fn set(key: &'static str, value: impl Into<OsString>) -> Self {
        let prev = std::env::var_os(key);
        std::env::set_var(key, value.into());
        Self { key, prev }
    }

    fn unset(key: &'static str) -> Self {
        let prev = std::env::var_os(key);
        std::env::remove_var(key);
        Self { key, prev }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => std::env::set_var(self.key, v),
            None => std::env::remove_var(self.key),
        }
    }
}

#[test]
fn discovers_nova_toml_in_workspace_root() {
    let _lock = ENV_LOCK.lock().expect("ENV_LOCK mutex poisoned");
    let _env = EnvVarGuard::unset(NOVA_CONFIG_ENV_VAR);

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("nova.toml");
    std::fs::write(&config_path, "[call_graph]\nactive = false\n").unwrap();

    let discovered = discover_config_path(dir.path())
        .expect("nova.toml should be discovered when present in workspace root");
    assert_eq!(
        discovered,
        config_path.canonicalize().unwrap_or(config_path),
        "expected config discovery to return the workspace-root nova.toml path"
    );
}

#[test]
fn nova_toml_wins_over_hidden_variant() {
    let _lock = ENV_LOCK.lock().expect("ENV_LOCK mutex poisoned");
    let _env = EnvVarGuard::unset(NOVA_CONFIG_ENV_VAR);

    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("nova.toml"), "[call_graph]\nthreads = 1\n").unwrap();
    std::fs::write(dir.path().join(".nova.toml"), "[call_graph]\nthreads = 2\n").unwrap();

    let (config, _path) = load_for_workspace(dir.path()).unwrap();
    assert_eq!(config.call_graph.threads, 1);
}

#[test]
fn hidden_config_is_discovered() {
    let _lock = ENV_LOCK.lock().expect("ENV_LOCK mutex poisoned");
    let _env = EnvVarGuard::unset(NOVA_CONFIG_ENV_VAR);

    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(".nova.toml"), "[call_graph]\nthreads = 2\n").unwrap();

    let (config, path) = load_for_workspace(dir.path()).unwrap();
    assert!(path.is_some());
    assert_eq!(config.call_graph.threads, 2);
}

#[test]
fn env_override_wins_over_workspace_file() {
    let _lock = ENV_LOCK.lock().expect("ENV_LOCK mutex poisoned");

    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("nova.toml"), "[call_graph]\nactive = true\n").unwrap();

    let override_path = dir.path().join("override.toml");
    std::fs::write(
        &override_path,
        "[call_graph]\nactive = false\n[logging]\nlevel = \"debug\"\n",
    )
    .unwrap();

    let _env = EnvVarGuard::set(NOVA_CONFIG_ENV_VAR, "override.toml");

    let (config, path) = load_for_workspace(dir.path()).unwrap();
    assert!(!config.call_graph.active, "expected override config to be loaded");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(
        path.expect("load_for_workspace should return the resolved config path"),
        override_path.canonicalize().unwrap_or(override_path)
    );
}

#[test]
fn env_override_accepts_absolute_path() {
    let _lock = ENV_LOCK.lock().expect("ENV_LOCK mutex poisoned");

    let dir = tempdir().unwrap();
    let override_path = dir.path().join("override.toml");
    std::fs::write(&override_path, "[call_graph]\nactive = false\n").unwrap();

    let _env = EnvVarGuard::set(NOVA_CONFIG_ENV_VAR, override_path.clone());

    let (config, path) = load_for_workspace(dir.path()).unwrap();
    assert!(!config.call_graph.active);
    assert_eq!(
        path.expect("load_for_workspace should return the resolved config path"),
        override_path.canonicalize().unwrap_or(override_path)
    );
}

#[test]
fn missing_config_returns_defaults() {
    let _lock = ENV_LOCK.lock().expect("ENV_LOCK mutex poisoned");
    let _env = EnvVarGuard::unset(NOVA_CONFIG_ENV_VAR);

    let dir = tempdir().unwrap();
    let (config, path) = load_for_workspace(dir.path()).unwrap();
    assert_eq!(path, None);
    assert_eq!(config, NovaConfig::default());
}

#[test]
fn unreadable_override_is_an_io_error() {
    let _lock = ENV_LOCK.lock().expect("ENV_LOCK mutex poisoned");

    let dir = tempdir().unwrap();
    let _env = EnvVarGuard::set(NOVA_CONFIG_ENV_VAR, dir.path().join("missing.toml"));

    let err = load_for_workspace(dir.path()).unwrap_err();
    assert!(
        matches!(err, nova_config::ConfigError::Io { .. }),
        "unexpected error: {err:?}"
    );
}
