use event_webhook::config::{ConfigError, ConfigLoader};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

const REQUIRED: &str = "EVENTS_HTTP_PORT=8080\n\
EVENTS_AWS_ACCESS_KEY_ID=AKIDEXAMPLE\n\
EVENTS_AWS_SECRET_ACCESS_KEY=secret\n\
EVENTS_AWS_REGION=us-west-2\n\
EVENTS_DYNAMO_TABLE=events\n";

const MANAGED_VARS: &[&str] = &[
    "EVENTS_PROFILE",
    "EVENTS_BIND_HOST",
    "EVENTS_HTTP_PORT",
    "EVENTS_HTTPS_PORT",
    "EVENTS_TLS_CERT_PATH",
    "EVENTS_TLS_KEY_PATH",
    "EVENTS_LOG_LEVEL",
    "EVENTS_LOG_FORMAT",
    "EVENTS_MAX_BODY_KB",
    "EVENTS_SHUTDOWN_GRACE_SECONDS",
    "EVENTS_AWS_PROFILE",
    "EVENTS_AWS_ACCESS_KEY_ID",
    "EVENTS_AWS_SECRET_ACCESS_KEY",
    "EVENTS_AWS_REGION",
    "EVENTS_DYNAMO_ENDPOINT",
    "EVENTS_DYNAMO_TABLE",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    for key in MANAGED_VARS {
        unsafe {
            env::remove_var(key);
        }
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

fn loader(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::with_base_dir(PathBuf::from(dir.path()))
}

#[test]
fn loads_defaults_when_only_required_values_present() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", REQUIRED);

    let cfg = loader(&temp_dir).load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.bind_host, "0.0.0.0");
    assert_eq!(cfg.http_port, Some(8080));
    assert_eq!(cfg.https_port, None);
    assert_eq!(cfg.tls_cert_path, PathBuf::from("localhost.crt"));
    assert_eq!(cfg.tls_key_path, PathBuf::from("localhost.key"));
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.log_format, "json");
    assert_eq!(cfg.max_body_bytes(), 1024 * 1024);
    assert_eq!(cfg.table_name().unwrap(), "events");
    assert_eq!(cfg.aws_region.as_deref(), Some("us-west-2"));
    assert!(cfg.dynamo_endpoint.is_none());
    clear_env();
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        &format!("{REQUIRED}EVENTS_DYNAMO_TABLE=base\n"),
    );
    write_env_file(&temp_dir, ".env.test", "EVENTS_DYNAMO_TABLE=profile\n");
    write_env_file(&temp_dir, ".env.test.local", "EVENTS_DYNAMO_TABLE=profile-local\n");

    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "EVENTS_PROFILE=test\nEVENTS_DYNAMO_TABLE=local\n",
    );

    let cfg = loader(&temp_dir)
        .load()
        .expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.table_name().unwrap(), "profile-local");
    clear_env();
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", REQUIRED);

    unsafe {
        env::set_var("EVENTS_HTTP_PORT", "9090");
        env::set_var("EVENTS_DYNAMO_ENDPOINT", "http://localhost:8000");
    }

    let cfg = loader(&temp_dir).load().expect("config loads with env override");
    assert_eq!(cfg.http_port, Some(9090));
    assert_eq!(cfg.dynamo_endpoint.as_deref(), Some("http://localhost:8000"));

    clear_env();
}

#[test]
fn missing_listener_port_returns_error() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "EVENTS_AWS_ACCESS_KEY_ID=AKIDEXAMPLE\n\
EVENTS_AWS_SECRET_ACCESS_KEY=secret\n\
EVENTS_AWS_REGION=us-west-2\n\
EVENTS_DYNAMO_TABLE=events\n",
    );

    let err = loader(&temp_dir)
        .load()
        .expect_err("a listener port is required");
    assert!(matches!(err, ConfigError::MissingListenPort));

    clear_env();
}

#[test]
fn missing_table_returns_error() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", REQUIRED);
    unsafe {
        env::set_var("EVENTS_DYNAMO_TABLE", "   ");
    }

    let err = loader(&temp_dir).load().expect_err("table is required");
    assert!(matches!(err, ConfigError::MissingTable));

    clear_env();
}

#[test]
fn invalid_port_returns_error() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", REQUIRED);
    unsafe {
        env::set_var("EVENTS_HTTPS_PORT", "not-a-port");
    }

    let err = loader(&temp_dir).load().expect_err("invalid port should fail");
    assert!(format!("{}", err).contains("EVENTS_HTTPS_PORT"));

    clear_env();
}

#[test]
fn redacted_json_hides_aws_secrets() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", REQUIRED);

    let cfg = loader(&temp_dir).load().unwrap();
    let json = cfg.redacted_json().unwrap();

    assert!(!json.contains("AKIDEXAMPLE"));
    assert!(!json.contains("\"secret\""));
    assert!(json.contains("[REDACTED]"));

    clear_env();
}

#[test]
fn overflowing_body_limit_returns_error() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", REQUIRED);
    unsafe {
        env::set_var("EVENTS_MAX_BODY_KB", usize::MAX.to_string());
    }

    let err = loader(&temp_dir)
        .load()
        .expect_err("body limit larger than usize bytes should fail");
    assert!(matches!(err, ConfigError::InvalidMaxBody { .. }));

    clear_env();
}
