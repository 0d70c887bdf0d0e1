//! Configuration loading tests
//!
//! File values override the built-in defaults, the environment supplies the
//! broker password when asked to, and command-line overrides win over both.

use irc_notify::config::{BridgeConfig, ConfigError, NotifierBackend, Overrides, Urgency};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{contents}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_from_valid_toml() {
    let temp_file = write_config(
        r#"
[broker]
host = "rabbit.lan"
port = 5673
user = "weechat"
password = "s3cret"
exchange = "highlights"
queue = "laptop"
durable = true

[notify]
backend = "notify-send"
urgency = "normal"
icon = "dialog-information"

[reconnect]
delay_secs = 5
"#,
    );

    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.broker.host, "rabbit.lan");
    assert_eq!(config.broker.port, 5673);
    assert_eq!(config.broker.user, "weechat");
    assert_eq!(config.broker.password, "s3cret");
    assert_eq!(config.broker.exchange, "highlights");
    assert_eq!(config.broker.queue, "laptop");
    assert!(config.broker.durable);
    assert_eq!(config.notify.backend, NotifierBackend::NotifySend);
    assert_eq!(config.notify.urgency, Urgency::Normal);
    assert_eq!(config.notify.icon, "dialog-information");
    assert_eq!(config.reconnect.delay(), Duration::from_secs(5));
}

#[test]
fn test_partial_file_keeps_defaults() {
    let temp_file = write_config(
        r#"
[broker]
host = "rabbit.lan"
"#,
    );

    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.broker.host, "rabbit.lan");
    assert_eq!(config.broker.port, 5672);
    assert_eq!(config.broker.user, "guest");
    assert_eq!(config.broker.exchange, "chat-notify");
    assert_eq!(config.broker.queue, "irc-notify-queue");
    assert_eq!(config.notify, BridgeConfig::default().notify);
    assert_eq!(config.reconnect.delay_secs, 30);
}

#[test]
fn test_missing_file_fails() {
    let result = BridgeConfig::load_from_file(std::path::Path::new("/nonexistent/irc-notify.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_invalid_toml_fails() {
    let temp_file = write_config("[broker\nhost = ");
    let result = BridgeConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_unknown_backend_fails() {
    let temp_file = write_config(
        r#"
[notify]
backend = "carrier-pigeon"
"#,
    );
    let result = BridgeConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_zero_reconnect_delay_is_rejected() {
    let temp_file = write_config(
        r#"
[reconnect]
delay_secs = 0
"#,
    );
    let result = BridgeConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_command_line_overrides_win_over_file() {
    let temp_file = write_config(
        r#"
[broker]
host = "rabbit.lan"
exchange = "highlights"
password_env = "IRC_NOTIFY_TEST_UNUSED_PASSWORD"
"#,
    );

    let mut config = BridgeConfig::load_from_file(temp_file.path()).unwrap();
    config.apply_overrides(Overrides {
        host: Some("127.0.0.1".to_string()),
        queue: Some("desktop".to_string()),
        password: Some("from-cli".to_string()),
        notifier: Some(NotifierBackend::Log),
        ..Default::default()
    });
    config.validate().unwrap();

    let descriptor = config.connection_descriptor().unwrap();
    assert_eq!(descriptor.host, "127.0.0.1");
    assert_eq!(descriptor.exchange, "highlights");
    assert_eq!(descriptor.queue, "desktop");
    assert_eq!(descriptor.password, "from-cli");
    assert_eq!(config.notify.backend, NotifierBackend::Log);
}

#[test]
fn test_password_from_environment() {
    std::env::set_var("IRC_NOTIFY_TEST_BROKER_PASSWORD", "from-env");
    let temp_file = write_config(
        r#"
[broker]
password = "ignored"
password_env = "IRC_NOTIFY_TEST_BROKER_PASSWORD"
"#,
    );

    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();
    let descriptor = config.connection_descriptor().unwrap();

    assert_eq!(descriptor.password, "from-env");
    assert!(!format!("{descriptor}").contains("from-env"));
    assert!(!format!("{descriptor:?}").contains("from-env"));
}

#[test]
fn test_missing_password_variable_fails() {
    let temp_file = write_config(
        r#"
[broker]
password_env = "IRC_NOTIFY_TEST_DEFINITELY_UNSET"
"#,
    );

    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();
    let result = config.connection_descriptor();

    assert!(matches!(result, Err(ConfigError::EnvVarNotFound(name)) if name == "IRC_NOTIFY_TEST_DEFINITELY_UNSET"));
}

#[test]
fn test_amqp_uri_encodes_credentials_and_default_vhost() {
    let mut config = BridgeConfig::default();
    config.apply_overrides(Overrides {
        user: Some("we@chat".to_string()),
        password: Some("p/ss word".to_string()),
        ..Default::default()
    });

    let uri = config.connection_descriptor().unwrap().amqp_uri().unwrap();

    assert!(uri.starts_with("amqp://we%40chat:"));
    assert!(!uri.contains("p/ss word"));
    assert!(uri.ends_with("@localhost:5672/%2F"));
}
