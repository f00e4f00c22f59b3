use std::env;
use std::fs;
use std::path::Path;

use secrecy::ExposeSecret;
use toml::Value;
use u360_core::config::{resolve_config_path, AppConfig, LoadOptions};

use crate::commands::{CommandResult, EXIT_CONFIG_INVALID};

/// One rendered config key and the env vars that can set it, highest
/// precedence first.
struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG_INVALID,
            );
        }
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source =
            field_source(&field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field {
            key: "slack.app_token",
            env_keys: &["U360_SLACK_APP_TOKEN"],
            value: redact_token(config.slack.app_token.expose_secret()),
        },
        Field {
            key: "slack.bot_token",
            env_keys: &["U360_SLACK_BOT_TOKEN"],
            value: redact_token(config.slack.bot_token.expose_secret()),
        },
        Field {
            key: "slack.api_base_url",
            env_keys: &["U360_SLACK_API_BASE_URL"],
            value: config.slack.api_base_url.clone(),
        },
        Field {
            key: "dispatch.handler_timeout_ms",
            env_keys: &["U360_DISPATCH_HANDLER_TIMEOUT_MS"],
            value: config.dispatch.handler_timeout_ms.to_string(),
        },
        Field {
            key: "socket.transport",
            env_keys: &["U360_SOCKET_TRANSPORT"],
            value: format!("{:?}", config.socket.transport),
        },
        Field {
            key: "socket.max_retries",
            env_keys: &["U360_SOCKET_MAX_RETRIES"],
            value: config.socket.max_retries.to_string(),
        },
        Field {
            key: "socket.base_delay_ms",
            env_keys: &["U360_SOCKET_BASE_DELAY_MS"],
            value: config.socket.base_delay_ms.to_string(),
        },
        Field {
            key: "socket.max_delay_ms",
            env_keys: &["U360_SOCKET_MAX_DELAY_MS"],
            value: config.socket.max_delay_ms.to_string(),
        },
        Field {
            key: "server.bind_address",
            env_keys: &["U360_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        Field {
            key: "server.health_check_port",
            env_keys: &["U360_SERVER_HEALTH_CHECK_PORT", "PORT"],
            value: config.server.health_check_port.to_string(),
        },
        Field {
            key: "server.graceful_shutdown_secs",
            env_keys: &["U360_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            value: config.server.graceful_shutdown_secs.to_string(),
        },
        Field {
            key: "logging.level",
            env_keys: &["U360_LOGGING_LEVEL", "U360_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key: "logging.format",
            env_keys: &["U360_LOGGING_FORMAT", "U360_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
        },
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps only the Slack token family prefix (`xapp`, `xoxb`).
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
