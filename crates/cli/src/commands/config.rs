use reqdraft_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let token = match &config.api.auth_token {
        Some(token) => redact_token(token.expose_secret()),
        None => "(unset)".to_string(),
    };

    let mut lines = vec!["effective config (source precedence: overrides > env > file > default):"
        .to_string()];
    lines.push(render_line("api.base_url", &config.api.base_url));
    lines.push(render_line("api.auth_token", &token));
    lines.push(render_line("api.timeout_secs", &config.api.timeout_secs.to_string()));
    lines.push(render_line("logging.level", &config.logging.level));
    lines.push(render_line("logging.format", &format!("{:?}", config.logging.format)));
    lines.join("\n")
}

fn render_line(key: &str, value: &str) -> String {
    format!("  {key} = {value}")
}

fn redact_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{visible}…(redacted)")
}
