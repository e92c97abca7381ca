use std::io::Write;

use taskloom_core::config::AppConfig;
use taskloom_core::types::Message;

/// Default config with a small iteration bound for fast tests.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.agent.max_iterations = 3;
    config.curator.default_model = Some("mock".to_string());
    config.planner.initial_backoff_ms = 1;
    config.planner.max_backoff_ms = 5;
    config
}

/// Write TOML to a temp file that lives as long as the returned handle.
pub fn write_config(toml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(toml.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Text of each message, in order.
pub fn message_texts(messages: &[Message]) -> Vec<String> {
    messages.iter().map(|m| m.text()).collect()
}
