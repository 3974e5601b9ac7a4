// Configuration file loader for Whisper Queue
//
// The configuration file is a flat TOML document whose keys are environment
// variable names. Values found there are exported to the process environment
// unless the variable is already set, so the validator only ever reads env vars.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use toml::Value;

/// Default configuration file, relative to the working directory
pub const CONFIG_FILE_PATH: &str = "whisper_queue.conf";

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "WHISPER_QUEUE_CONFIG";

/// Loads the configuration file and seeds the environment from it
///
/// Configuration precedence (highest to lowest):
/// 1. Environment variables
/// 2. Configuration file values
/// 3. Defaults from `config::defaults`
///
/// Returns true if a configuration file was found and applied.
pub fn load_config() -> bool {
    let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| CONFIG_FILE_PATH.to_string());
    load_config_from(Path::new(&path))
}

/// Same as [`load_config`] with an explicit file path
pub fn load_config_from(config_path: &Path) -> bool {
    if !config_path.exists() {
        debug!("Configuration file not found at: {}", config_path.display());
        return false;
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read configuration file: {}", e);
            return false;
        }
    };

    let config_map = match parse_config(&config_content) {
        Some(map) => map,
        None => return false,
    };

    for (key, value) in config_map {
        if env::var(&key).is_err() {
            debug!("Setting env var from config file: {} = {}", key, value);
            env::set_var(key, value);
        } else {
            debug!("Env var already exists, skipping: {}", key);
        }
    }

    info!("Configuration loaded from {}", config_path.display());
    true
}

/// Flatten a TOML document into string key/value pairs
///
/// Arrays and nested tables are skipped. Returns `None` on a parse error.
pub fn parse_config(content: &str) -> Option<HashMap<String, String>> {
    let values: Value = match content.parse() {
        Ok(values) => values,
        Err(e) => {
            warn!("Failed to parse configuration file: {}", e);
            return None;
        }
    };

    let mut config_map = HashMap::new();
    if let Value::Table(table) = values {
        for (key, value) in table {
            match value {
                Value::String(s) => {
                    config_map.insert(key, s);
                }
                Value::Integer(i) => {
                    config_map.insert(key, i.to_string());
                }
                Value::Float(f) => {
                    config_map.insert(key, f.to_string());
                }
                Value::Boolean(b) => {
                    config_map.insert(key, b.to_string());
                }
                _ => warn!("Skipping unsupported TOML value type for key: {}", key),
            }
        }
    }
    Some(config_map)
}
