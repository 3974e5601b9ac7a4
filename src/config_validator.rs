// Configuration validation module for Whisper Queue
//
// Every environment variable the server and the workers read is declared once in
// `CONFIG_PARAMS` with its type, default, range and severity. Validation walks the
// registry, collects every problem instead of stopping at the first one, and turns
// the valid values into an `AppConfig`.

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::{error, info, warn};

use crate::config::{defaults, AppConfig, StoreBackend};

/// Configuration parameter types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigType {
    String,
    Integer,
    UnsignedInteger,
    Boolean,
    IpAddress,
    Port,
    SocketAddress,
    Enum(&'static [&'static str]),
}

/// Validation severity levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationLevel {
    Critical, // Must be valid for the process to start
    Standard, // Invalid values are errors, missing values use defaults
    Warning,  // Only reported
}

/// Configuration parameter definition
#[derive(Debug, Clone)]
pub struct ConfigParam {
    pub name: &'static str,
    pub description: &'static str,
    pub param_type: ConfigType,
    pub default_value: Option<&'static str>,
    pub required: bool,
    pub validation_level: ValidationLevel,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
}

/// Centralized configuration parameter registry
pub const CONFIG_PARAMS: &[ConfigParam] = &[
    // Server Configuration
    ConfigParam {
        name: "WHISPER_QUEUE_HOST",
        description: "Host IP address for the API server",
        param_type: ConfigType::IpAddress,
        default_value: Some("127.0.0.1"),
        required: false,
        validation_level: ValidationLevel::Critical,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "WHISPER_QUEUE_PORT",
        description: "Port for the API server",
        param_type: ConfigType::Port,
        default_value: Some("8000"),
        required: false,
        validation_level: ValidationLevel::Critical,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "WHISPER_QUEUE_TIMEOUT",
        description: "HTTP client disconnect timeout in seconds",
        param_type: ConfigType::Integer,
        default_value: Some("480"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: Some(1),
        max_value: Some(3600),
    },
    ConfigParam {
        name: "WHISPER_QUEUE_KEEPALIVE",
        description: "Keep-alive timeout in seconds",
        param_type: ConfigType::Integer,
        default_value: Some("480"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: Some(1),
        max_value: Some(3600),
    },
    ConfigParam {
        name: "HTTP_WORKER_NUMBER",
        description: "Number of HTTP worker threads (0 = use CPU cores)",
        param_type: ConfigType::UnsignedInteger,
        default_value: Some("0"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: Some(0),
        max_value: Some(64),
    },
    ConfigParam {
        name: "WHISPER_EMBEDDED_WORKER",
        description: "Run a transcription worker inside the API server (memory store only)",
        param_type: ConfigType::Boolean,
        default_value: Some("true"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    // Job Store Configuration
    ConfigParam {
        name: "STORE_BACKEND",
        description: "Job store backend",
        param_type: ConfigType::Enum(&defaults::VALID_STORE_BACKENDS),
        default_value: Some("memory"),
        required: false,
        validation_level: ValidationLevel::Critical,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "REDIS_URL",
        description: "Redis connection URL used by the redis store",
        param_type: ConfigType::String,
        default_value: Some("redis://127.0.0.1:6379"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "REDIS_KEY_PREFIX",
        description: "Prefix of every key written to Redis",
        param_type: ConfigType::String,
        default_value: Some("whisper_queue"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "RESULT_SWEEP_INTERVAL_SECONDS",
        description: "Interval between two expired result sweeps",
        param_type: ConfigType::Integer,
        default_value: Some("60"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: Some(1),
        max_value: Some(86400),
    },
    // API Configuration
    ConfigParam {
        name: "DEFAULT_EXPIRATION_SECONDS",
        description: "Result retention when a job does not set expiration_sec",
        param_type: ConfigType::Integer,
        default_value: Some("604800"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: Some(1),
        max_value: Some(31536000),
    },
    ConfigParam {
        name: "MAX_FILE_SIZE",
        description: "Maximum size of one uploaded audio file in bytes",
        param_type: ConfigType::UnsignedInteger,
        default_value: Some("536870912"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: Some(1024),
        max_value: None,
    },
    // Worker Configuration
    ConfigParam {
        name: "WHISPER_TMP_FILES",
        description: "Directory where job audio is written before transcription",
        param_type: ConfigType::String,
        default_value: Some("/tmp/whisper_queue"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "WHISPER_CMD",
        description: "Transcription command run for every job",
        param_type: ConfigType::String,
        default_value: Some("/usr/local/bin/whisper-transcribe"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "WHISPER_OUTPUT_DIR",
        description: "Directory the transcription command writes to",
        param_type: ConfigType::String,
        default_value: Some("/tmp/whisper_queue/output"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "WORKER_POLL_INTERVAL_MS",
        description: "Longest wait in milliseconds before a worker polls the store again",
        param_type: ConfigType::Integer,
        default_value: Some("1000"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: Some(10),
        max_value: Some(60000),
    },
    // Metrics Configuration
    ConfigParam {
        name: "WHISPER_QUEUE_METRICS_ENABLED",
        description: "Enable metrics collection",
        param_type: ConfigType::Boolean,
        default_value: Some("true"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "WHISPER_QUEUE_METRICS_BACKEND",
        description: "Metrics backend type",
        param_type: ConfigType::Enum(&defaults::VALID_METRICS_BACKENDS),
        default_value: Some("none"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "WHISPER_QUEUE_METRICS_ENDPOINT",
        description: "Metrics endpoint for StatsD (host:port)",
        param_type: ConfigType::SocketAddress,
        default_value: None,
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "WHISPER_QUEUE_METRICS_PREFIX",
        description: "Prefix for all exported metrics",
        param_type: ConfigType::String,
        default_value: Some("whisper_queue"),
        required: false,
        validation_level: ValidationLevel::Warning,
        min_value: None,
        max_value: None,
    },
];

/// Configuration validation errors with detailed context
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub value: String,
    pub error_type: ConfigErrorType,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigErrorType {
    InvalidValue,
    InvalidFormat,
    InvalidRange,
    Required,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Configuration error in '{}' ({:?}): {} (value: '{}')",
            self.field, self.error_type, self.message, self.value
        )?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " - Suggestion: {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result type for configuration validation
pub type ValidationResult<T> = Result<T, ConfigValidationError>;

/// Configuration validation results
#[derive(Debug)]
pub struct ValidationResults {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
    pub is_valid: bool,
}

impl ValidationResults {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        }
    }

    pub fn add_error(&mut self, error: ConfigValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ConfigValidationError) {
        self.warnings.push(warning);
    }

    fn add(&mut self, level: ValidationLevel, error: ConfigValidationError) {
        match level {
            ValidationLevel::Critical | ValidationLevel::Standard => self.add_error(error),
            ValidationLevel::Warning => self.add_warning(error),
        }
    }

    pub fn print_summary(&self) {
        if !self.errors.is_empty() {
            error!(
                "Configuration validation found {} error(s):",
                self.errors.len()
            );
            for (i, err) in self.errors.iter().enumerate() {
                error!("  {}. {}", i + 1, err);
            }
        }

        if !self.warnings.is_empty() {
            warn!(
                "Configuration validation found {} warning(s):",
                self.warnings.len()
            );
            for (i, warn) in self.warnings.iter().enumerate() {
                warn!("  {}. {}", i + 1, warn);
            }
        }

        if self.is_valid && self.warnings.is_empty() {
            info!("Configuration validation passed successfully");
        } else if self.is_valid {
            info!(
                "Configuration validation passed with {} warning(s)",
                self.warnings.len()
            );
        }
    }
}

/// Helper functions for common validation patterns
pub mod validators {
    use super::*;

    fn range_error(
        field: &str,
        value: &str,
        message: String,
        suggestion: String,
    ) -> ConfigValidationError {
        ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            error_type: ConfigErrorType::InvalidRange,
            message,
            suggestion: Some(suggestion),
        }
    }

    /// Validate boolean values from string
    pub fn validate_boolean(field: &str, value: &str) -> ValidationResult<bool> {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigValidationError {
                field: field.to_string(),
                value: value.to_string(),
                error_type: ConfigErrorType::InvalidValue,
                message: "Invalid boolean value".to_string(),
                suggestion: Some("Use 'true' or 'false'".to_string()),
            }),
        }
    }

    /// Validate integer values with optional range
    pub fn validate_integer(
        field: &str,
        value: &str,
        min: Option<i64>,
        max: Option<i64>,
    ) -> ValidationResult<i64> {
        let parsed = value.parse::<i64>().map_err(|_| ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            error_type: ConfigErrorType::InvalidFormat,
            message: "Invalid integer format".to_string(),
            suggestion: Some("Use a valid integer number".to_string()),
        })?;

        if let Some(min) = min {
            if parsed < min {
                return Err(range_error(
                    field,
                    value,
                    format!("Value {} is below minimum {}", parsed, min),
                    format!("Use a value >= {}", min),
                ));
            }
        }

        if let Some(max) = max {
            if parsed > max {
                return Err(range_error(
                    field,
                    value,
                    format!("Value {} is above maximum {}", parsed, max),
                    format!("Use a value <= {}", max),
                ));
            }
        }

        Ok(parsed)
    }

    /// Validate unsigned integer values with optional range
    pub fn validate_usize(
        field: &str,
        value: &str,
        min: Option<i64>,
        max: Option<i64>,
    ) -> ValidationResult<usize> {
        let parsed = value.parse::<usize>().map_err(|_| ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            error_type: ConfigErrorType::InvalidFormat,
            message: "Invalid unsigned integer format".to_string(),
            suggestion: Some("Use a valid positive integer number".to_string()),
        })?;

        if let Some(min) = min {
            if (parsed as i64) < min {
                return Err(range_error(
                    field,
                    value,
                    format!("Value {} is below minimum {}", parsed, min),
                    format!("Use a value >= {}", min),
                ));
            }
        }

        if let Some(max) = max {
            if (parsed as i64) > max {
                return Err(range_error(
                    field,
                    value,
                    format!("Value {} is above maximum {}", parsed, max),
                    format!("Use a value <= {}", max),
                ));
            }
        }

        Ok(parsed)
    }

    /// Validate enumerated values (case insensitive), returning the lowercased value
    pub fn validate_enum(
        field: &str,
        value: &str,
        valid_values: &[&str],
    ) -> ValidationResult<String> {
        let lowered = value.to_lowercase();
        if valid_values.iter().any(|valid| valid.to_lowercase() == lowered) {
            Ok(lowered)
        } else {
            Err(ConfigValidationError {
                field: field.to_string(),
                value: value.to_string(),
                error_type: ConfigErrorType::InvalidValue,
                message: format!("Invalid value, must be one of: {}", valid_values.join(", ")),
                suggestion: Some(format!("Use one of: {}", valid_values.join(", "))),
            })
        }
    }

    /// Validate IP address
    pub fn validate_ip_address(field: &str, value: &str) -> ValidationResult<IpAddr> {
        IpAddr::from_str(value).map_err(|_| ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            error_type: ConfigErrorType::InvalidFormat,
            message: "Invalid IP address format".to_string(),
            suggestion: Some(
                "Use a valid IPv4 or IPv6 address (e.g., 127.0.0.1 or ::1)".to_string(),
            ),
        })
    }

    /// Validate port number
    pub fn validate_port(field: &str, value: &str) -> ValidationResult<u16> {
        let port = value.parse::<u16>().map_err(|_| ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            error_type: ConfigErrorType::InvalidFormat,
            message: "Invalid port number format".to_string(),
            suggestion: Some("Use a number between 1 and 65535".to_string()),
        })?;

        if port == 0 {
            return Err(range_error(
                field,
                value,
                "Port number cannot be 0".to_string(),
                "Use a port between 1 and 65535".to_string(),
            ));
        }

        Ok(port)
    }

    /// Validate socket address (host:port)
    pub fn validate_socket_address(field: &str, value: &str) -> ValidationResult<SocketAddr> {
        SocketAddr::from_str(value).map_err(|_| ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            error_type: ConfigErrorType::InvalidFormat,
            message: "Invalid socket address format".to_string(),
            suggestion: Some("Use format 'host:port' (e.g., 127.0.0.1:8125)".to_string()),
        })
    }

    /// Validate a Redis connection URL
    pub fn validate_redis_url(field: &str, value: &str) -> ValidationResult<String> {
        const SCHEMES: [&str; 3] = ["redis://", "rediss://", "redis+unix://"];
        if SCHEMES.iter().any(|scheme| value.starts_with(scheme)) {
            Ok(value.to_string())
        } else {
            Err(ConfigValidationError {
                field: field.to_string(),
                value: value.to_string(),
                error_type: ConfigErrorType::InvalidFormat,
                message: "Invalid Redis URL scheme".to_string(),
                suggestion: Some("Use a URL like redis://127.0.0.1:6379".to_string()),
            })
        }
    }
}

/// Helper function to get optional environment variable
pub fn get_env_optional(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Comprehensive configuration validator for Whisper Queue
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the process environment and return the typed configuration
    pub fn validate_and_load() -> Result<AppConfig, ValidationResults> {
        info!("Starting comprehensive configuration validation...");
        let outcome = Self::validate_with(get_env_optional);
        match &outcome {
            Ok(_) => info!("Configuration validation passed successfully"),
            Err(results) => results.print_summary(),
        }
        outcome
    }

    /// Validate the values returned by `lookup`, falling back to registry defaults
    pub fn validate_with<F>(lookup: F) -> Result<AppConfig, ValidationResults>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut results = ValidationResults::new();
        let mut config = AppConfig::default();
        let mut metrics_enabled = true;

        for param in CONFIG_PARAMS {
            let value = lookup(param.name)
                .map(|v| v.trim().to_string())
                .or_else(|| param.default_value.map(String::from))
                .unwrap_or_default();

            if param.required && value.is_empty() {
                results.add(
                    param.validation_level,
                    ConfigValidationError {
                        field: param.name.to_string(),
                        value: "".to_string(),
                        error_type: ConfigErrorType::Required,
                        message: "Required parameter is missing".to_string(),
                        suggestion: Some(format!("Set {} environment variable", param.name)),
                    },
                );
                continue;
            }

            if value.is_empty() {
                continue;
            }

            match Self::validate_and_store_parameter(param, &value, &mut config) {
                Ok(Some(enabled)) => metrics_enabled = enabled,
                Ok(None) => {}
                Err(error) => results.add(param.validation_level, error),
            }
        }

        if !metrics_enabled {
            config.metrics.exporter_type = "none".to_string();
        }

        Self::validate_cross_dependencies(&mut results, &config);

        if results.is_valid {
            for warning in &results.warnings {
                warn!("{}", warning);
            }
            Ok(config)
        } else {
            Err(results)
        }
    }

    /// Validate a single parameter and store its value in the config struct
    ///
    /// Returns the metrics switch when `param` is the metrics enable flag.
    fn validate_and_store_parameter(
        param: &ConfigParam,
        value: &str,
        config: &mut AppConfig,
    ) -> ValidationResult<Option<bool>> {
        match param.param_type {
            ConfigType::String => match param.name {
                "REDIS_URL" => {
                    config.store.redis.redis_url = validators::validate_redis_url(param.name, value)?
                }
                "REDIS_KEY_PREFIX" => config.store.redis.key_prefix = value.to_string(),
                "WHISPER_TMP_FILES" => config.worker.temp_dir = PathBuf::from(value),
                "WHISPER_CMD" => config.worker.command_path = value.to_string(),
                "WHISPER_OUTPUT_DIR" => config.worker.output_dir = PathBuf::from(value),
                "WHISPER_QUEUE_METRICS_PREFIX" => config.metrics.prefix = Some(value.to_string()),
                _ => {}
            },
            ConfigType::Integer => {
                let parsed = validators::validate_integer(
                    param.name,
                    value,
                    param.min_value,
                    param.max_value,
                )?;
                let secs = parsed.max(0) as u64;
                match param.name {
                    "WHISPER_QUEUE_TIMEOUT" => config.server.timeout = Duration::from_secs(secs),
                    "WHISPER_QUEUE_KEEPALIVE" => config.server.keep_alive = Duration::from_secs(secs),
                    "RESULT_SWEEP_INTERVAL_SECONDS" => {
                        config.store.sweep_interval = Duration::from_secs(secs)
                    }
                    "DEFAULT_EXPIRATION_SECONDS" => config.handler.default_expiration_secs = secs,
                    "WORKER_POLL_INTERVAL_MS" => {
                        config.worker.poll_interval = Duration::from_millis(secs)
                    }
                    _ => {}
                }
            }
            ConfigType::UnsignedInteger => {
                let parsed = validators::validate_usize(
                    param.name,
                    value,
                    param.min_value,
                    param.max_value,
                )?;
                match param.name {
                    "HTTP_WORKER_NUMBER" => config.server.workers = parsed,
                    "MAX_FILE_SIZE" => config.handler.max_file_size = parsed,
                    _ => {}
                }
            }
            ConfigType::Boolean => {
                let parsed = validators::validate_boolean(param.name, value)?;
                match param.name {
                    "WHISPER_EMBEDDED_WORKER" => config.server.embedded_worker = parsed,
                    "WHISPER_QUEUE_METRICS_ENABLED" => return Ok(Some(parsed)),
                    _ => {}
                }
            }
            ConfigType::IpAddress => {
                let parsed = validators::validate_ip_address(param.name, value)?;
                if param.name == "WHISPER_QUEUE_HOST" {
                    config.server.host = parsed;
                }
            }
            ConfigType::Port => {
                let parsed = validators::validate_port(param.name, value)?;
                if param.name == "WHISPER_QUEUE_PORT" {
                    config.server.port = parsed;
                }
            }
            ConfigType::SocketAddress => {
                let parsed = validators::validate_socket_address(param.name, value)?;
                if param.name == "WHISPER_QUEUE_METRICS_ENDPOINT" {
                    config.metrics.endpoint = Some(parsed.to_string());
                }
            }
            ConfigType::Enum(valid_values) => {
                let parsed = validators::validate_enum(param.name, value, valid_values)?;
                match param.name {
                    "STORE_BACKEND" => {
                        if let Some(backend) = StoreBackend::parse(&parsed) {
                            config.store.backend = backend;
                        }
                    }
                    "WHISPER_QUEUE_METRICS_BACKEND" => config.metrics.exporter_type = parsed,
                    _ => {}
                }
            }
        }
        Ok(None)
    }

    /// Validate cross-parameter dependencies
    fn validate_cross_dependencies(results: &mut ValidationResults, config: &AppConfig) {
        if config.metrics.exporter_type == "statsd" && config.metrics.endpoint.is_none() {
            results.add_error(ConfigValidationError {
                field: "WHISPER_QUEUE_METRICS_ENDPOINT".to_string(),
                value: "".to_string(),
                error_type: ConfigErrorType::Required,
                message: "Metrics endpoint required when StatsD backend is enabled".to_string(),
                suggestion: Some(
                    "Set WHISPER_QUEUE_METRICS_ENDPOINT for StatsD backend".to_string(),
                ),
            });
        }

        if config.store.backend == StoreBackend::Redis && config.server.embedded_worker {
            results.add_warning(ConfigValidationError {
                field: "WHISPER_EMBEDDED_WORKER".to_string(),
                value: "true".to_string(),
                error_type: ConfigErrorType::InvalidValue,
                message: "The embedded worker only runs with the memory store".to_string(),
                suggestion: Some(
                    "Start whisper_queue-worker processes for the redis store".to_string(),
                ),
            });
        }
    }
}

/// Documentation and configuration generation utilities
impl ConfigValidator {
    /// Generate a sample configuration file with all parameters and descriptions
    pub fn generate_sample_config() -> String {
        let mut output = String::new();
        output.push_str("# Whisper Queue Configuration File\n");
        output.push_str("# Keys are environment variable names; the environment wins over this file\n\n");

        for param in CONFIG_PARAMS {
            output.push_str(&format!("# {}\n", param.description));
            if param.required {
                output.push_str("# REQUIRED\n");
            }
            match param.default_value {
                Some(default) => output.push_str(&format!(
                    "{} = {}\n\n",
                    param.name,
                    toml_literal(param, default)
                )),
                None => output.push_str(&format!("# {} = \"\"\n\n", param.name)),
            }
        }
        output
    }

    /// Generate markdown documentation for all configuration parameters
    pub fn generate_config_documentation() -> String {
        let mut output = String::new();
        output.push_str("# Whisper Queue Configuration Reference\n\n");
        output.push_str("| Parameter | Type | Required | Default | Description |\n");
        output.push_str("|-----------|------|----------|---------|-------------|\n");

        for param in CONFIG_PARAMS {
            output.push_str(&format!(
                "| `{}` | {:?} | {} | `{}` | {} |\n",
                param.name,
                param.param_type,
                if param.required { "Yes" } else { "No" },
                param.default_value.unwrap_or("none"),
                param.description
            ));
        }

        output
    }
}

// Numbers and booleans stay bare so the sample file parses back into the same types
fn toml_literal(param: &ConfigParam, value: &str) -> String {
    match param.param_type {
        ConfigType::Integer | ConfigType::UnsignedInteger | ConfigType::Boolean => value.to_string(),
        _ => format!("\"{}\"", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn validate(vars: &[(&str, &str)]) -> Result<AppConfig, ValidationResults> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigValidator::validate_with(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = validate(&[]).unwrap();
        assert_eq!(config.server.port, defaults::PORT);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.handler.default_expiration_secs, defaults::EXPIRATION_SECONDS);
        assert_eq!(config.worker.poll_interval, Duration::from_millis(defaults::POLL_INTERVAL_MS));
        assert_eq!(config.metrics.exporter_type, "none");
    }

    #[test]
    fn test_values_are_applied() {
        let config = validate(&[
            ("WHISPER_QUEUE_HOST", "0.0.0.0"),
            ("WHISPER_QUEUE_PORT", "9100"),
            ("STORE_BACKEND", "Redis"),
            ("REDIS_URL", "redis://cache:6379/2"),
            ("WHISPER_EMBEDDED_WORKER", "false"),
            ("MAX_FILE_SIZE", "1048576"),
            ("DEFAULT_EXPIRATION_SECONDS", "3600"),
            ("WORKER_POLL_INTERVAL_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.server.bind_address(), "0.0.0.0:9100");
        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.store.redis.redis_url, "redis://cache:6379/2");
        assert!(!config.server.embedded_worker);
        assert_eq!(config.handler.max_file_size, 1_048_576);
        assert_eq!(config.handler.default_expiration_secs, 3600);
        assert_eq!(config.worker.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_all_errors_are_collected() {
        let results = validate(&[
            ("WHISPER_QUEUE_PORT", "0"),
            ("STORE_BACKEND", "sqlite"),
            ("WHISPER_QUEUE_TIMEOUT", "99999"),
        ])
        .unwrap_err();

        assert!(!results.is_valid);
        let fields: Vec<&str> = results.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["WHISPER_QUEUE_PORT", "WHISPER_QUEUE_TIMEOUT", "STORE_BACKEND"]
        );
        assert_eq!(results.errors[0].error_type, ConfigErrorType::InvalidRange);
    }

    #[test]
    fn test_statsd_requires_endpoint() {
        let results = validate(&[("WHISPER_QUEUE_METRICS_BACKEND", "statsd")]).unwrap_err();
        assert_eq!(results.errors[0].field, "WHISPER_QUEUE_METRICS_ENDPOINT");

        let config = validate(&[
            ("WHISPER_QUEUE_METRICS_BACKEND", "statsd"),
            ("WHISPER_QUEUE_METRICS_ENDPOINT", "127.0.0.1:8125"),
        ])
        .unwrap();
        assert_eq!(config.metrics.endpoint.as_deref(), Some("127.0.0.1:8125"));
    }

    #[test]
    fn test_metrics_disabled_overrides_backend() {
        let config = validate(&[
            ("WHISPER_QUEUE_METRICS_ENABLED", "false"),
            ("WHISPER_QUEUE_METRICS_BACKEND", "prometheus"),
        ])
        .unwrap();
        assert_eq!(config.metrics.exporter_type, "none");
    }

    #[test]
    fn test_invalid_redis_url_is_an_error() {
        let results = validate(&[("REDIS_URL", "http://not-redis")]).unwrap_err();
        assert_eq!(results.errors[0].field, "REDIS_URL");
        assert!(results.warnings.is_empty());
    }

    #[test]
    fn test_sample_config_round_trips_through_loader() {
        let sample = ConfigValidator::generate_sample_config();
        let map = crate::config_loader::parse_config(&sample).unwrap();
        assert_eq!(map.get("STORE_BACKEND").map(String::as_str), Some("memory"));
        assert_eq!(map.get("WHISPER_QUEUE_PORT").map(String::as_str), Some("8000"));
        assert!(!map.contains_key("WHISPER_QUEUE_METRICS_ENDPOINT"));

        let docs = ConfigValidator::generate_config_documentation();
        assert!(docs.contains("| `REDIS_URL` |"));
    }
}
