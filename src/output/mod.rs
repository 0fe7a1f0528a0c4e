pub mod human;

use serde_json::{Value, json};

use crate::core::factory::FactoryError;
use crate::core::overrides::OverrideError;
use crate::models::anomaly::ConfigError;

pub const UNKNOWN_ALGORITHM: &str = "unknown_algorithm";
pub const UNKNOWN_KEY: &str = "unknown_key";
pub const INVALID_VALUE: &str = "invalid_value";
pub const INVALID_CONFIG: &str = "invalid_config";
pub const GENERAL_ERROR: &str = "general_error";

/// Envelope for every successful command: `{status, command, data, error}`.
pub fn success(command: &str, data: Value) -> Value {
    json!({
        "status": "ok",
        "command": command,
        "data": data,
        "error": null
    })
}

pub fn error(command: &str, code: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "command": command,
        "data": null,
        "error": {
            "code": code,
            "message": message
        }
    })
}

/// Machine-readable code for a failed command, from the typed error at its root.
pub fn error_code(err: &anyhow::Error) -> &'static str {
    if let Some(e) = err.downcast_ref::<OverrideError>() {
        return match e {
            OverrideError::UnknownKey { .. } => UNKNOWN_KEY,
            OverrideError::InvalidValue { .. } => INVALID_VALUE,
            OverrideError::Config(e) => config_code(e),
            OverrideError::Store(_) => GENERAL_ERROR,
        };
    }
    if let Some(e) = err.downcast_ref::<ConfigError>() {
        return config_code(e);
    }
    if let Some(FactoryError::UnknownAlgorithm { .. }) = err.downcast_ref::<FactoryError>() {
        return UNKNOWN_ALGORITHM;
    }
    GENERAL_ERROR
}

fn config_code(err: &ConfigError) -> &'static str {
    match err {
        ConfigError::UnknownAlgorithm(_) => UNKNOWN_ALGORITHM,
        _ => INVALID_CONFIG,
    }
}
