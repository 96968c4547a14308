use serde::Serialize;
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
    pub store_timeout: Duration,
    /// Write-token gate on mutating routes, the CSRF-protection analog for
    /// a JSON surface. Off by default.
    pub require_write_token: bool,
    pub allowed_write_tokens: Vec<String>,
    pub readiness_requires_store: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 16 * 1024,
            request_timeout: Duration::from_secs(5),
            store_timeout: Duration::from_secs(2),
            require_write_token: false,
            allowed_write_tokens: Vec::new(),
            readiness_requires_store: true,
        }
    }
}

pub fn validate_startup_config(api: &ApiConfig) -> Result<(), String> {
    if api.max_body_bytes == 0 {
        return Err("max_body_bytes must be > 0".to_string());
    }
    if api.request_timeout.is_zero() || api.store_timeout.is_zero() {
        return Err("timeouts must be > 0".to_string());
    }
    if api.store_timeout > api.request_timeout {
        return Err("store_timeout must not exceed request_timeout".to_string());
    }
    if api.require_write_token && api.allowed_write_tokens.iter().all(|t| t.trim().is_empty()) {
        return Err(
            "require_write_token=true requires at least one non-empty write token".to_string(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_config_validation_enforces_write_token_contract() {
        let api = ApiConfig {
            require_write_token: true,
            ..ApiConfig::default()
        };
        let err = validate_startup_config(&api).expect_err("missing tokens");
        assert!(err.contains("write token"));

        let api = ApiConfig {
            require_write_token: true,
            allowed_write_tokens: vec!["tok".to_string()],
            ..ApiConfig::default()
        };
        assert!(validate_startup_config(&api).is_ok());
    }

    #[test]
    fn startup_config_validation_rejects_inverted_timeouts() {
        let api = ApiConfig {
            request_timeout: Duration::from_millis(100),
            store_timeout: Duration::from_millis(500),
            ..ApiConfig::default()
        };
        let err = validate_startup_config(&api).expect_err("inverted timeouts");
        assert!(err.contains("store_timeout"));
    }

    #[test]
    fn startup_config_validation_rejects_zero_limits() {
        let api = ApiConfig {
            max_body_bytes: 0,
            ..ApiConfig::default()
        };
        assert!(validate_startup_config(&api).is_err());
    }
}
