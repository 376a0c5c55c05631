use crate::config::ConfigError;
use crate::telemetry::TelemetryError;

/// Process-level failures raised while booting, serving, or running the demo.
///
/// Request-level failures never reach this type; the registry and the ledger
/// answer HTTP callers through their own error kinds.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
    #[error("demo failed: {0}")]
    Demo(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn wraps_config_errors_with_source() {
        let err = AppError::from(ConfigError::InvalidPort);
        assert_eq!(
            err.to_string(),
            "configuration error: APP_PORT must be a valid u16"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn demo_failures_carry_their_message() {
        let err = AppError::Demo("deposit dep-000001 not found".to_string());
        assert_eq!(err.to_string(), "demo failed: deposit dep-000001 not found");
        assert!(err.source().is_none());
    }
}
