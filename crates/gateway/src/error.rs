//! Boot-time gateway errors. Request decisions are never errors.

use forgegate_config::ConfigError;
use forgegate_core::SinkError;
use forgegate_security::PatternError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("Failed to compile route schema: {0}")]
    Schema(#[from] regex_lite::Error),

    #[error("Failed to open audit trail: {0}")]
    Sink(#[from] SinkError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}
