//! Error types for the ForgeGate domain.
//!
//! Deny decisions are never errors; see [`crate::Verdict`]. Boot-time
//! failures live with the crate that loads things (`ConfigError`,
//! `PatternError`); this one covers the sink boundary.

use thiserror::Error;

/// Failure to hand a security event to its sink.
///
/// Never changes the outcome of the decision that produced the event.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to write audit record: {0}")]
    Write(#[from] std::io::Error),

    #[error("Failed to encode audit record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{failed} of {total} sinks failed: {first}")]
    Partial {
        failed: usize,
        total: usize,
        first: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_error_displays_correctly() {
        let err = SinkError::Unavailable("audit store offline".into());
        assert_eq!(err.to_string(), "Sink unavailable: audit store offline");
    }

    #[test]
    fn partial_sink_error_reports_counts() {
        let err = SinkError::Partial {
            failed: 1,
            total: 3,
            first: "disk full".into(),
        };
        assert_eq!(err.to_string(), "1 of 3 sinks failed: disk full");
    }
}
