//! Error types at the transport seams.
//!
//! A message that yields no signal is not an error (the extractor returns
//! `None`); these types cover the fetch and delivery edges only. Anything
//! else escaping a tick is handled by the poll loop's recovery pause.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("channel transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("channel endpoint returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

/// A destination's payload builder refused the signal. Terminal for that
/// destination only; never retried.
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("signal carries no TP1 to anchor the bracket take-profit")]
    MissingTakeProfit,

    #[error("computed order quantity is not positive")]
    NonPositiveQuantity,

    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One failed delivery attempt, classified for the retry loop.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("destination transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rate limited, advised retry in {retry_after:.1}s")]
    RateLimited { retry_after: f64 },

    #[error("destination rejected payload with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl DeliveryError {
    /// Transient failures worth another bounded attempt. Rate limits are
    /// handled separately and never consume the attempt budget.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::Transport(_) => true,
            DeliveryError::RateLimited { .. } => true,
            DeliveryError::Rejected { status, .. } => *status >= 500,
        }
    }
}

/// Advisory retry interval from a 429 body (`{"retry_after": 1.5}`),
/// falling back to `default_secs` when absent or unparsable.
pub fn advised_retry_after(body: &str, default_secs: f64) -> f64 {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("retry_after").and_then(serde_json::Value::as_f64))
        .unwrap_or(default_secs)
}

/// Bounded excerpt of a response body for log/error messages.
pub(crate) fn excerpt(body: &str) -> String {
    const MAX: usize = 300;
    if body.chars().count() > MAX {
        body.chars().take(MAX).collect()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advised_delay_read_from_json_body() {
        assert_eq!(advised_retry_after(r#"{"retry_after": 7.5}"#, 5.0), 7.5);
        assert_eq!(advised_retry_after(r#"{"message": "slow down"}"#, 5.0), 5.0);
        assert_eq!(advised_retry_after("not json", 2.0), 2.0);
    }

    #[test]
    fn rejected_5xx_is_retryable_4xx_is_not() {
        let server = DeliveryError::Rejected {
            status: 503,
            body: String::new(),
        };
        let client = DeliveryError::Rejected {
            status: 422,
            body: String::new(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }
}
