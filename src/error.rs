use thiserror::Error;

/// Errors raised while talking to the Telegram bridge.
///
/// All of them are treated as transient by the pollers: they get logged and
/// the next tick tries again.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Connection, TLS or timeout failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Body was not the JSON shape we expected
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Non-2xx HTTP status
    #[error("{action} returned HTTP {status}")]
    Status { action: &'static str, status: u16 },

    /// Bridge answered with `ok: false`
    #[error("{action} rejected: {description}")]
    Rejected {
        action: &'static str,
        description: String,
    },
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
