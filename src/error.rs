//! Crate-wide error type
//!
//! One `thiserror` enum carrying every error kind the alert pipeline can
//! surface to a caller (see spec §7). Library code never maps these to HTTP
//! status codes directly -- `status_hint()` gives an external binding layer
//! enough to do that itself.

use thiserror::Error;

pub type AlertCoreResult<T> = Result<T, AlertCoreError>;

/// A hint at the HTTP status an external binding layer should use.
/// Not an actual `http::StatusCode` so this crate stays free of a web
/// framework dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusHint(pub u16);

#[derive(Error, Debug)]
pub enum AlertCoreError {
    /// A pre-process plugin refused the inbound alert.
    #[error("alert rejected: {0}")]
    Rejected(String),

    /// Ingest quota exceeded for this identity or origin.
    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    /// The inbound payload was actually a heartbeat, not an alert.
    #[error("heartbeat received")]
    HeartbeatReceived,

    /// The alert falls inside an active blackout window.
    #[error("alert silenced by blackout: {0}")]
    BlackoutPeriod(String),

    /// Plugin chain looped back on itself.
    #[error("forwarding loop detected")]
    ForwardingLoop,

    /// The state machine refused the requested action.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// Caller has no entitlement for the requested customer scope.
    #[error("no customer match")]
    NoCustomerMatch,

    /// A field failed validation (bad enum value, missing required field, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness or other integrity constraint was violated by the store.
    #[error("store conflict: {0}")]
    Conflict(String),

    /// An unexpected store-layer failure.
    #[error("store error: {0}")]
    Store(String),

    /// A transport-layer failure while dispatching a notification. This
    /// never propagates out of the dispatch path -- it is recorded to
    /// `NotificationHistory` instead -- but is a distinct variant so unit
    /// tests can assert on it directly.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// Channel secret could not be decrypted (wrong key, corrupt payload).
    #[error("credential decrypt failed: {0}")]
    DecryptFailed(String),
}

impl From<crate::crypto::CryptoError> for AlertCoreError {
    fn from(e: crate::crypto::CryptoError) -> Self {
        AlertCoreError::DecryptFailed(e.to_string())
    }
}

impl AlertCoreError {
    pub fn status_hint(&self) -> StatusHint {
        use AlertCoreError::*;
        StatusHint(match self {
            Rejected(_) => 400,
            RateLimit(_) => 429,
            HeartbeatReceived => 202,
            BlackoutPeriod(_) => 202,
            ForwardingLoop => 202,
            InvalidAction(_) => 409,
            NoCustomerMatch => 403,
            Validation(_) => 400,
            NotFound(_) => 404,
            Conflict(_) => 409,
            Store(_) => 500,
            Dispatch(_) => 500,
            DecryptFailed(_) => 500,
        })
    }

    /// True for the soft failures the ingest pipeline recovers from locally
    /// (returns a descriptive 2xx/4xx body) rather than propagating as a
    /// hard 500 (spec §7).
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            AlertCoreError::Rejected(_)
                | AlertCoreError::RateLimit(_)
                | AlertCoreError::HeartbeatReceived
                | AlertCoreError::BlackoutPeriod(_)
                | AlertCoreError::ForwardingLoop
        )
    }
}
