//! The failure taxonomy every pipeline stage raises.
//!
//! Guards, pipes, handlers and interceptors all report problems the same way:
//! by returning `Err(Failure)`. The dispatcher never inspects a failure beyond
//! handing it to the [`ExceptionNormalizer`](crate::ExceptionNormalizer), which
//! turns it into the JSON error envelope.

use serde_json::Value;
use thiserror::Error;

/// Tag of a [`Failure`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FailureKind {
    /// Guard rejection.
    Unauthorized,
    /// Explicit denial.
    Forbidden,
    /// Pipe or field-rule rejection.
    Validation,
    NotFound,
    Conflict,
    RateLimited,
    /// The request outlived its deadline.
    Timeout,
    /// The body exceeded the server's size limit.
    PayloadTooLarge,
    /// Unclassified.
    Internal,
}

impl FailureKind {
    /// Default HTTP status for this kind.
    pub fn status(self) -> u16 {
        match self {
            Self::Validation   => 400,
            Self::Unauthorized => 401,
            Self::Forbidden    => 403,
            Self::NotFound     => 404,
            Self::Timeout      => 408,
            Self::Conflict     => 409,
            Self::PayloadTooLarge => 413,
            Self::RateLimited  => 429,
            Self::Internal     => 500,
        }
    }

    fn default_message(self) -> &'static str {
        match self {
            Self::Validation   => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden    => "Forbidden",
            Self::NotFound     => "Not Found",
            Self::Timeout      => "Request Timeout",
            Self::Conflict     => "Conflict",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::RateLimited  => "Too Many Requests",
            Self::Internal     => "Internal Server Error",
        }
    }
}

/// A tagged request failure: kind, HTTP status, message, optional detail.
///
/// Immutable once built; the `with_*` methods consume and return a new value.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{kind:?} ({status}): {message}")]
pub struct Failure {
    kind: FailureKind,
    status: u16,
    message: String,
    detail: Option<Value>,
}

impl Failure {
    /// A failure of `kind` with its default status and message.
    pub fn new(kind: FailureKind) -> Self {
        Self {
            kind,
            status: kind.status(),
            message: kind.default_message().to_owned(),
            detail: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(FailureKind::Unauthorized)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Forbidden).with_message(message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Validation).with_message(message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound).with_message(message)
    }

    pub fn conflict() -> Self {
        Self::new(FailureKind::Conflict)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FailureKind::RateLimited).with_message(message)
    }

    pub fn timeout() -> Self {
        Self::new(FailureKind::Timeout)
    }

    pub fn payload_too_large() -> Self {
        Self::new(FailureKind::PayloadTooLarge)
    }

    pub fn internal() -> Self {
        Self::new(FailureKind::Internal)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Overrides the HTTP status while keeping the kind.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn kind(&self) -> FailureKind { self.kind }
    pub fn status(&self) -> u16 { self.status }
    pub fn message(&self) -> &str { &self.message }
    pub fn detail(&self) -> Option<&Value> { self.detail.as_ref() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_their_statuses() {
        let cases = [
            (FailureKind::Unauthorized, 401),
            (FailureKind::Forbidden, 403),
            (FailureKind::Validation, 400),
            (FailureKind::NotFound, 404),
            (FailureKind::Conflict, 409),
            (FailureKind::RateLimited, 429),
            (FailureKind::Timeout, 408),
            (FailureKind::PayloadTooLarge, 413),
            (FailureKind::Internal, 500),
        ];
        for (kind, status) in cases {
            assert_eq!(Failure::new(kind).status(), status, "{kind:?}");
        }
    }

    #[test]
    fn builders_keep_kind() {
        let f = Failure::forbidden("Access Blocked").with_status(451);
        assert_eq!(f.kind(), FailureKind::Forbidden);
        assert_eq!(f.status(), 451);
        assert_eq!(f.message(), "Access Blocked");
        assert_eq!(f.to_string(), "Forbidden (451): Access Blocked");
    }
}
