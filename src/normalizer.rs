//! The terminal catch point: failure in, error envelope out.
//!
//! Every error response has the same shape:
//!
//! ```json
//! {
//!   "statusCode": 403,
//!   "success": false,
//!   "message": "Access Blocked",
//!   "timestamp": "2024-05-01T12:00:00.000Z",
//!   "path": "/exception/403"
//! }
//! ```

use std::borrow::Cow;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{error, warn};

use crate::failure::{Failure, FailureKind};
use crate::response::Response;

/// Message shown for internal failures and for out-of-range statuses.
pub const GENERIC_MESSAGE: &str = "Internal Server Error";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorEnvelope<'a> {
    status_code: u16,
    success: bool,
    message: &'a str,
    timestamp: String,
    path: &'a str,
}

/// Converts any [`Failure`] into the JSON error [`Response`]. Never fails.
///
/// `Internal` failures never show their own message: clients get the generic
/// message instead, which [`with_generic_message`](Self::with_generic_message)
/// replaces.
#[derive(Clone, Debug)]
pub struct ExceptionNormalizer {
    generic_message: Cow<'static, str>,
}

impl Default for ExceptionNormalizer {
    fn default() -> Self {
        Self { generic_message: Cow::Borrowed(GENERIC_MESSAGE) }
    }
}

impl ExceptionNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generic_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.generic_message = message.into();
        self
    }

    /// Builds the error response for `failure` on the request `path`.
    ///
    /// A status outside 400–599 is not an error status; it is reported as 500
    /// with the generic message.
    pub fn normalize(&self, failure: &Failure, path: &str) -> Response {
        let (status, message) = match failure.status() {
            s @ 400..=599 if failure.kind() != FailureKind::Internal => (s, failure.message()),
            s @ 400..=599 => (s, &*self.generic_message),
            _ => (500, &*self.generic_message),
        };

        if status >= 500 {
            error!(status, kind = ?failure.kind(), reason = failure.message(), path, "request failed");
        } else {
            warn!(status, kind = ?failure.kind(), reason = message, path, "request rejected");
        }

        let envelope = ErrorEnvelope {
            status_code: status,
            success: false,
            message,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            path,
        };
        // The envelope holds only strings, numbers and a bool.
        let body = serde_json::to_value(&envelope).unwrap_or_default();
        Response::new(status, body)
    }
}
