//! Outgoing response type and the [`IntoReply`] conversion trait.
//!
//! Handlers do not build responses. They return something that implements
//! [`IntoReply`]; interceptors shape that value and the dispatcher wraps the
//! final value into a [`Response`] with the route's success status.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::Full;
use serde::Serialize;
use serde_json::Value;

use crate::failure::Failure;

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response: status, JSON body, emission timestamp.
///
/// Produced exactly once per request. [`Response::into_http`] hands it to the
/// transport.
#[derive(Clone, Debug)]
pub struct Response {
    status: u16,
    body: Value,
    emitted_at: DateTime<Utc>,
}

impl Response {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body, emitted_at: Utc::now() }
    }

    pub fn status(&self) -> u16 { self.status }
    pub fn body(&self) -> &Value { &self.body }
    pub fn emitted_at(&self) -> DateTime<Utc> { self.emitted_at }

    /// Converts into the hyper response written on the wire.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let status = http::StatusCode::from_u16(self.status)
            .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
        // Serializing a `Value` cannot fail: every map key is already a string.
        let bytes = serde_json::to_vec(&self.body).unwrap_or_default();

        let mut res = http::Response::new(Full::new(Bytes::from(bytes)));
        *res.status_mut() = status;
        res.headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json; charset=utf-8"),
        );
        res
    }
}

// ── IntoReply ─────────────────────────────────────────────────────────────────

/// Conversion of a handler's return value into the pipeline's result.
///
/// Implement on your own types to return them directly from handlers, or wrap
/// any `Serialize` type in [`Json`].
///
/// ```rust
/// use tollgate::{Args, Failure, Json};
/// # #[derive(serde::Serialize)] struct User { id: i64 }
///
/// async fn get_user(mut args: Args) -> Result<Json<User>, Failure> {
///     let id: i64 = args.take("id")?;
///     Ok(Json(User { id }))
/// }
/// ```
pub trait IntoReply {
    fn into_reply(self) -> Result<Value, Failure>;
}

impl IntoReply for Value {
    fn into_reply(self) -> Result<Value, Failure> { Ok(self) }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Value, Failure> { Ok(Value::String(self)) }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Value, Failure> { Ok(Value::String(self.to_owned())) }
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Value, Failure> { Ok(Value::Null) }
}

impl<T: IntoReply> IntoReply for Result<T, Failure> {
    fn into_reply(self) -> Result<Value, Failure> { self?.into_reply() }
}

/// Serializes any `T: Serialize` into the reply value.
pub struct Json<T>(pub T);

impl<T: Serialize> IntoReply for Json<T> {
    fn into_reply(self) -> Result<Value, Failure> {
        serde_json::to_value(self.0)
            .map_err(|e| Failure::internal().with_detail(Value::String(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn replies_convert() {
        assert_eq!("hi".into_reply(), Ok(json!("hi")));
        assert_eq!(Json(vec![1, 2]).into_reply(), Ok(json!([1, 2])));
        assert_eq!(Json(None::<u8>).into_reply(), Ok(Value::Null));
        let err: Result<String, Failure> = Err(Failure::conflict());
        assert_eq!(err.into_reply().unwrap_err().status(), 409);
    }

    #[test]
    fn into_http_sets_status_and_json_content_type() {
        let res = Response::new(201, json!({"data": 1})).into_http();
        assert_eq!(res.status(), http::StatusCode::CREATED);
        assert_eq!(
            res.headers()[http::header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
    }
}
