use serde_json::Value;
use uuid::Uuid;

use super::{Advance, Advanced, Middleware};
use crate::failure::Failure;
use crate::handler::BoxFuture;
use crate::request::Request;

/// Header carrying the correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Propagates the caller's `x-request-id` or generates a UUID v4, and stores
/// it as the `requestId` request extension.
pub struct RequestId;

impl Middleware for RequestId {
    fn name(&self) -> &'static str {
        "request-id"
    }

    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        next: Advance,
    ) -> BoxFuture<'a, Result<Advanced, Failure>> {
        Box::pin(async move {
            let id = match req.header(REQUEST_ID_HEADER) {
                Some(id) if !id.is_empty() => id.to_owned(),
                _ => Uuid::new_v4().to_string(),
            };
            req.set_header(REQUEST_ID_HEADER, &id);
            req.insert_extension("requestId", Value::String(id));
            Ok(next.proceed())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;

    #[tokio::test]
    async fn keeps_incoming_id_or_generates_one() {
        let mut req = Request::new(Method::Get, "/").with_header("X-Request-Id", "abc");
        let _ = RequestId.handle(&mut req, Advance::new()).await.unwrap();
        assert_eq!(req.extension("requestId"), Some(&Value::String("abc".into())));

        let mut req = Request::new(Method::Get, "/");
        let _ = RequestId.handle(&mut req, Advance::new()).await.unwrap();
        let id = req.header(REQUEST_ID_HEADER).unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }
}
