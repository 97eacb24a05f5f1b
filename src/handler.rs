//! Handler trait, piped arguments and type erasure.
//!
//! # How async handlers are stored
//!
//! The route table holds handlers of *different* types side by side, so each
//! one is hidden behind a trait object (`dyn ErasedHandler`):
//!
//! ```text
//! async fn find_one(args: Args) -> Result<Json<User>, Failure> { … }  ← user writes this
//!        ↓ Route::get("/{id}", find_one)
//! find_one.into_boxed_handler()                  ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(find_one))                  ← stored as BoxedHandler
//!        ↓
//! handler.call(args)  at request time            ← one vtable dispatch
//!        ↓
//! Box::pin(async { find_one(args).await.into_reply() })
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::failure::Failure;
use crate::request::Request;
use crate::response::IntoReply;

/// A heap-allocated, type-erased future.
///
/// Guards, pipes, interceptors and middleware all return one of these so they
/// can be stored as trait objects in ordered lists.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ── Args ──────────────────────────────────────────────────────────────────────

/// The arguments a handler receives: every bound value after its pipes ran,
/// plus read-only access to the request.
pub struct Args {
    request: Arc<Request>,
    values: HashMap<&'static str, Value>,
}

impl Args {
    pub(crate) fn new(request: Arc<Request>, values: HashMap<&'static str, Value>) -> Self {
        Self { request, values }
    }

    pub fn request(&self) -> &Request { &self.request }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Removes the named argument and deserializes it into `T`.
    ///
    /// Fails with `Internal` when the binding is missing or its shape does not
    /// fit `T`: pipes are expected to have produced the right shape already,
    /// so either case is a route registration bug.
    pub fn take<T: DeserializeOwned>(&mut self, name: &str) -> Result<T, Failure> {
        let value = self.values.remove(name).ok_or_else(|| {
            Failure::internal().with_detail(Value::String(format!("no argument bound as `{name}`")))
        })?;
        serde_json::from_value(value).map_err(|e| {
            Failure::internal().with_detail(Value::String(format!("argument `{name}`: {e}")))
        })
    }
}

// ── Internal types ────────────────────────────────────────────────────────────

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, args: Args) -> BoxFuture<'static, Result<Value, Failure>>;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any `async fn` (or closure returning a future)
/// with the signature:
///
/// ```text
/// async fn name(args: Args) -> impl IntoReply
/// ```
///
/// Sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Args) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn call(&self, args: Args) -> BoxFuture<'static, Result<Value, Failure>> {
        let fut = (self.0)(args);
        Box::pin(async move { fut.await.into_reply() })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::method::Method;

    fn args(values: &[(&'static str, Value)]) -> Args {
        Args::new(
            Arc::new(Request::new(Method::Get, "/")),
            values.iter().cloned().collect(),
        )
    }

    #[test]
    fn take_deserializes_and_removes() {
        let mut args = args(&[("id", json!(7))]);
        assert_eq!(args.take::<i64>("id"), Ok(7));
        assert!(args.get("id").is_none());
        assert_eq!(args.take::<i64>("id").unwrap_err().status(), 500);
    }

    #[tokio::test]
    async fn boxed_handler_converts_reply() {
        async fn echo(mut args: Args) -> Result<String, Failure> {
            args.take("name")
        }
        let handler = echo.into_boxed_handler();
        let out = handler.call(args(&[("name", json!("ada"))])).await;
        assert_eq!(out, Ok(json!("ada")));
    }
}
