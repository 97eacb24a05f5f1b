//! Middleware layer.
//!
//! Middleware runs after the route is resolved and before any guard. It may
//! observe the request, mutate it (set headers, attach extensions), or reject
//! it with a [`Failure`]. It does not see the response.
//!
//! # The continuation contract
//!
//! Each middleware receives an [`Advance`] and must hand back the [`Advanced`]
//! token that only [`Advance::proceed`] can produce. `Advance` is consumed by
//! value, so a middleware cannot continue twice; and since there is no other
//! way to build an `Advanced`, one that returns `Ok` has necessarily continued.
//! A middleware whose future never resolves stalls its request until the
//! dispatcher deadline turns it into a `Timeout` failure.
//!
//! ```rust
//! use tollgate::middleware::{Advance, Advanced, Middleware};
//! use tollgate::{BoxFuture, Failure, Request};
//!
//! struct Stamp;
//!
//! impl Middleware for Stamp {
//!     fn name(&self) -> &'static str { "stamp" }
//!
//!     fn handle<'a>(&'a self, req: &'a mut Request, next: Advance) -> BoxFuture<'a, Result<Advanced, Failure>> {
//!         Box::pin(async move {
//!             req.set_header("x-stamped", "1");
//!             Ok(next.proceed())
//!         })
//!     }
//! }
//! ```

mod logger;
mod request_id;

pub use logger::RequestLogger;
pub use request_id::RequestId;

use std::sync::Arc;

use crate::failure::Failure;
use crate::handler::BoxFuture;
use crate::method::Method;
use crate::request::Request;
use crate::router::{RouteDescriptor, normalize_path};

/// A request-observing function that must explicitly continue the chain.
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs and pipeline markers.
    fn name(&self) -> &'static str;

    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        next: Advance,
    ) -> BoxFuture<'a, Result<Advanced, Failure>>;
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// The continuation handed to a middleware. Consumed by [`Advance::proceed`].
pub struct Advance(());

/// Proof that a middleware called [`Advance::proceed`].
#[must_use = "a middleware continues the chain by returning `Ok(advanced)`"]
pub struct Advanced(());

impl Advance {
    pub(crate) fn new() -> Self {
        Self(())
    }

    pub fn proceed(self) -> Advanced {
        Advanced(())
    }
}

/// Which requests a registered middleware applies to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MiddlewareScope {
    /// Every routed request.
    All,
    /// Requests whose path equals this one exactly, any method.
    Path(String),
    /// Requests routed to the named controller.
    Controller(&'static str),
    /// Requests with this method and exact path.
    Route(Method, String),
}

impl MiddlewareScope {
    pub fn path(path: &str) -> Self {
        Self::Path(path.to_owned())
    }

    pub fn route(method: Method, path: &str) -> Self {
        Self::Route(method, path.to_owned())
    }

    /// `route` is `None` when no route matched; controller scopes never apply
    /// then. Paths compare the way route lookup does, ignoring a trailing slash.
    pub(crate) fn matches(&self, req: &Request, route: Option<&RouteDescriptor>) -> bool {
        let same_path = |path: &str| normalize_path(req.path()) == normalize_path(path);
        match self {
            Self::All => true,
            Self::Path(path) => same_path(path.as_str()),
            Self::Controller(name) => route.and_then(RouteDescriptor::controller) == Some(*name),
            Self::Route(method, path) => req.method() == *method && same_path(path.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Args;
    use crate::router::Route;

    async fn noop() -> &'static str { "" }

    #[test]
    fn scopes_match_by_path_controller_and_route() {
        let route = Route::post("/", |_: Args| noop()).descriptor(Some("user"), "/user");
        let route = Some(&route);
        let req = Request::new(Method::Post, "/user?x=1");

        assert!(MiddlewareScope::All.matches(&req, route));
        assert!(MiddlewareScope::path("/user").matches(&req, route));
        assert!(!MiddlewareScope::path("/user/email").matches(&req, route));
        assert!(MiddlewareScope::Controller("user").matches(&req, route));
        assert!(!MiddlewareScope::Controller("app").matches(&req, route));
        assert!(MiddlewareScope::route(Method::Post, "/user").matches(&req, route));
        assert!(!MiddlewareScope::route(Method::Get, "/user").matches(&req, route));
    }

    #[test]
    fn trailing_slash_does_not_escape_a_scope() {
        let req = Request::new(Method::Get, "/a/");
        assert!(MiddlewareScope::path("/a").matches(&req, None));
        assert!(MiddlewareScope::path("/a/").matches(&Request::new(Method::Get, "/a"), None));
        assert!(MiddlewareScope::route(Method::Get, "/a").matches(&req, None));
        assert!(MiddlewareScope::path("/").matches(&Request::new(Method::Get, "/"), None));
    }

    #[test]
    fn controller_scope_needs_a_matched_route() {
        let req = Request::new(Method::Get, "/nope");
        assert!(MiddlewareScope::All.matches(&req, None));
        assert!(!MiddlewareScope::Controller("user").matches(&req, None));
    }
}
