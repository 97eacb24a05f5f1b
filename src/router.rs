//! Route table.
//!
//! One radix tree per HTTP method, O(path-length) lookup. Routes are declared
//! with builder calls, optionally grouped under a [`Controller`] that shares a
//! path prefix, guards and interceptors. Everything is resolved into immutable
//! [`RouteDescriptor`]s at startup.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::guard::{BoxedGuard, Guard};
use crate::handler::{BoxedHandler, Handler};
use crate::interceptor::{BoxedInterceptor, Interceptor};
use crate::method::Method;
use crate::pipe::Binding;

// ── RouteDescriptor ───────────────────────────────────────────────────────────

/// A fully resolved route: method, pattern, pipeline elements, handler.
pub struct RouteDescriptor {
    method: Method,
    pattern: String,
    controller: Option<&'static str>,
    pub(crate) controller_guards: Vec<BoxedGuard>,
    pub(crate) guards: Vec<BoxedGuard>,
    pub(crate) controller_interceptors: Vec<BoxedInterceptor>,
    pub(crate) interceptors: Vec<BoxedInterceptor>,
    pub(crate) bindings: Vec<Binding>,
    pub(crate) handler: BoxedHandler,
}

impl RouteDescriptor {
    pub fn method(&self) -> Method { self.method }

    /// The registered pattern, e.g. `/user/{id}`.
    pub fn pattern(&self) -> &str { &self.pattern }

    pub fn controller(&self) -> Option<&'static str> { self.controller }

    pub fn bindings(&self) -> &[Binding] { &self.bindings }

    /// `201` for POST routes, `200` for everything else.
    pub fn success_status(&self) -> u16 {
        match self.method {
            Method::Post => 201,
            _ => 200,
        }
    }
}

// ── Route ─────────────────────────────────────────────────────────────────────

/// Declarative registration of one route.
///
/// ```rust
/// use tollgate::guard::AuthGuard;
/// use tollgate::pipe::{Binding, ParseIntPipe};
/// use tollgate::{Args, Route};
///
/// async fn show(_args: Args) -> &'static str { "ok" }
///
/// Route::get("/orders/{id}", show)
///     .guard(AuthGuard)
///     .bind(Binding::param("id").pipe(ParseIntPipe));
/// ```
pub struct Route {
    method: Method,
    path: String,
    guards: Vec<BoxedGuard>,
    interceptors: Vec<BoxedInterceptor>,
    bindings: Vec<Binding>,
    handler: BoxedHandler,
}

impl Route {
    pub fn new(method: Method, path: &str, handler: impl Handler) -> Self {
        Self {
            method,
            path: path.to_owned(),
            guards: Vec::new(),
            interceptors: Vec::new(),
            bindings: Vec::new(),
            handler: handler.into_boxed_handler(),
        }
    }

    pub fn get(path: &str, handler: impl Handler) -> Self { Self::new(Method::Get, path, handler) }
    pub fn post(path: &str, handler: impl Handler) -> Self { Self::new(Method::Post, path, handler) }
    pub fn put(path: &str, handler: impl Handler) -> Self { Self::new(Method::Put, path, handler) }
    pub fn patch(path: &str, handler: impl Handler) -> Self { Self::new(Method::Patch, path, handler) }
    pub fn delete(path: &str, handler: impl Handler) -> Self { Self::new(Method::Delete, path, handler) }

    /// Adds a method-scoped guard.
    pub fn guard(mut self, guard: impl Guard) -> Self {
        self.guards.push(Arc::new(guard));
        self
    }

    /// Adds a method-scoped interceptor. The first one added is the outermost.
    pub fn interceptor(mut self, interceptor: impl Interceptor) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Declares a handler argument and its pipes.
    pub fn bind(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub(crate) fn descriptor(self, controller: Option<&'static str>, prefix: &str) -> RouteDescriptor {
        RouteDescriptor {
            method: self.method,
            pattern: join(prefix, &self.path),
            controller,
            controller_guards: Vec::new(),
            guards: self.guards,
            controller_interceptors: Vec::new(),
            interceptors: self.interceptors,
            bindings: self.bindings,
            handler: self.handler,
        }
    }
}

fn join(prefix: &str, path: &str) -> String {
    let joined = format!("{}/{}", prefix.trim_end_matches('/'), path.trim_start_matches('/'));
    if joined.len() > 1 {
        joined.trim_end_matches('/').to_owned()
    } else {
        joined
    }
}

// ── Controller ────────────────────────────────────────────────────────────────

/// A named group of routes under one path prefix, with guards and
/// interceptors applying to every route in the group.
pub struct Controller {
    name: &'static str,
    prefix: String,
    guards: Vec<BoxedGuard>,
    interceptors: Vec<BoxedInterceptor>,
    routes: Vec<Route>,
}

impl Controller {
    pub fn new(name: &'static str, prefix: &str) -> Self {
        Self {
            name,
            prefix: prefix.to_owned(),
            guards: Vec::new(),
            interceptors: Vec::new(),
            routes: Vec::new(),
        }
    }

    pub fn guard(mut self, guard: impl Guard) -> Self {
        self.guards.push(Arc::new(guard));
        self
    }

    pub fn interceptor(mut self, interceptor: impl Interceptor) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    fn into_descriptors(self) -> impl Iterator<Item = RouteDescriptor> {
        let Self { name, prefix, guards, interceptors, routes } = self;
        routes.into_iter().map(move |route| {
            let mut desc = route.descriptor(Some(name), &prefix);
            desc.controller_guards = guards.clone();
            desc.controller_interceptors = interceptors.clone();
            desc
        })
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// The route table.
///
/// Build it once at startup and hand it to the
/// [`Dispatcher`](crate::Dispatcher). Registration methods return `self` so
/// calls chain.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Arc<RouteDescriptor>>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Registers a route outside any controller.
    pub fn route(self, route: Route) -> Self {
        self.add(route.descriptor(None, "/"))
    }

    /// Registers every route of `controller` under its prefix.
    pub fn controller(mut self, controller: Controller) -> Self {
        for desc in controller.into_descriptors() {
            self = self.add(desc);
        }
        self
    }

    /// # Panics
    ///
    /// Panics on an invalid or conflicting pattern: a broken route table is a
    /// startup bug.
    fn add(mut self, desc: RouteDescriptor) -> Self {
        let pattern = desc.pattern.clone();
        self.routes
            .entry(desc.method)
            .or_default()
            .insert(pattern.as_str(), Arc::new(desc))
            .unwrap_or_else(|e| panic!("invalid route `{pattern}`: {e}"));
        self
    }

    /// Finds the route for `method` and `path`. A trailing slash is ignored.
    pub(crate) fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(Arc<RouteDescriptor>, HashMap<String, String>)> {
        let path = normalize_path(path);
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok()?;
        let route = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((route, params))
    }
}

/// Drops one trailing slash, except on the root path. Route lookup and
/// middleware scopes both see paths through this.
pub(crate) fn normalize_path(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::LoggerGuard;
    use crate::handler::Args;

    async fn ok(_: Args) -> &'static str { "ok" }

    #[test]
    fn joins_prefixes() {
        assert_eq!(join("/", "/"), "/");
        assert_eq!(join("/", "/data"), "/data");
        assert_eq!(join("/user", "/"), "/user");
        assert_eq!(join("/user/", "{id}"), "/user/{id}");
    }

    #[test]
    fn looks_up_by_method_and_extracts_params() {
        let router = Router::new()
            .controller(
                Controller::new("user", "/user")
                    .guard(LoggerGuard)
                    .route(Route::get("/", ok))
                    .route(Route::get("/{id}", ok))
                    .route(Route::post("/email", ok)),
            )
            .route(Route::get("/", ok));

        let (route, params) = router.lookup(Method::Get, "/user/42").unwrap();
        assert_eq!(route.pattern(), "/user/{id}");
        assert_eq!(route.controller(), Some("user"));
        assert_eq!(route.controller_guards.len(), 1);
        assert_eq!(params.get("id").map(String::as_str), Some("42"));

        let (route, _) = router.lookup(Method::Get, "/user/").unwrap();
        assert_eq!(route.pattern(), "/user");

        let (route, _) = router.lookup(Method::Post, "/user/email").unwrap();
        assert_eq!(route.success_status(), 201);

        let (route, _) = router.lookup(Method::Get, "/").unwrap();
        assert_eq!(route.controller(), None);

        assert!(router.lookup(Method::Delete, "/user/42").is_none());
        assert!(router.lookup(Method::Get, "/nope").is_none());
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_routes_panic() {
        let _ = Router::new().route(Route::get("/a", ok)).route(Route::get("/a", ok));
    }
}
