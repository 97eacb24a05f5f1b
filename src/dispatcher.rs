//! The request lifecycle.
//!
//! ```text
//! Routing → Middleware → Guarding → Piping → Handling → Responding
//!    └──────────┴───────────┴──────────┴──────────┴──→ Failed → Responding
//! ```
//!
//! Each state advances on success. Routing only looks the route up: middleware
//! that does not depend on a controller runs even when nothing matched, and
//! the `NotFound` failure is raised once middleware is done.
//!
//! Any failure, a handler panic, or the deadline expiring moves the request to
//! `Failed`, where the
//! [`ExceptionNormalizer`] builds the error response. Exactly one
//! [`Response`] leaves [`Dispatcher::dispatch`] per request.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::Value;
use tracing::{Instrument, Span, debug, error, field, info_span};

use crate::context::{Marker, PipelineContext, Stage};
use crate::failure::Failure;
use crate::guard::{self, BoxedGuard, Guard};
use crate::interceptor::{self, BoxedInterceptor, CallNext, Interceptor};
use crate::middleware::{Advance, BoxedMiddleware, Middleware, MiddlewareScope};
use crate::normalizer::ExceptionNormalizer;
use crate::pipe::{self, BoxedPipe, Pipe};
use crate::request::Request;
use crate::response::Response;
use crate::router::{RouteDescriptor, Router};

/// Default per-request deadline.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

struct ScopedMiddleware {
    scopes: Vec<MiddlewareScope>,
    middleware: BoxedMiddleware,
}

impl ScopedMiddleware {
    fn applies(&self, req: &Request, route: Option<&RouteDescriptor>) -> bool {
        self.scopes.iter().any(|scope| scope.matches(req, route))
    }
}

/// Composition root: the route table plus every global pipeline element.
///
/// Built once at startup with [`Dispatcher::builder`], then shared by all
/// in-flight requests. Holds no per-request state.
pub struct Dispatcher {
    router: Router,
    middleware: Vec<ScopedMiddleware>,
    guards: Vec<BoxedGuard>,
    pipes: Vec<BoxedPipe>,
    interceptors: Vec<BoxedInterceptor>,
    normalizer: ExceptionNormalizer,
    deadline: Option<Duration>,
}

impl Dispatcher {
    pub fn builder(router: Router) -> DispatcherBuilder {
        DispatcherBuilder {
            router,
            middleware: Vec::new(),
            guards: Vec::new(),
            pipes: Vec::new(),
            interceptors: Vec::new(),
            normalizer: ExceptionNormalizer::new(),
            deadline: Some(DEFAULT_DEADLINE),
        }
    }

    /// Runs one request through the whole pipeline and returns its only response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let target = request.target().to_owned();
        let span = info_span!(
            "request",
            method = %request.method(),
            path = request.path(),
            request_id = field::Empty,
        );

        async move {
            let mut stage = Stage::Routing;
            let outcome = {
                let run = AssertUnwindSafe(self.run(request, &mut stage)).catch_unwind();
                match self.deadline {
                    Some(limit) => tokio::time::timeout(limit, run)
                        .await
                        .unwrap_or_else(|_| Ok(Err(Failure::timeout()))),
                    None => run.await,
                }
            };

            let result = outcome.unwrap_or_else(|panic| {
                let reason = panic.downcast_ref::<String>().map(String::as_str)
                    .or_else(|| panic.downcast_ref::<&str>().copied())
                    .unwrap_or("unknown panic");
                error!(%stage, reason, "pipeline panicked");
                Err(Failure::internal())
            });

            match result {
                Ok((status, body)) => {
                    debug!(status, "responding");
                    Response::new(status, body)
                }
                Err(failure) => {
                    debug!(from = %stage, to = %Stage::Failed, kind = ?failure.kind(), "transition");
                    self.normalizer.normalize(&failure, &target)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Error response for a request that could not even be parsed.
    pub fn reject(&self, failure: &Failure, target: &str) -> Response {
        self.normalizer.normalize(failure, target)
    }

    async fn run(&self, mut request: Request, stage: &mut Stage) -> Result<(u16, Value), Failure> {
        let matched = self.router.lookup(request.method(), request.path());
        let route = matched.as_ref().map(|(route, _)| route.as_ref());

        *stage = Stage::Middleware;
        let mut markers = Vec::new();
        for entry in &self.middleware {
            if entry.applies(&request, route) {
                let _advanced = entry.middleware.handle(&mut request, Advance::new()).await?;
                markers.push(Marker::now(format!("middleware:{}", entry.middleware.name())));
            }
        }
        if let Some(id) = request.extension("requestId").and_then(Value::as_str) {
            Span::current().record("request_id", id);
        }

        let Some((route, params)) = matched else {
            return Err(Failure::not_found(format!("Cannot {} {}", request.method(), request.path())));
        };
        request.params = params;
        let mut ctx = PipelineContext::new(request, Arc::clone(&route), markers);

        *stage = Stage::Guarding;
        let guards: Vec<&BoxedGuard> = route.controller_guards.iter()
            .chain(&self.guards)
            .chain(&route.guards)
            .collect();
        guard::check_all(guards, &ctx).await?;

        *stage = Stage::Piping;
        let args = pipe::resolve(&self.pipes, &route.bindings, ctx.shared_request()).await?;

        *stage = Stage::Handling;
        let handler = Arc::clone(&route.handler);
        let terminal = CallNext::handler(move || handler.call(args));
        let interceptors = self.interceptors.iter()
            .chain(&route.controller_interceptors)
            .chain(&route.interceptors);
        let value = interceptor::chain(interceptors, terminal).handle(&mut ctx).await?;

        *stage = Stage::Responding;
        Ok((route.success_status(), value))
    }
}

/// Builder for [`Dispatcher`]. Registration order is execution order.
pub struct DispatcherBuilder {
    router: Router,
    middleware: Vec<ScopedMiddleware>,
    guards: Vec<BoxedGuard>,
    pipes: Vec<BoxedPipe>,
    interceptors: Vec<BoxedInterceptor>,
    normalizer: ExceptionNormalizer,
    deadline: Option<Duration>,
}

impl DispatcherBuilder {
    /// Registers `middleware` for the requests matched by any of `scopes`.
    /// It runs at most once per request however many scopes match.
    pub fn middleware(
        mut self,
        middleware: impl Middleware,
        scopes: impl IntoIterator<Item = MiddlewareScope>,
    ) -> Self {
        self.middleware.push(ScopedMiddleware {
            scopes: scopes.into_iter().collect(),
            middleware: Arc::new(middleware),
        });
        self
    }

    /// Adds a global guard. Global guards run after controller guards and
    /// before method guards.
    pub fn guard(mut self, guard: impl Guard) -> Self {
        self.guards.push(Arc::new(guard));
        self
    }

    /// Adds a global pipe. Global pipes run on every whole-body binding,
    /// before the binding's own pipes.
    pub fn pipe(mut self, pipe: impl Pipe) -> Self {
        self.pipes.push(Arc::new(pipe));
        self
    }

    /// Adds a global interceptor. Global interceptors wrap controller and
    /// method interceptors; the first one added is the outermost.
    pub fn interceptor(mut self, interceptor: impl Interceptor) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn normalizer(mut self, normalizer: ExceptionNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Per-request deadline; `None` disables it.
    pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            router: self.router,
            middleware: self.middleware,
            guards: self.guards,
            pipes: self.pipes,
            interceptors: self.interceptors,
            normalizer: self.normalizer,
            deadline: self.deadline,
        }
    }
}
