//! Guards: predicates gating whether a request reaches its handler.
//!
//! A guard answers `Ok(true)` to let the request through and `Ok(false)` to
//! reject it, which the dispatcher reports as `Unauthorized` (401). A guard that
//! wants another status returns `Err` with its own [`Failure`] instead.
//!
//! Guards from every scope are ANDed together. The dispatcher evaluates them
//! controller scope first, then global, then method scope, and stops at the
//! first rejection.

use std::future::ready;
use std::sync::Arc;

use tracing::debug;

use crate::context::PipelineContext;
use crate::failure::Failure;
use crate::handler::BoxFuture;

/// An ordered-chain predicate over the pipeline context.
pub trait Guard: Send + Sync + 'static {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn can_activate<'a>(&'a self, ctx: &'a PipelineContext) -> BoxFuture<'a, Result<bool, Failure>>;
}

pub(crate) type BoxedGuard = Arc<dyn Guard>;

/// Lifts a synchronous predicate into a [`Guard`].
///
/// ```rust
/// use tollgate::guard::guard_fn;
///
/// let json_only = guard_fn("json-only", |ctx| {
///     ctx.request().header("content-type") == Some("application/json")
/// });
/// ```
pub fn guard_fn<F>(name: &'static str, predicate: F) -> FnGuard<F>
where
    F: Fn(&PipelineContext) -> bool + Send + Sync + 'static,
{
    FnGuard { name, predicate }
}

pub struct FnGuard<F> {
    name: &'static str,
    predicate: F,
}

impl<F> Guard for FnGuard<F>
where
    F: Fn(&PipelineContext) -> bool + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn can_activate<'a>(&'a self, ctx: &'a PipelineContext) -> BoxFuture<'a, Result<bool, Failure>> {
        Box::pin(ready(Ok((self.predicate)(ctx))))
    }
}

/// Lets a request through only when it carries a non-empty `Authorization`
/// header. The token itself is not inspected.
pub struct AuthGuard;

impl Guard for AuthGuard {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn can_activate<'a>(&'a self, ctx: &'a PipelineContext) -> BoxFuture<'a, Result<bool, Failure>> {
        let present = ctx.request()
            .header("authorization")
            .is_some_and(|token| !token.trim().is_empty());
        Box::pin(ready(Ok(present)))
    }
}

/// Logs that guarding happened and always allows.
pub struct LoggerGuard;

impl Guard for LoggerGuard {
    fn name(&self) -> &'static str {
        "logger"
    }

    fn can_activate<'a>(&'a self, ctx: &'a PipelineContext) -> BoxFuture<'a, Result<bool, Failure>> {
        debug!(route = ctx.route().pattern(), "logger guard");
        Box::pin(ready(Ok(true)))
    }
}

/// Runs `guards` in order. The first `false` becomes `Unauthorized`; the first
/// `Err` is returned as is.
pub(crate) async fn check_all(guards: Vec<&BoxedGuard>, ctx: &PipelineContext) -> Result<(), Failure> {
    for guard in guards {
        if !guard.can_activate(ctx).await? {
            debug!(guard = guard.name(), "guard rejected request");
            return Err(Failure::unauthorized());
        }
    }
    Ok(())
}
