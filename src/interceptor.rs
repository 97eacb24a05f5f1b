//! Interceptors: wrappers around handler invocation.
//!
//! An interceptor receives the pipeline context and a [`CallNext`] standing for
//! the rest of the chain (inner interceptors, then the handler). It may act
//! before calling [`CallNext::handle`], replace the value `handle` resolves to,
//! or catch the failure it returns and translate it.
//!
//! Nesting is the usual onion: "before" code runs outer to inner, "after" code
//! inner to outer. Global interceptors wrap controller interceptors, which wrap
//! method interceptors, which wrap the handler.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};
use tracing::info;

use crate::context::PipelineContext;
use crate::failure::Failure;
use crate::handler::BoxFuture;

/// The terminal step of the chain: the bound handler call.
type Terminal<'a> = Box<dyn FnOnce() -> BoxFuture<'static, Result<Value, Failure>> + Send + 'a>;

/// A wrapper around the remaining chain.
pub trait Interceptor: Send + Sync + 'static {
    fn intercept<'a>(
        &'a self,
        ctx: &'a mut PipelineContext,
        next: CallNext<'a>,
    ) -> BoxFuture<'a, Result<Value, Failure>>;
}

pub(crate) type BoxedInterceptor = Arc<dyn Interceptor>;

/// The rest of the interceptor chain. Consumed by [`CallNext::handle`], so it
/// runs at most once.
pub struct CallNext<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        interceptor: &'a dyn Interceptor,
        next: Box<CallNext<'a>>,
    },
    Handler(Terminal<'a>),
}

impl<'a> CallNext<'a> {
    pub(crate) fn new(interceptor: &'a dyn Interceptor, next: CallNext<'a>) -> Self {
        Self {
            inner: NextInner::Chain { interceptor, next: Box::new(next) },
        }
    }

    pub(crate) fn handler<F>(f: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'static, Result<Value, Failure>> + Send + 'a,
    {
        Self { inner: NextInner::Handler(Box::new(f)) }
    }

    /// Runs the inner interceptors and the handler.
    pub async fn handle(self, ctx: &mut PipelineContext) -> Result<Value, Failure> {
        match self.inner {
            NextInner::Chain { interceptor, next } => interceptor.intercept(ctx, *next).await,
            NextInner::Handler(handler) => handler().await,
        }
    }
}

/// Builds the onion for `interceptors` (outermost first) around `terminal`.
pub(crate) fn chain<'a, I>(interceptors: I, terminal: CallNext<'a>) -> CallNext<'a>
where
    I: DoubleEndedIterator<Item = &'a BoxedInterceptor>,
{
    interceptors.rev().fold(terminal, |next, interceptor| CallNext::new(interceptor.as_ref(), next))
}

// ── Built-in interceptors ─────────────────────────────────────────────────────

/// Logs before and after the inner chain and leaves a marker for each.
pub struct LoggerInterceptor;

impl Interceptor for LoggerInterceptor {
    fn intercept<'a>(
        &'a self,
        ctx: &'a mut PipelineContext,
        next: CallNext<'a>,
    ) -> BoxFuture<'a, Result<Value, Failure>> {
        Box::pin(async move {
            let started = Instant::now();
            ctx.mark("interceptor:before");
            info!(route = ctx.route().pattern(), "before handler");

            let result = next.handle(ctx).await;

            ctx.mark("interceptor:after");
            info!(
                route = ctx.route().pattern(),
                ok = result.is_ok(),
                elapsed = ?started.elapsed(),
                "after handler"
            );
            result
        })
    }
}

/// Wraps every successful result in the response envelope: a string becomes
/// `{data: {message: s}}`, anything else `{data: v}`. Failures pass through.
pub struct TransformInterceptor;

impl TransformInterceptor {
    pub fn envelope(value: Value) -> Value {
        match value {
            Value::String(message) => json!({ "data": { "message": message } }),
            other => json!({ "data": other }),
        }
    }
}

impl Interceptor for TransformInterceptor {
    fn intercept<'a>(
        &'a self,
        ctx: &'a mut PipelineContext,
        next: CallNext<'a>,
    ) -> BoxFuture<'a, Result<Value, Failure>> {
        Box::pin(async move { next.handle(ctx).await.map(Self::envelope) })
    }
}
