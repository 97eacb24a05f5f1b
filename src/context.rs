//! Per-request pipeline state.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::request::Request;
use crate::router::RouteDescriptor;

/// Lifecycle state of one request inside the dispatcher.
///
/// Every non-terminal state can fall into `Failed`; `Failed` always moves on
/// to `Responding` with the normalized error response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Routing,
    Middleware,
    Guarding,
    Piping,
    Handling,
    Responding,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Routing    => "routing",
            Self::Middleware => "middleware",
            Self::Guarding   => "guarding",
            Self::Piping     => "piping",
            Self::Handling   => "handling",
            Self::Responding => "responding",
            Self::Failed     => "failed",
        };
        f.write_str(name)
    }
}

/// A timestamped note left by middleware or an interceptor.
#[derive(Clone, Debug)]
pub struct Marker {
    pub label: String,
    pub at: DateTime<Utc>,
}

impl Marker {
    pub fn now(label: impl Into<String>) -> Self {
        Self { label: label.into(), at: Utc::now() }
    }
}

/// Correlation object for one in-flight request.
///
/// Owned by exactly one request and dropped once its response is emitted.
/// The request inside is read-only: the middleware phase is over by the time
/// a context exists.
pub struct PipelineContext {
    request: Arc<Request>,
    route: Arc<RouteDescriptor>,
    markers: Vec<Marker>,
}

impl PipelineContext {
    pub(crate) fn new(request: Request, route: Arc<RouteDescriptor>, markers: Vec<Marker>) -> Self {
        Self { request: Arc::new(request), route, markers }
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn route(&self) -> &RouteDescriptor { &self.route }
    pub fn markers(&self) -> &[Marker] { &self.markers }

    /// Appends a timestamped marker.
    pub fn mark(&mut self, label: impl Into<String>) {
        self.markers.push(Marker::now(label));
    }

    pub(crate) fn shared_request(&self) -> Arc<Request> {
        Arc::clone(&self.request)
    }
}
