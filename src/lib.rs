//! # tollgate
//!
//! A request pipeline in the shape of the big web frameworks (guards,
//! middleware, pipes, interceptors, exception filters) over a plain
//! hyper + matchit core.
//!
//! ## The lifecycle
//!
//! ```text
//! request → route lookup → middleware → guards → pipes
//!         → interceptors (before) → handler → interceptors (after) → response
//! ```
//!
//! Any stage can fail with a [`Failure`]. The rest of the pipeline is skipped
//! and the [`ExceptionNormalizer`] renders the failure as a JSON error
//! envelope. Every request gets exactly one response.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tollgate::guard::AuthGuard;
//! use tollgate::interceptor::TransformInterceptor;
//! use tollgate::pipe::{Binding, ParseIntPipe};
//! use tollgate::{Args, Controller, Dispatcher, Failure, Route, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::new().controller(
//!         Controller::new("orders", "/orders")
//!             .guard(AuthGuard)
//!             .route(Route::get("/{id}", show).bind(Binding::param("id").pipe(ParseIntPipe))),
//!     );
//!
//!     let dispatcher = Dispatcher::builder(router)
//!         .interceptor(TransformInterceptor)
//!         .build();
//!
//!     Server::bind(([0, 0, 0, 0], 3000).into()).serve(dispatcher).await.unwrap();
//! }
//!
//! async fn show(mut args: Args) -> Result<String, Failure> {
//!     let id: i64 = args.take("id")?;
//!     Ok(format!("order {id}"))
//! }
//! ```

mod config;
mod context;
mod dispatcher;
mod error;
mod failure;
mod handler;
mod method;
mod normalizer;
mod request;
mod response;
mod router;
mod server;

pub mod app;
pub mod guard;
pub mod interceptor;
pub mod middleware;
pub mod pipe;

pub use config::Config;
pub use context::{Marker, PipelineContext, Stage};
pub use dispatcher::{DEFAULT_DEADLINE, Dispatcher, DispatcherBuilder};
pub use error::Error;
pub use failure::{Failure, FailureKind};
pub use handler::{Args, BoxFuture, Handler};
pub use method::Method;
pub use normalizer::{ExceptionNormalizer, GENERIC_MESSAGE};
pub use request::Request;
pub use response::{IntoReply, Json, Response};
pub use router::{Controller, Route, RouteDescriptor, Router};
pub use server::Server;
