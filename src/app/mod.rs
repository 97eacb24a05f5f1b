//! The demonstration application: a root controller exercising guards,
//! pipes and failures, and a user controller over an in-memory store.

pub mod root;
pub mod user;

use std::sync::Arc;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::guard::LoggerGuard;
use crate::interceptor::{LoggerInterceptor, TransformInterceptor};
use crate::method::Method;
use crate::middleware::{MiddlewareScope, RequestId, RequestLogger};
use crate::router::Router;

pub use user::{CreateUserDto, User, UserStore};

/// Route table for both controllers.
pub fn router(store: Arc<UserStore>) -> Router {
    Router::new()
        .controller(root::controller())
        .controller(user::controller(store))
}

/// The fully wired dispatcher: route table, global middleware, guard and
/// interceptors, deadline from `config`.
pub fn dispatcher(config: &Config, store: Arc<UserStore>) -> Dispatcher {
    Dispatcher::builder(router(store))
        .middleware(RequestId, [MiddlewareScope::All])
        .middleware(RequestLogger::new("functional"), [MiddlewareScope::All])
        .middleware(
            RequestLogger::new("class"),
            [
                MiddlewareScope::path("/user/email"),
                MiddlewareScope::Controller(user::CONTROLLER),
                MiddlewareScope::Controller(root::CONTROLLER),
                MiddlewareScope::route(Method::Post, "/user"),
                MiddlewareScope::route(Method::Get, "/user"),
            ],
        )
        .guard(LoggerGuard)
        .interceptor(TransformInterceptor)
        .interceptor(LoggerInterceptor)
        .deadline(Some(config.request_timeout))
        .build()
}
