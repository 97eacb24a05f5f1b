//! Root controller: greeting, static data, an auth-gated route and a route
//! that fails on demand.

use serde_json::{Value, json};

use crate::failure::{Failure, FailureKind};
use crate::guard::{AuthGuard, LoggerGuard};
use crate::handler::Args;
use crate::interceptor::LoggerInterceptor;
use crate::pipe::{Binding, ParseIntPipe};
use crate::router::{Controller, Route};

pub const CONTROLLER: &str = "app";

pub fn controller() -> Controller {
    Controller::new(CONTROLLER, "/")
        .interceptor(LoggerInterceptor)
        .guard(LoggerGuard)
        .route(Route::get("/", hello))
        .route(Route::get("/data", data))
        .route(Route::get("/auth", check_auth).guard(AuthGuard))
        .route(
            Route::get("/exception/{code}", exception)
                .bind(Binding::param("code").pipe(ParseIntPipe)),
        )
}

async fn hello(_: Args) -> &'static str {
    "Hello Controller"
}

async fn data(_: Args) -> Value {
    json!({
        "users": [
            { "id": 1, "fullName": "saeed norouzi", "job": "developer" },
            { "id": 2, "fullName": "saeed norouzi", "job": "developer" },
        ]
    })
}

async fn check_auth(_: Args) -> &'static str {
    "You are already logged in"
}

async fn exception(mut args: Args) -> Result<(), Failure> {
    let code: i64 = args.take("code")?;
    Err(failure_for(code))
}

/// The failure `GET /exception/{code}` raises. Unmapped codes are `Internal`.
pub fn failure_for(code: i64) -> Failure {
    match code {
        400 => Failure::new(FailureKind::Validation),
        401 => Failure::unauthorized(),
        403 => Failure::forbidden("Access Blocked"),
        404 => Failure::new(FailureKind::NotFound),
        409 => Failure::conflict(),
        429 => Failure::rate_limited("too many requests"),
        _ => Failure::internal(),
    }
}
