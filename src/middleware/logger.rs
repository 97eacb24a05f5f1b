use tracing::info;

use super::{Advance, Advanced, Middleware};
use crate::failure::Failure;
use crate::handler::BoxFuture;
use crate::request::Request;

/// Logs method and path of every request it is scoped to, then continues.
pub struct RequestLogger {
    label: &'static str,
}

impl RequestLogger {
    /// `label` distinguishes several registrations in the log output.
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl Middleware for RequestLogger {
    fn name(&self) -> &'static str {
        self.label
    }

    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        next: Advance,
    ) -> BoxFuture<'a, Result<Advanced, Failure>> {
        Box::pin(async move {
            info!(middleware = self.label, method = %req.method(), path = req.path(), "request received");
            Ok(next.proceed())
        })
    }
}
