//! Pipes: per-argument validation and transformation.
//!
//! A route declares its handler arguments as [`Binding`]s. Each binding names
//! where the raw value comes from (path parameter, query field, body or body
//! field) and the pipes that value goes through, in order. The dispatcher
//! resolves every binding after the guards pass; the first pipe failure aborts
//! the request and the handler never sees a partial argument list.

use std::collections::HashMap;
use std::future::ready;
use std::marker::PhantomData;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use validator::Validate;

use crate::failure::Failure;
use crate::handler::{Args, BoxFuture};
use crate::request::Request;

/// A transformation applied to one extracted value.
pub trait Pipe: Send + Sync + 'static {
    fn transform<'a>(&'a self, value: Value) -> BoxFuture<'a, Result<Value, Failure>>;
}

pub(crate) type BoxedPipe = Arc<dyn Pipe>;

/// Lifts a synchronous function into a [`Pipe`].
pub fn pipe_fn<F>(f: F) -> FnPipe<F>
where
    F: Fn(Value) -> Result<Value, Failure> + Send + Sync + 'static,
{
    FnPipe(f)
}

pub struct FnPipe<F>(F);

impl<F> Pipe for FnPipe<F>
where
    F: Fn(Value) -> Result<Value, Failure> + Send + Sync + 'static,
{
    fn transform<'a>(&'a self, value: Value) -> BoxFuture<'a, Result<Value, Failure>> {
        Box::pin(ready((self.0)(value)))
    }
}

// ── Bindings ──────────────────────────────────────────────────────────────────

/// Where a bound argument is extracted from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Source {
    Param(&'static str),
    Query(&'static str),
    /// The whole JSON body.
    Body,
    /// One top-level field of the JSON body.
    BodyField(&'static str),
}

impl Source {
    /// Raw value before any pipe. Absent values come out as `null`.
    fn extract(&self, req: &Request) -> Value {
        let text = |s: Option<&str>| s.map_or(Value::Null, |s| Value::String(s.to_owned()));
        match self {
            Self::Param(name) => text(req.param(name)),
            Self::Query(name) => text(req.query(name)),
            Self::Body => req.body().clone(),
            Self::BodyField(name) => req.body().get(name).cloned().unwrap_or(Value::Null),
        }
    }
}

/// One handler argument: its name, its source and its pipes.
pub struct Binding {
    name: &'static str,
    source: Source,
    pipes: Vec<BoxedPipe>,
}

impl Binding {
    pub fn param(name: &'static str) -> Self {
        Self::new(name, Source::Param(name))
    }

    pub fn query(name: &'static str) -> Self {
        Self::new(name, Source::Query(name))
    }

    /// The whole body, bound as `"body"`.
    pub fn body() -> Self {
        Self::new("body", Source::Body)
    }

    pub fn body_field(name: &'static str) -> Self {
        Self::new(name, Source::BodyField(name))
    }

    fn new(name: &'static str, source: Source) -> Self {
        Self { name, source, pipes: Vec::new() }
    }

    /// Appends a pipe. Pipes run in the order they were added.
    pub fn pipe(mut self, pipe: impl Pipe) -> Self {
        self.pipes.push(Arc::new(pipe));
        self
    }

    pub fn name(&self) -> &'static str { self.name }
    pub fn source(&self) -> &Source { &self.source }
}

/// Extracts and pipes every binding, in declaration order. `global` pipes run
/// first on whole-body bindings.
pub(crate) async fn resolve(
    global: &[BoxedPipe],
    bindings: &[Binding],
    request: Arc<Request>,
) -> Result<Args, Failure> {
    let mut values = HashMap::with_capacity(bindings.len());
    for binding in bindings {
        let mut value = binding.source.extract(&request);
        if binding.source == Source::Body {
            for pipe in global {
                value = pipe.transform(value).await?;
            }
        }
        for pipe in &binding.pipes {
            value = pipe.transform(value).await?;
        }
        values.insert(binding.name, value);
    }
    Ok(Args::new(request, values))
}

// ── Built-in pipes ────────────────────────────────────────────────────────────

/// Parses a base-10 integer (optionally negative) into a JSON number.
///
/// Accepts a string of digits or a JSON integer; anything else, including
/// values that overflow `i64`, is a `Validation` failure.
pub struct ParseIntPipe;

impl ParseIntPipe {
    const MESSAGE: &'static str = "Validation failed (numeric string is expected)";

    pub fn parse(value: &Value) -> Result<i64, Failure> {
        let parsed = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => {
                let digits = s.strip_prefix('-').unwrap_or(s);
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                    s.parse().ok()
                } else {
                    None
                }
            }
            _ => None,
        };
        parsed.ok_or_else(|| Failure::validation(Self::MESSAGE))
    }
}

impl Pipe for ParseIntPipe {
    fn transform<'a>(&'a self, value: Value) -> BoxFuture<'a, Result<Value, Failure>> {
        Box::pin(ready(Self::parse(&value).map(Value::from)))
    }
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    const ATOM: &str = r"[a-zA-Z0-9!#$%&'*+\-/=?^_`{|}~]+";
    const LABEL: &str = r"[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?";
    let pattern = format!(r"^{ATOM}(?:\.{ATOM})*@{LABEL}(?:\.{LABEL})*\.[a-zA-Z]+$");
    Regex::new(&pattern).unwrap_or_else(|e| panic!("email pattern: {e}"))
});

/// Canonical email grammar: dot-separated atoms, a single `@`, dot-separated
/// domain labels that neither start nor end with `-`, an alphabetic TLD, and
/// at most 256 characters overall.
pub fn is_valid_email(candidate: &str) -> bool {
    (1..=256).contains(&candidate.chars().count()) && EMAIL.is_match(candidate)
}

/// Passes a valid email string through unchanged.
pub struct EmailPipe;

impl Pipe for EmailPipe {
    fn transform<'a>(&'a self, value: Value) -> BoxFuture<'a, Result<Value, Failure>> {
        let outcome = if value.as_str().is_some_and(is_valid_email) {
            Ok(value)
        } else {
            Err(Failure::validation("Invalid email format"))
        };
        Box::pin(ready(outcome))
    }
}

/// Deserializes the value into `T` and runs its `validator` rules.
///
/// On success the value is re-serialized from `T`, so unknown fields are
/// dropped. On failure the message lists every broken rule and the detail
/// maps each field to its messages. Field types are checked only as far as
/// `T` declares them: a `T` with loosely typed fields (`serde_json::Value`)
/// plus `validator` rules reports type mismatches as rule messages.
pub struct ValidationPipe<T>(PhantomData<fn() -> T>);

impl<T> ValidationPipe<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for ValidationPipe<T> {
    fn default() -> Self { Self::new() }
}

impl<T> ValidationPipe<T>
where
    T: DeserializeOwned + Serialize + Validate,
{
    const SHAPE: &'static str = "request body does not match the expected shape";

    fn check(value: Value) -> Result<Value, Failure> {
        let dto: T = serde_json::from_value(value)
            .map_err(|e| Failure::validation(Self::SHAPE).with_detail(Value::String(e.to_string())))?;

        if let Err(errors) = dto.validate() {
            let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));

            let mut messages = Vec::new();
            let mut detail = Map::new();
            for (field, errs) in fields {
                let field_messages: Vec<String> = errs.iter()
                    .map(|e| match &e.message {
                        Some(m) => m.to_string(),
                        None => format!("{field} failed rule `{}`", e.code),
                    })
                    .collect();
                messages.extend(field_messages.iter().cloned());
                detail.insert(field.to_string(), Value::from(field_messages));
            }
            return Err(Failure::validation(messages.join("; ")).with_detail(Value::Object(detail)));
        }

        serde_json::to_value(dto)
            .map_err(|e| Failure::internal().with_detail(Value::String(e.to_string())))
    }
}

impl<T> Pipe for ValidationPipe<T>
where
    T: DeserializeOwned + Serialize + Validate + 'static,
{
    fn transform<'a>(&'a self, value: Value) -> BoxFuture<'a, Result<Value, Failure>> {
        Box::pin(ready(Self::check(value)))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::failure::FailureKind;
    use crate::method::Method;

    #[test]
    fn parse_int_accepts_base10_integers_only() {
        assert_eq!(ParseIntPipe::parse(&json!("42")), Ok(42));
        assert_eq!(ParseIntPipe::parse(&json!("-7")), Ok(-7));
        assert_eq!(ParseIntPipe::parse(&json!(3)), Ok(3));
        for bad in [json!("abc"), json!("1.5"), json!("+1"), json!(""), json!("-"), json!(" 1"),
                    json!("0x10"), json!("99999999999999999999"), json!(2.5), Value::Null] {
            let err = ParseIntPipe::parse(&bad).unwrap_err();
            assert_eq!(err.kind(), FailureKind::Validation, "{bad}");
        }
    }

    #[test]
    fn email_grammar() {
        for ok in ["a@b.co", "first.last@sub.example.org", "o'neil+tag@x-y.io"] {
            assert!(is_valid_email(ok), "{ok}");
        }
        for bad in ["not-an-email", "a@b", "a@@b.co", "a@b@c.co", ".a@b.co", "a..b@c.co",
                    "a@-b.co", "a@b-.co", "a@b..co", "a@b.c0", "", "a b@c.co"] {
            assert!(!is_valid_email(bad), "{bad}");
        }
        let long = format!("{}@b.co", "a".repeat(260));
        assert!(!is_valid_email(&long));
    }

    #[tokio::test]
    async fn email_pipe_echoes_valid_input() {
        assert_eq!(EmailPipe.transform(json!("a@b.co")).await, Ok(json!("a@b.co")));
        let err = EmailPipe.transform(json!(12)).await.unwrap_err();
        assert_eq!(err.message(), "Invalid email format");
    }

    #[derive(Deserialize, Serialize, Validate)]
    struct Named {
        #[validate(length(min = 2, message = "name too short"))]
        name: String,
    }

    #[tokio::test]
    async fn validation_pipe_reports_rules_and_drops_unknown_fields() {
        let pipe = ValidationPipe::<Named>::new();
        assert_eq!(pipe.transform(json!({"name": "ok", "extra": 1})).await, Ok(json!({"name": "ok"})));

        let err = pipe.transform(json!({"name": "x"})).await.unwrap_err();
        assert_eq!(err.message(), "name too short");
        assert_eq!(err.detail(), Some(&json!({"name": ["name too short"]})));

        let err = pipe.transform(json!({"name": 5})).await.unwrap_err();
        assert_eq!(err.message(), "request body does not match the expected shape");
        assert!(err.detail().is_some());
    }

    #[tokio::test]
    async fn resolve_runs_pipes_in_order_and_stops_at_first_failure() {
        let mut req = Request::new(Method::Post, "/x?q=z").with_body(json!({"n": "5"}));
        req.params.insert("id".into(), "12".into());
        let req = Arc::new(req);

        let bindings = [
            Binding::param("id").pipe(ParseIntPipe),
            Binding::body_field("n").pipe(ParseIntPipe).pipe(pipe_fn(|v| Ok(json!(v.as_i64().unwrap_or(0) * 2)))),
            Binding::query("q"),
        ];
        let mut args = resolve(&[], &bindings, Arc::clone(&req)).await.unwrap();
        assert_eq!(args.take::<i64>("id"), Ok(12));
        assert_eq!(args.take::<i64>("n"), Ok(10));
        assert_eq!(args.take::<String>("q"), Ok("z".into()));

        let failing = [
            Binding::query("missing").pipe(ParseIntPipe),
            Binding::param("id").pipe(pipe_fn(|_| panic!("must not run"))),
        ];
        let err = resolve(&[], &failing, Arc::clone(&req)).await.err().unwrap();
        assert_eq!(err.status(), 400);
    }

    #[tokio::test]
    async fn global_pipes_run_first_and_only_on_whole_bodies() {
        let req = Arc::new(Request::new(Method::Post, "/").with_body(json!({"n": 1})));
        let global: Vec<BoxedPipe> = vec![Arc::new(pipe_fn(|v| Ok(json!({"wrapped": v}))))];
        let bindings = [
            Binding::body().pipe(pipe_fn(|v| Ok(json!([v])))),
            Binding::body_field("n"),
        ];

        let args = resolve(&global, &bindings, req).await.unwrap();
        assert_eq!(args.get("body"), Some(&json!([{"wrapped": {"n": 1}}])));
        assert_eq!(args.get("n"), Some(&json!(1)));
    }
}
