//! Incoming request type.
//!
//! A [`Request`] is mutable while the middleware phase runs (middleware gets
//! `&mut Request`) and frozen afterwards: the dispatcher moves it into the
//! [`PipelineContext`](crate::PipelineContext), which only hands out shared
//! references.

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::Value;

use crate::failure::Failure;
use crate::method::Method;

/// An incoming HTTP request with a parsed JSON body.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    target: String,
    path: String,
    query: HashMap<String, String>,
    headers: Vec<(String, String)>,
    body: Value,
    pub(crate) params: HashMap<String, String>,
    extensions: HashMap<String, Value>,
}

impl Request {
    /// Builds a request for `target` (path plus optional `?query`) with no
    /// headers and a `null` body.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, HashMap::new()),
        };
        Self {
            method,
            target: target.to_owned(),
            path: path.to_owned(),
            query,
            headers: Vec::new(),
            body: Value::Null,
            params: HashMap::new(),
            extensions: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Converts hyper's request head plus the collected body bytes.
    ///
    /// An unsupported method surfaces as `NotFound` (no route can match it);
    /// a non-empty body that is not JSON is a `Validation` failure.
    pub(crate) fn from_http(parts: &http::request::Parts, body: &Bytes) -> Result<Self, Failure> {
        let target = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
        let method: Method = parts.method.as_str().parse().map_err(|()| {
            Failure::not_found(format!("Cannot {} {}", parts.method, parts.uri.path()))
        })?;

        let mut req = Self::new(method, target);
        req.headers = parts.headers.iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect();
        if !body.is_empty() {
            req.body = serde_json::from_slice(body)
                .map_err(|e| Failure::validation(format!("malformed JSON body: {e}")))?;
        }
        Ok(req)
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &Value { &self.body }

    /// Path plus query string, exactly as received.
    pub fn target(&self) -> &str { &self.target }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header, replacing any existing value under the same
    /// case-insensitive name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/user/{id}`, `req.param("id")` on `/user/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// A field derived by middleware (request id, timestamps, ...).
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    pub fn insert_extension(&mut self, key: impl Into<String>, value: Value) {
        self.extensions.insert(key.into(), value);
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_path_and_decodes_query() {
        let req = Request::new(Method::Get, "/user?name=ada%20l&x=1");
        assert_eq!(req.path(), "/user");
        assert_eq!(req.target(), "/user?name=ada%20l&x=1");
        assert_eq!(req.query("name"), Some("ada l"));
        assert_eq!(req.query("missing"), None);
    }

    #[test]
    fn headers_are_case_insensitive_and_replaced() {
        let mut req = Request::new(Method::Get, "/").with_header("Authorization", "a");
        assert_eq!(req.header("authorization"), Some("a"));
        req.set_header("AUTHORIZATION", "b");
        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.header("Authorization"), Some("b"));
    }

    #[test]
    fn rejects_malformed_json_and_unknown_methods() {
        let (parts, ()) = http::Request::post("/user").body(()).unwrap().into_parts();
        let err = Request::from_http(&parts, &Bytes::from_static(b"{oops")).unwrap_err();
        assert_eq!(err.status(), 400);

        let (parts, ()) = http::Request::head("/").body(()).unwrap().into_parts();
        let err = Request::from_http(&parts, &Bytes::new()).unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn parses_json_body() {
        let (parts, ()) = http::Request::post("/user/email")
            .header("content-type", "application/json")
            .body(())
            .unwrap()
            .into_parts();
        let req = Request::from_http(&parts, &Bytes::from_static(br#"{"email":"a@b.co"}"#)).unwrap();
        assert_eq!(req.method(), Method::Post);
        assert_eq!(req.body()["email"], "a@b.co");
        assert_eq!(req.header("Content-Type"), Some("application/json"));
    }
}
