use serde_json::{Map, Value};

use crate::router::Method;

/// An incoming request as seen by route handlers.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: Method,
    pub path: String,
    /// Parsed form fields. Empty unless a body parser ran.
    pub body: Map<String, Value>,
    pub query: Map<String, Value>,
    pub params: Map<String, Value>,
    pub content_type: Option<String>,
    pub raw_body: Vec<u8>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Request {
            method,
            path: path.into(),
            ..Request::default()
        }
    }

    /// Build from a request target, splitting off and decoding the query string.
    pub fn from_target(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        let mut req = Request::new(method, if path.is_empty() { "/" } else { path });
        if let Some(query) = query {
            req.query = decode_form(query.as_bytes());
        }
        req
    }

    pub fn with_raw_body(mut self, bytes: Vec<u8>, content_type: Option<String>) -> Self {
        self.raw_body = bytes;
        self.content_type = content_type;
        self
    }

    pub fn is_form(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.trim_start().starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false)
    }

    pub fn body_value(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// A body field as text. Numbers are rendered the way a form would send them.
    pub fn body_text(&self, key: &str) -> Option<String> {
        match self.body.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

pub(crate) fn decode_form(bytes: &[u8]) -> Map<String, Value> {
    url::form_urlencoded::parse(bytes)
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}
