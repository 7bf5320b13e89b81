use serde_json::Value;

use crate::handler::HandlerResult;

/// How a handler answers. The live implementation renders through the
/// application's view hook; test doubles only record.
pub trait Responder {
    fn render(&mut self, view: &str, locals: Value) -> HandlerResult;
    fn redirect(&mut self, location: &str) -> HandlerResult;
    fn send(&mut self, status: u16, content_type: &str, body: Vec<u8>) -> HandlerResult;
    fn is_finished(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        HttpResponse {
            status,
            content_type: Some(content_type.to_string()),
            location: None,
            body,
        }
    }

    pub fn html(html: String) -> Self {
        HttpResponse::new(200, "text/html; charset=utf-8", html.into_bytes())
    }

    pub fn text(status: u16, text: impl Into<String>) -> Self {
        HttpResponse::new(status, "text/plain; charset=utf-8", text.into().into_bytes())
    }

    pub fn redirect(location: &str) -> Self {
        let mut response = HttpResponse::text(302, format!("Found. Redirecting to {location}"));
        response.location = Some(location.to_string());
        response
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
