use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tellerkit_web::{
    AppSurface, FileContents, Filesystem, Framework, Handler, HandlerResult, ListenCallback,
    Method, Middleware, Request, Responder, Router, WebError,
};
use tracing::debug;

use crate::capture::{Arg, Capture};

fn object(value: Option<&Value>) -> Map<String, Value> {
    value.and_then(Value::as_object).cloned().unwrap_or_default()
}

/// A request with an empty body.
pub fn mock_req() -> Request {
    mock_req_with(json!({}))
}

/// A request built from defaults shallow-merged with `overrides`. Recognised
/// keys: `method`, `path`, `body`, `query`, `params`.
pub fn mock_req_with(overrides: Value) -> Request {
    let mut merged = json!({
        "method": "GET",
        "path": "/",
        "body": {},
        "query": {},
        "params": {},
    });
    if let (Some(base), Value::Object(overrides)) = (merged.as_object_mut(), overrides) {
        base.extend(overrides);
    }
    let method = merged["method"]
        .as_str()
        .and_then(Method::parse)
        .unwrap_or_default();
    let path = merged["path"].as_str().unwrap_or("/");
    let mut req = Request::new(method, path);
    req.body = object(merged.get("body"));
    req.query = object(merged.get("query"));
    req.params = object(merged.get("params"));
    req
}

/// Records `render`, `redirect` and `send`; renders nothing.
#[derive(Debug, Clone, Default)]
pub struct ResponseDouble {
    pub render: Capture,
    pub redirect: Capture,
    pub send: Capture,
}

pub fn mock_res() -> ResponseDouble {
    ResponseDouble::default()
}

impl ResponseDouble {
    pub fn rendered_view(&self) -> Option<String> {
        self.render
            .first_arg(0)
            .and_then(|view| view.as_str().map(str::to_string))
    }

    pub fn rendered_locals(&self) -> Option<Value> {
        self.render.first_arg(1)
    }
}

impl Responder for ResponseDouble {
    fn render(&mut self, view: &str, locals: Value) -> HandlerResult {
        self.render.record(vec![Arg::Value(json!(view)), Arg::Value(locals)]);
        Ok(())
    }

    fn redirect(&mut self, location: &str) -> HandlerResult {
        self.redirect.record(vec![Arg::Value(json!(location))]);
        Ok(())
    }

    fn send(&mut self, status: u16, content_type: &str, body: Vec<u8>) -> HandlerResult {
        self.send.record(vec![
            Arg::Value(json!(status)),
            Arg::Value(json!(content_type)),
            Arg::Value(json!(String::from_utf8_lossy(&body))),
        ]);
        Ok(())
    }

    /// Doubles never end a chain early.
    fn is_finished(&self) -> bool {
        false
    }
}

/// An application surface that records every wiring call.
#[derive(Debug, Clone, Default)]
pub struct AppSurfaceDouble {
    pub set: Capture,
    pub get: Capture,
    pub post: Capture,
    pub middleware: Capture,
    pub mount: Capture,
    pub listen: Capture,
}

impl AppSurface for AppSurfaceDouble {
    fn set(&mut self, key: &str, value: Value) {
        self.set.record(vec![Arg::Value(json!(key)), Arg::Value(value)]);
    }

    fn get(&mut self, path: &str, _handler: Arc<dyn Handler>) {
        self.get.record(vec![Arg::Value(json!(path)), Arg::Function]);
    }

    fn post(&mut self, path: &str, _handler: Arc<dyn Handler>) {
        self.post.record(vec![Arg::Value(json!(path)), Arg::Function]);
    }

    fn use_middleware(&mut self, middleware: Middleware) {
        self.middleware.record(vec![Arg::Value(json!(middleware.name()))]);
    }

    fn mount(&mut self, prefix: &str, router: Router) {
        self.mount.record(vec![Arg::Value(json!(prefix)), Arg::Router(router)]);
    }

    /// Records the call; the callback is dropped unrun.
    fn listen(&mut self, port: u16, _on_listening: ListenCallback) {
        debug!(port, "listen captured by double");
        self.listen.record(vec![Arg::Value(json!(port)), Arg::Function]);
    }
}

/// A framework whose applications are [`AppSurfaceDouble`]s sharing one set of
/// captures. Routers stay real so modules can still build them.
#[derive(Debug, Clone, Default)]
pub struct FrameworkDouble {
    pub application: Capture,
    pub router: Capture,
    app: AppSurfaceDouble,
}

impl FrameworkDouble {
    pub fn new() -> Self {
        FrameworkDouble::default()
    }

    pub fn app(&self) -> &AppSurfaceDouble {
        &self.app
    }
}

impl Framework for FrameworkDouble {
    fn application(&self) -> Box<dyn AppSurface> {
        self.application.record(Vec::new());
        Box::new(self.app.clone())
    }

    fn router(&self) -> Router {
        let router = Router::new();
        self.router.record(vec![Arg::Router(router.clone())]);
        router
    }
}

fn path_arg(path: &Path) -> Arg {
    Arg::Value(json!(path.to_string_lossy().replace('\\', "/")))
}

/// Passes reads through to a real filesystem, records every call and
/// swallows writes.
pub struct RecordingFs {
    inner: Arc<dyn Filesystem>,
    pub exists: Capture,
    pub reads: Capture,
    pub writes: Capture,
}

impl RecordingFs {
    pub fn new(inner: Arc<dyn Filesystem>) -> Self {
        RecordingFs {
            inner,
            exists: Capture::new(),
            reads: Capture::new(),
            writes: Capture::new(),
        }
    }

    /// True when some read of a path ending in `suffix` asked for an encoding.
    pub fn read_as_text(&self, suffix: &str) -> bool {
        self.reads.calls().iter().any(|args| {
            matches!(args.first().and_then(Arg::as_str), Some(p) if p.ends_with(suffix))
                && args.get(1).and_then(Arg::as_str).is_some()
        })
    }
}

impl Filesystem for RecordingFs {
    fn exists(&self, path: &Path) -> bool {
        self.exists.record(vec![path_arg(path)]);
        self.inner.exists(path)
    }

    fn read(&self, path: &Path, encoding: Option<&str>) -> Result<FileContents, WebError> {
        self.reads
            .record(vec![path_arg(path), Arg::Value(json!(encoding))]);
        self.inner.read(path, encoding)
    }

    fn write(&self, path: &Path, content: &str, encoding: &str) -> Result<(), WebError> {
        debug!(path = %path.display(), "write captured");
        self.writes.record(vec![
            path_arg(path),
            Arg::Value(json!(content)),
            Arg::Value(json!(encoding)),
        ]);
        Ok(())
    }
}
