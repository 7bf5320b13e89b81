use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::WebError;
use crate::fs::Filesystem;
use crate::handler::{Handler, HandlerResult};
use crate::request::{decode_form, Request};
use crate::response::{HttpResponse, Responder};
use crate::router::{Method, RouteEntry, Router};
use crate::slot::Slot;
use crate::view::{Settings, ViewEngine, ViewRenderer};

/// Invoked once the server is accepting connections.
pub type ListenCallback = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Middleware {
    /// Decode `application/x-www-form-urlencoded` bodies into `req.body`.
    UrlEncoded,
    /// Serve files below a directory before routing.
    Static(PathBuf),
}

impl Middleware {
    pub fn name(&self) -> &'static str {
        match self {
            Middleware::UrlEncoded => "urlencoded",
            Middleware::Static(_) => "serveStatic",
        }
    }
}

/// The surface application modules program against. The real [`App`] and the
/// grading doubles both implement it.
pub trait AppSurface: Send + Sync {
    fn set(&mut self, key: &str, value: Value);
    fn get(&mut self, path: &str, handler: Arc<dyn Handler>);
    fn post(&mut self, path: &str, handler: Arc<dyn Handler>);
    fn use_middleware(&mut self, middleware: Middleware);
    fn mount(&mut self, prefix: &str, router: Router);
    fn listen(&mut self, port: u16, on_listening: ListenCallback);

    /// The live application behind this surface, if there is one.
    fn as_app(&self) -> Option<App> {
        None
    }
}

/// Creates applications and routers.
pub trait Framework: Send + Sync {
    fn application(&self) -> Box<dyn AppSurface>;
    fn router(&self) -> Router;
}

pub struct WebFramework {
    fs: Arc<dyn Filesystem>,
}

impl WebFramework {
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        WebFramework { fs }
    }
}

impl Framework for WebFramework {
    fn application(&self) -> Box<dyn AppSurface> {
        Box::new(App::new(Arc::clone(&self.fs)))
    }

    fn router(&self) -> Router {
        Router::new()
    }
}

#[derive(Debug, Clone)]
pub struct Mount {
    pub prefix: String,
    pub router: Router,
}

struct Listen {
    port: u16,
    on_listening: Option<ListenCallback>,
}

struct AppInner {
    settings: Settings,
    routes: Router,
    mounts: RwLock<Vec<Mount>>,
    middleware: RwLock<Vec<Middleware>>,
    renderer: Arc<Slot<dyn ViewRenderer>>,
    listen: Mutex<Option<Listen>>,
    fs: Arc<dyn Filesystem>,
}

/// A live application. Clones share the same routes, settings and hooks.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        let settings: Settings = Arc::new(RwLock::new(BTreeMap::new()));
        let engine: Arc<dyn ViewRenderer> =
            Arc::new(ViewEngine::new(Arc::clone(&fs), Arc::clone(&settings)));
        App {
            inner: Arc::new(AppInner {
                settings,
                routes: Router::new(),
                mounts: RwLock::new(Vec::new()),
                middleware: RwLock::new(Vec::new()),
                renderer: Arc::new(Slot::new(engine)),
                listen: Mutex::new(None),
                fs,
            }),
        }
    }

    pub fn setting(&self, key: &str) -> Option<Value> {
        self.inner
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Routes registered directly on the application.
    pub fn routes(&self) -> &Router {
        &self.inner.routes
    }

    pub fn mounts(&self) -> Vec<Mount> {
        self.inner
            .mounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn middleware(&self) -> Vec<Middleware> {
        self.inner
            .middleware
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The full table: own entries first, then each mount's entries under its
    /// prefix, in mount order.
    pub fn route_table(&self) -> Vec<RouteEntry> {
        let mut table = self.inner.routes.entries();
        for mount in self.mounts() {
            table.extend(
                mount
                    .router
                    .entries()
                    .iter()
                    .map(|entry| entry.mounted_at(&mount.prefix)),
            );
        }
        table
    }

    pub fn renderer(&self) -> &Arc<Slot<dyn ViewRenderer>> {
        &self.inner.renderer
    }

    /// Render a view through the render hook.
    pub fn render(&self, view: &str, locals: &Value) -> Result<String, WebError> {
        self.inner.renderer.get().render(view, locals)
    }

    pub fn listening_port(&self) -> Option<u16> {
        self.inner
            .listen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|listen| listen.port)
    }

    pub fn take_listen_callback(&self) -> Option<ListenCallback> {
        self.inner
            .listen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
            .and_then(|listen| listen.on_listening.take())
    }

    /// Run one request through middleware and the route table.
    pub fn dispatch(&self, mut req: Request) -> HttpResponse {
        debug!(method = %req.method, path = %req.path, "dispatch");
        for middleware in self.middleware() {
            match middleware {
                Middleware::UrlEncoded => {
                    if req.is_form() {
                        req.body = decode_form(&req.raw_body);
                    }
                }
                Middleware::Static(dir) => {
                    if let Some(response) = self.serve_static(&dir, &req) {
                        return response;
                    }
                }
            }
        }

        let Some(entry) = self
            .route_table()
            .into_iter()
            .find(|entry| entry.matches(&req.path, req.method))
        else {
            let err = WebError::NotFound {
                method: req.method.to_string(),
                path: req.path.clone(),
            };
            return HttpResponse::text(err.status(), err.to_string());
        };

        let mut responder = LiveResponder {
            renderer: Arc::clone(&self.inner.renderer),
            response: None,
        };
        match run_chain(&entry, &mut req, &mut responder) {
            Ok(()) => responder.response.unwrap_or_else(|| {
                warn!(path = %req.path, "route chain finished without responding");
                HttpResponse::text(500, "route handler did not respond")
            }),
            Err(err) => {
                warn!(path = %req.path, error = %err, "route handler failed");
                HttpResponse::text(err.status(), err.to_string())
            }
        }
    }

    fn serve_static(&self, dir: &Path, req: &Request) -> Option<HttpResponse> {
        if req.method != Method::Get {
            return None;
        }
        let relative = Path::new(req.path.trim_start_matches('/'));
        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        let file = dir.join(relative);
        if !self.inner.fs.exists(&file) {
            return None;
        }
        match self.inner.fs.read(&file, None) {
            Ok(contents) => {
                let mime = mime_guess::from_path(&file).first_or_octet_stream();
                Some(HttpResponse::new(200, mime.as_ref(), contents.into_bytes()))
            }
            Err(_) => None,
        }
    }
}

fn run_chain(entry: &RouteEntry, req: &mut Request, res: &mut LiveResponder) -> HandlerResult {
    for slot in &entry.chain {
        slot.get().handle(req, res)?;
        if res.is_finished() {
            break;
        }
    }
    Ok(())
}

struct LiveResponder {
    renderer: Arc<Slot<dyn ViewRenderer>>,
    response: Option<HttpResponse>,
}

impl Responder for LiveResponder {
    fn render(&mut self, view: &str, locals: Value) -> HandlerResult {
        let html = self.renderer.get().render(view, &locals)?;
        self.response = Some(HttpResponse::html(html));
        Ok(())
    }

    fn redirect(&mut self, location: &str) -> HandlerResult {
        self.response = Some(HttpResponse::redirect(location));
        Ok(())
    }

    fn send(&mut self, status: u16, content_type: &str, body: Vec<u8>) -> HandlerResult {
        self.response = Some(HttpResponse::new(status, content_type, body));
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.response.is_some()
    }
}

impl AppSurface for App {
    fn set(&mut self, key: &str, value: Value) {
        self.inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn get(&mut self, path: &str, handler: Arc<dyn Handler>) {
        self.inner.routes.get(path, handler);
    }

    fn post(&mut self, path: &str, handler: Arc<dyn Handler>) {
        self.inner.routes.post(path, handler);
    }

    fn use_middleware(&mut self, middleware: Middleware) {
        self.inner
            .middleware
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(middleware);
    }

    fn mount(&mut self, prefix: &str, router: Router) {
        self.inner
            .mounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Mount {
                prefix: prefix.to_string(),
                router,
            });
    }

    /// Records the port and callback. Binding happens in [`crate::serve`].
    fn listen(&mut self, port: u16, on_listening: ListenCallback) {
        *self
            .inner
            .listen
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Listen {
            port,
            on_listening: Some(on_listening),
        });
    }

    fn as_app(&self) -> Option<App> {
        Some(self.clone())
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.inner.routes.len())
            .field("mounts", &self.mounts().len())
            .field("middleware", &self.middleware())
            .finish()
    }
}

