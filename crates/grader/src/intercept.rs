use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use tellerkit_web::{
    App, Export, Exports, Handler, HandlerResult, HandlerSlot, Method, Procedure, ProcedureSlot,
    Request, Responder, Slot, ViewRenderer, WebError,
};
use tracing::debug;

use crate::error::HarnessError;

#[derive(Debug, Clone)]
pub struct HandlerCall {
    pub method: Method,
    pub path: String,
    pub body: Map<String, Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RenderCall {
    pub view: String,
    pub locals: Value,
}

#[derive(Debug, Clone)]
pub struct ProcedureCall {
    pub error: Option<String>,
}

type Calls<C> = Arc<Mutex<Vec<C>>>;

fn push<C>(calls: &Calls<C>, call: C) {
    calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
}

/// An observer installed in a slot. Restores the original on `restore` or on
/// drop, whichever comes first. Handles on the same slot must be restored in
/// reverse order of wrapping.
pub struct InterceptionHandle<T: ?Sized, C> {
    slot: Arc<Slot<T>>,
    original: Arc<T>,
    calls: Calls<C>,
    restored: bool,
}

impl<T: ?Sized, C: Clone> InterceptionHandle<T, C> {
    fn install(slot: &Arc<Slot<T>>, proxy: Arc<T>, calls: Calls<C>) -> Self {
        let original = slot.replace(proxy);
        InterceptionHandle {
            slot: Arc::clone(slot),
            original,
            calls,
            restored: false,
        }
    }

    pub fn calls(&self) -> Vec<C> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn called(&self) -> bool {
        self.call_count() > 0
    }

    pub fn first_call(&self) -> Option<C> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .first()
            .cloned()
    }

    pub fn original(&self) -> &Arc<T> {
        &self.original
    }

    /// Put the original back. Safe to call more than once.
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.slot.replace(Arc::clone(&self.original));
        self.restored = true;
        debug!("interception restored");
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }
}

impl<T: ?Sized, C> Drop for InterceptionHandle<T, C> {
    fn drop(&mut self) {
        if !self.restored {
            self.slot.replace(Arc::clone(&self.original));
            self.restored = true;
        }
    }
}

pub type HandlerSpy = InterceptionHandle<dyn Handler, HandlerCall>;
pub type RenderSpy = InterceptionHandle<dyn ViewRenderer, RenderCall>;
pub type ProcedureSpy = InterceptionHandle<dyn Procedure, ProcedureCall>;

struct HandlerProxy {
    target: Option<Arc<dyn Handler>>,
    calls: Calls<HandlerCall>,
}

impl Handler for HandlerProxy {
    fn handle(&self, req: &mut Request, res: &mut dyn Responder) -> HandlerResult {
        let mut call = HandlerCall {
            method: req.method,
            path: req.path.clone(),
            body: req.body.clone(),
            error: None,
        };
        let result = match &self.target {
            Some(target) => target.handle(req, res),
            None => Ok(()),
        };
        if let Err(err) = &result {
            call.error = Some(err.to_string());
        }
        push(&self.calls, call);
        result
    }
}

fn intercept_handler(slot: &HandlerSlot, forward: bool) -> HandlerSpy {
    let calls: Calls<HandlerCall> = Arc::default();
    let proxy: Arc<dyn Handler> = Arc::new(HandlerProxy {
        target: forward.then(|| slot.get()),
        calls: Arc::clone(&calls),
    });
    InterceptionHandle::install(slot, proxy, calls)
}

/// Observe a route handler. Calls are forwarded unchanged.
pub fn wrap_handler(slot: &HandlerSlot) -> HandlerSpy {
    intercept_handler(slot, true)
}

/// Replace a route handler with a recorder that does nothing.
pub fn stub_handler(slot: &HandlerSlot) -> HandlerSpy {
    intercept_handler(slot, false)
}

impl HandlerSpy {
    /// Call whatever the slot holds now (the proxy, while installed).
    pub fn invoke(&self, req: &mut Request, res: &mut dyn Responder) -> HandlerResult {
        self.slot.get().handle(req, res)
    }
}

struct RenderProxy {
    target: Arc<dyn ViewRenderer>,
    calls: Calls<RenderCall>,
}

impl ViewRenderer for RenderProxy {
    fn render(&self, view: &str, locals: &Value) -> Result<String, WebError> {
        push(
            &self.calls,
            RenderCall {
                view: view.to_string(),
                locals: locals.clone(),
            },
        );
        self.target.render(view, locals)
    }
}

/// Observe the application's render hook.
pub fn wrap_renderer(app: &App) -> RenderSpy {
    let calls: Calls<RenderCall> = Arc::default();
    let slot = app.renderer();
    let proxy: Arc<dyn ViewRenderer> = Arc::new(RenderProxy {
        target: slot.get(),
        calls: Arc::clone(&calls),
    });
    InterceptionHandle::install(slot, proxy, calls)
}

struct ProcedureProxy {
    target: Arc<dyn Procedure>,
    calls: Calls<ProcedureCall>,
}

impl Procedure for ProcedureProxy {
    fn call(&self) -> Result<(), WebError> {
        let result = self.target.call();
        push(
            &self.calls,
            ProcedureCall {
                error: result.as_ref().err().map(ToString::to_string),
            },
        );
        result
    }
}

/// Observe an exported procedure.
pub fn wrap_procedure(slot: &ProcedureSlot) -> ProcedureSpy {
    let calls: Calls<ProcedureCall> = Arc::default();
    let proxy: Arc<dyn Procedure> = Arc::new(ProcedureProxy {
        target: slot.get(),
        calls: Arc::clone(&calls),
    });
    InterceptionHandle::install(slot, proxy, calls)
}

impl ProcedureSpy {
    pub fn invoke(&self) -> Result<(), WebError> {
        self.slot.get().call()
    }
}

/// Observe the binding `name` of a module's exports. `Ok(None)` when the
/// binding is absent; an error when it exists but is not a function.
pub fn wrap_export(exports: &Exports, name: &str) -> Result<Option<ProcedureSpy>, HarnessError> {
    match exports.get(name) {
        None => Ok(None),
        Some(Export::Procedure(slot)) => Ok(Some(wrap_procedure(slot))),
        Some(other) => Err(HarnessError::NotCallable {
            name: name.to_string(),
            kind: other.kind(),
        }),
    }
}
