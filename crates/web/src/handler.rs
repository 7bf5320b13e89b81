use std::sync::Arc;

use crate::error::WebError;
use crate::request::Request;
use crate::response::Responder;
use crate::slot::Slot;

pub type HandlerResult = Result<(), WebError>;

/// A route handler: reads the request, answers through the responder.
pub trait Handler: Send + Sync {
    fn handle(&self, req: &mut Request, res: &mut dyn Responder) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&mut Request, &mut dyn Responder) -> HandlerResult + Send + Sync,
{
    fn handle(&self, req: &mut Request, res: &mut dyn Responder) -> HandlerResult {
        self(req, res)
    }
}

/// Box a closure as a handler.
pub fn handler<F>(f: F) -> Arc<dyn Handler>
where
    F: Fn(&mut Request, &mut dyn Responder) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

pub type HandlerSlot = Arc<Slot<dyn Handler>>;

pub fn handler_slot(handler: Arc<dyn Handler>) -> HandlerSlot {
    Arc::new(Slot::new(handler))
}

/// A zero-argument operation a module exports, such as persisting state.
pub trait Procedure: Send + Sync {
    fn call(&self) -> Result<(), WebError>;
}

impl<F> Procedure for F
where
    F: Fn() -> Result<(), WebError> + Send + Sync,
{
    fn call(&self) -> Result<(), WebError> {
        self()
    }
}

pub type ProcedureSlot = Arc<Slot<dyn Procedure>>;

pub fn procedure<F>(f: F) -> ProcedureSlot
where
    F: Fn() -> Result<(), WebError> + Send + Sync + 'static,
{
    let callable: Arc<dyn Procedure> = Arc::new(f);
    Arc::new(Slot::new(callable))
}
