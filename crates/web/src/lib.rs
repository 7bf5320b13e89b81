pub mod app;
pub mod config;
pub mod error;
pub mod fs;
pub mod handler;
pub mod module;
pub mod request;
pub mod response;
pub mod router;
pub mod serve;
pub mod slot;
pub mod template;
pub mod view;

#[cfg(test)]
mod tests;

pub use app::{App, AppSurface, Framework, ListenCallback, Middleware, Mount, WebFramework};
pub use config::ProjectLayout;
pub use error::WebError;
pub use fs::{DiskFs, FileContents, Filesystem, MemoryFs};
pub use handler::{handler, procedure, Handler, HandlerResult, HandlerSlot, Procedure, ProcedureSlot};
pub use module::{
    Dependencies, Export, Exports, LiveValue, ModuleEntry, ModuleError, ModuleRegistry,
    ModuleScope, Session,
};
pub use request::Request;
pub use response::{HttpResponse, Responder};
pub use router::{Method, RouteEntry, Router};
pub use slot::Slot;
pub use view::{ViewEngine, ViewRenderer};
