//! Grading harness for the banking exercise.
//!
//! Each requirement script locates a route (or module, or view), observes it
//! through an interception handle or a double, drives it and checks what was
//! captured. A [`GradingContext`] holds the application loaded once for the
//! whole run.

pub mod capture;
pub mod client;
pub mod context;
pub mod doubles;
pub mod error;
pub mod inspect;
pub mod intercept;
pub mod loader;
pub mod locator;
pub mod report;
pub mod requirements;
pub mod suite;

#[cfg(test)]
mod tests;

pub use capture::{Arg, Capture, Matcher};
pub use client::{SimResponse, SimulatedClient};
pub use context::GradingContext;
pub use doubles::{mock_req, mock_req_with, mock_res, AppSurfaceDouble, FrameworkDouble, RecordingFs, ResponseDouble};
pub use error::{CheckError, Failure, HarnessError};
pub use intercept::{stub_handler, wrap_export, wrap_handler, wrap_procedure, wrap_renderer, InterceptionHandle};
pub use loader::{ModuleInstance, ModuleLoader, Substitutions};
pub use locator::{HandlerChain, RouteLocator};
pub use report::{Outcome, Report, Status};
pub use suite::{Group, Requirement, Suite};
