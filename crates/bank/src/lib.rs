//! The reference banking application.
//!
//! Four modules mirror the classroom project layout: `app` wires the
//! application, `data` owns the JSON-backed account and user state, and the
//! two route modules build routers the app mounts.

pub mod app;
pub mod data;
pub mod error;
pub mod routes;

#[cfg(test)]
mod tests;

use std::path::PathBuf;

use tellerkit_web::ModuleRegistry;

pub use data::{Account, Accounts, SharedAccounts, Transaction, User};
pub use error::BankError;

/// The application's module graph.
pub fn modules() -> ModuleRegistry {
    ModuleRegistry::new()
        .register("app", app::entry)
        .register("data", data::entry)
        .register("routes/accounts", routes::accounts::entry)
        .register("routes/services", routes::services::entry)
}

/// Directory holding `src/views`, `src/public` and `src/json`.
pub fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}
