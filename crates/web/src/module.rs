//! Application modules with explicit dependencies.
//!
//! A module is an entry function that receives a [`ModuleScope`] and returns
//! its [`Exports`]. The scope is the only way a module reaches the framework,
//! the filesystem or another module, so a loader can substitute any of them.

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::app::{App, AppSurface, Framework, WebFramework};
use crate::config::ProjectLayout;
use crate::fs::{DiskFs, FileContents, Filesystem};
use crate::handler::ProcedureSlot;
use crate::router::Router;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModuleError {
    #[error("cannot find module `{0}`")]
    Unknown(String),

    #[error("cyclic require: {0}")]
    Cycle(String),

    #[error("module `{module}` does not export `{name}`")]
    MissingExport { module: String, name: String },

    #[error("module `{module}` exports `{name}` as {found}, expected {expected}")]
    ExportKind {
        module: String,
        name: String,
        found: &'static str,
        expected: &'static str,
    },

    #[error("module `{module}` failed to load: {reason}")]
    Entry { module: String, reason: String },
}

/// Shared state a module exposes by reference. Readers take snapshots.
pub trait LiveValue: Send + Sync {
    fn snapshot(&self) -> Value;
    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone)]
pub enum Export {
    App(Arc<dyn AppSurface>),
    Router(Router),
    Procedure(ProcedureSlot),
    Live(Arc<dyn LiveValue>),
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl Export {
    pub fn kind(&self) -> &'static str {
        match self {
            Export::App(_) => "an application",
            Export::Router(_) => "a router",
            Export::Procedure(_) => "a function",
            Export::Live(_) | Export::Json(_) => "a value",
            Export::Text(_) => "text",
            Export::Bytes(_) => "bytes",
        }
    }

    pub fn as_router(&self) -> Option<&Router> {
        match self {
            Export::Router(router) => Some(router),
            _ => None,
        }
    }

    pub fn as_procedure(&self) -> Option<&ProcedureSlot> {
        match self {
            Export::Procedure(slot) => Some(slot),
            _ => None,
        }
    }

    pub fn as_app(&self) -> Option<App> {
        match self {
            Export::App(surface) => surface.as_app(),
            _ => None,
        }
    }

    /// Current value of data exports; `None` for behaviour.
    pub fn snapshot(&self) -> Option<Value> {
        match self {
            Export::Live(live) => Some(live.snapshot()),
            Export::Json(value) => Some(value.clone()),
            Export::Text(text) => Some(Value::String(text.clone())),
            _ => None,
        }
    }
}

impl From<FileContents> for Export {
    fn from(contents: FileContents) -> Self {
        match contents {
            FileContents::Text(text) => Export::Text(text),
            FileContents::Bytes(bytes) => Export::Bytes(bytes),
        }
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Export::Router(router) => fmt::Debug::fmt(router, f),
            Export::Json(value) => write!(f, "Json({value})"),
            Export::Text(text) => write!(f, "Text({} chars)", text.len()),
            Export::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            other => f.write_str(other.kind()),
        }
    }
}

/// Named bindings a module hands to whoever requires it.
#[derive(Debug, Clone, Default)]
pub struct Exports {
    module: String,
    items: BTreeMap<String, Export>,
}

impl Exports {
    pub fn new(module: &str) -> Self {
        Exports {
            module: module.to_string(),
            items: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, export: Export) -> Self {
        self.items.insert(name.to_string(), export);
        self
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn get(&self, name: &str) -> Option<&Export> {
        self.items.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn require(&self, name: &str) -> Result<&Export, ModuleError> {
        self.items.get(name).ok_or_else(|| ModuleError::MissingExport {
            module: self.module.clone(),
            name: name.to_string(),
        })
    }

    pub fn router(&self, name: &str) -> Result<Router, ModuleError> {
        let export = self.require(name)?;
        export
            .as_router()
            .cloned()
            .ok_or_else(|| self.kind_error(name, export, "a router"))
    }

    pub fn procedure(&self, name: &str) -> Result<ProcedureSlot, ModuleError> {
        let export = self.require(name)?;
        export
            .as_procedure()
            .cloned()
            .ok_or_else(|| self.kind_error(name, export, "a function"))
    }

    pub fn value(&self, name: &str) -> Result<Value, ModuleError> {
        let export = self.require(name)?;
        export
            .snapshot()
            .ok_or_else(|| self.kind_error(name, export, "a value"))
    }

    fn kind_error(&self, name: &str, export: &Export, expected: &'static str) -> ModuleError {
        ModuleError::ExportKind {
            module: self.module.clone(),
            name: name.to_string(),
            found: export.kind(),
            expected,
        }
    }
}

pub type ModuleEntry = fn(&ModuleScope<'_>) -> Result<Exports, ModuleError>;

#[derive(Clone, Default)]
pub struct ModuleRegistry {
    entries: BTreeMap<String, ModuleEntry>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        ModuleRegistry::default()
    }

    pub fn register(mut self, name: &str, entry: ModuleEntry) -> Self {
        self.entries.insert(name.to_string(), entry);
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.entries.remove(name);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn entry(&self, name: &str) -> Option<ModuleEntry> {
        self.entries.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

/// What modules in one session are built from.
#[derive(Clone)]
pub struct Dependencies {
    pub framework: Arc<dyn Framework>,
    pub fs: Arc<dyn Filesystem>,
    pub layout: ProjectLayout,
}

impl Dependencies {
    /// The real framework over the given filesystem.
    pub fn new(fs: Arc<dyn Filesystem>, layout: ProjectLayout) -> Self {
        Dependencies {
            framework: Arc::new(WebFramework::new(Arc::clone(&fs))),
            fs,
            layout,
        }
    }

    pub fn disk(layout: ProjectLayout) -> Self {
        Dependencies::new(Arc::new(DiskFs), layout)
    }

    pub fn with_framework(mut self, framework: Arc<dyn Framework>) -> Self {
        self.framework = framework;
        self
    }
}

/// One load of a module graph. Each module runs at most once per session and
/// later requires get the cached exports.
pub struct Session {
    registry: ModuleRegistry,
    deps: Dependencies,
    cache: RefCell<BTreeMap<String, Exports>>,
    loading: RefCell<Vec<String>>,
}

impl Session {
    pub fn new(registry: ModuleRegistry, deps: Dependencies) -> Self {
        Session {
            registry,
            deps,
            cache: RefCell::new(BTreeMap::new()),
            loading: RefCell::new(Vec::new()),
        }
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.deps
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn require(&self, name: &str) -> Result<Exports, ModuleError> {
        if let Some(exports) = self.cache.borrow().get(name) {
            return Ok(exports.clone());
        }
        if self.loading.borrow().iter().any(|loading| loading == name) {
            let mut chain = self.loading.borrow().clone();
            chain.push(name.to_string());
            return Err(ModuleError::Cycle(chain.join(" -> ")));
        }
        let entry = self
            .registry
            .entry(name)
            .ok_or_else(|| ModuleError::Unknown(name.to_string()))?;

        self.loading.borrow_mut().push(name.to_string());
        let scope = ModuleScope {
            session: self,
            name,
        };
        let result = entry(&scope);
        self.loading.borrow_mut().pop();

        let exports = result?;
        debug!(module = name, exports = exports.items.len(), "module loaded");
        self.cache
            .borrow_mut()
            .insert(name.to_string(), exports.clone());
        Ok(exports)
    }
}

/// Handed to a module entry while it runs.
pub struct ModuleScope<'a> {
    session: &'a Session,
    name: &'a str,
}

impl ModuleScope<'_> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn framework(&self) -> &Arc<dyn Framework> {
        &self.session.deps.framework
    }

    pub fn fs(&self) -> &Arc<dyn Filesystem> {
        &self.session.deps.fs
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.session.deps.layout
    }

    pub fn require(&self, name: &str) -> Result<Exports, ModuleError> {
        self.session.require(name)
    }

    /// Wrap an error raised while this module loads.
    pub fn fail(&self, reason: impl fmt::Display) -> ModuleError {
        ModuleError::Entry {
            module: self.name.to_string(),
            reason: reason.to_string(),
        }
    }
}
