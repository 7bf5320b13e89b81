use std::sync::Arc;

use tellerkit_web::{
    App, Dependencies, Exports, Filesystem, Framework, ModuleError, ModuleRegistry, ProjectLayout,
    Session, WebFramework,
};
use tracing::debug;

/// Dependencies to replace for one load.
#[derive(Clone, Default)]
pub struct Substitutions {
    framework: Option<Arc<dyn Framework>>,
    fs: Option<Arc<dyn Filesystem>>,
}

impl Substitutions {
    pub fn new() -> Self {
        Substitutions::default()
    }

    pub fn framework(mut self, framework: Arc<dyn Framework>) -> Self {
        self.framework = Some(framework);
        self
    }

    pub fn filesystem(mut self, fs: Arc<dyn Filesystem>) -> Self {
        self.fs = Some(fs);
        self
    }
}

/// A module loaded in its own session, with the session kept so sibling
/// modules resolve to the same instances.
pub struct ModuleInstance {
    name: String,
    session: Session,
    exports: Exports,
}

impl ModuleInstance {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exports(&self) -> &Exports {
        &self.exports
    }

    /// Another module from the same load.
    pub fn require(&self, name: &str) -> Result<Exports, ModuleError> {
        self.session.require(name)
    }

    /// The live application, when the entry exported one under `app`.
    pub fn app(&self) -> Option<App> {
        self.exports.get("app").and_then(|export| export.as_app())
    }
}

/// Loads application modules, each load in a fresh session.
#[derive(Clone)]
pub struct ModuleLoader {
    registry: ModuleRegistry,
    layout: ProjectLayout,
    fs: Arc<dyn Filesystem>,
}

impl ModuleLoader {
    pub fn new(registry: ModuleRegistry, layout: ProjectLayout, fs: Arc<dyn Filesystem>) -> Self {
        ModuleLoader {
            registry,
            layout,
            fs,
        }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn fs(&self) -> &Arc<dyn Filesystem> {
        &self.fs
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn load(&self, entry: &str) -> Result<ModuleInstance, ModuleError> {
        self.load_with_doubles(entry, Substitutions::new())
    }

    /// Load `entry` with the given dependencies replaced. Nothing is shared
    /// with earlier loads. Without a framework substitution the real
    /// framework is built over whichever filesystem this load uses.
    pub fn load_with_doubles(
        &self,
        entry: &str,
        substitutions: Substitutions,
    ) -> Result<ModuleInstance, ModuleError> {
        let fs = substitutions.fs.unwrap_or_else(|| Arc::clone(&self.fs));
        let framework = substitutions
            .framework
            .unwrap_or_else(|| Arc::new(WebFramework::new(Arc::clone(&fs))));
        let deps = Dependencies {
            framework,
            fs,
            layout: self.layout.clone(),
        };
        let session = Session::new(self.registry.clone(), deps);
        let exports = session.require(entry)?;
        debug!(entry, "module instance loaded");
        Ok(ModuleInstance {
            name: entry.to_string(),
            session,
            exports,
        })
    }
}
