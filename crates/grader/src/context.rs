use std::sync::Arc;

use serde_json::Value;
use tellerkit_web::{App, Exports, Filesystem, ModuleRegistry, ProjectLayout};
use tracing::{debug, warn};

use crate::capture::Capture;
use crate::client::SimulatedClient;
use crate::doubles::RecordingFs;
use crate::error::Failure;
use crate::inspect::ViewSource;
use crate::loader::{ModuleInstance, ModuleLoader, Substitutions};

pub const APP_MISSING: &str = "`app` const has not been created in the app module.";

/// The application loaded once for a grading run, plus everything scripts
/// need to inspect the project.
///
/// The shared load reads through to the project's filesystem and swallows
/// writes. The suite reloads it after any script that changed account state
/// or wrote, so every script starts from the same state.
pub struct GradingContext {
    loader: ModuleLoader,
    recorder: Arc<RecordingFs>,
    instance: Result<ModuleInstance, String>,
    pristine: Option<Value>,
}

impl GradingContext {
    pub fn load(registry: ModuleRegistry, layout: ProjectLayout, fs: Arc<dyn Filesystem>) -> Self {
        let loader = ModuleLoader::new(registry, layout, fs);
        let (recorder, instance) = GradingContext::load_shared(&loader);
        let mut ctx = GradingContext {
            loader,
            recorder,
            instance,
            pristine: None,
        };
        ctx.pristine = ctx.account_state();
        ctx
    }

    fn load_shared(loader: &ModuleLoader) -> (Arc<RecordingFs>, Result<ModuleInstance, String>) {
        let recorder = Arc::new(RecordingFs::new(Arc::clone(loader.fs())));
        let instance = loader
            .load_with_doubles("app", Substitutions::new().filesystem(recorder.clone()))
            .map_err(|e| {
                warn!(error = %e, "app module did not load");
                e.to_string()
            });
        (recorder, instance)
    }

    pub fn reload(&mut self) {
        debug!("reloading shared application");
        let (recorder, instance) = GradingContext::load_shared(&self.loader);
        self.recorder = recorder;
        self.instance = instance;
        self.pristine = self.account_state();
    }

    /// True when a script left state behind that the next one would see.
    pub fn is_dirty(&self) -> bool {
        self.recorder.writes.called() || self.account_state() != self.pristine
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    pub fn layout(&self) -> &ProjectLayout {
        self.loader.layout()
    }

    pub fn fs(&self) -> &Arc<dyn Filesystem> {
        self.loader.fs()
    }

    /// Writes the shared application attempted since the last reload.
    pub fn writes(&self) -> &Capture {
        &self.recorder.writes
    }

    pub fn instance(&self) -> Result<&ModuleInstance, Failure> {
        self.instance.as_ref().map_err(|_| Failure::new(APP_MISSING))
    }

    pub fn app(&self) -> Result<App, Failure> {
        self.instance()?.app().ok_or_else(|| Failure::new(APP_MISSING))
    }

    pub fn exports(&self) -> Result<&Exports, Failure> {
        Ok(self.instance()?.exports())
    }

    /// A module from the shared load, or `None` when it cannot be loaded.
    pub fn module(&self, name: &str) -> Option<Exports> {
        self.instance.as_ref().ok()?.require(name).ok()
    }

    pub fn client(&self) -> Result<SimulatedClient, Failure> {
        Ok(SimulatedClient::new(self.app()?))
    }

    fn account_state(&self) -> Option<Value> {
        self.instance
            .as_ref()
            .ok()?
            .exports()
            .get("accounts")?
            .snapshot()
    }

    /// The `accounts` binding of the app module as it is right now.
    pub fn accounts(&self) -> Option<Value> {
        self.account_state()
    }

    pub fn module_exists(&self, module: &str) -> bool {
        self.fs().exists(&self.layout().module_file(module))
    }

    /// Project-relative file name of a module, for messages.
    pub fn module_path(&self, module: &str) -> String {
        self.layout()
            .display_relative(&self.layout().module_file(module))
    }

    pub fn view_exists(&self, name: &str) -> bool {
        self.fs().exists(&self.layout().view_file(name))
    }

    pub fn view_path(&self, name: &str) -> String {
        self.layout().display_relative(&self.layout().view_file(name))
    }

    /// Read a view, failing with the classroom message when it is absent.
    pub fn view(&self, name: &str) -> Result<ViewSource, Failure> {
        let file = format!("{name}.{}", self.layout().view_extension);
        let missing = || Failure::new(format!("The `{file}` view file does not exist."));
        let path = self.layout().view_file(name);
        if !self.fs().exists(&path) {
            return Err(missing());
        }
        let contents = self.fs().read(&path, Some("utf8")).map_err(|_| missing())?;
        let text = contents.as_text().map(str::to_string).ok_or_else(missing)?;
        Ok(ViewSource { file, text })
    }
}
