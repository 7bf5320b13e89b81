use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::error::WebError;
use crate::fs::Filesystem;
use crate::template::{self, CompiledTemplate, IncludeResolver, TemplateError};

pub type Settings = Arc<RwLock<BTreeMap<String, Value>>>;

/// The application's render hook. Observers replace it through the app's
/// render slot.
pub trait ViewRenderer: Send + Sync {
    fn render(&self, view: &str, locals: &Value) -> Result<String, WebError>;
}

/// Renders `.ejs` views from the directory named by the `views` setting.
pub struct ViewEngine {
    fs: Arc<dyn Filesystem>,
    settings: Settings,
}

impl ViewEngine {
    pub fn new(fs: Arc<dyn Filesystem>, settings: Settings) -> Self {
        ViewEngine { fs, settings }
    }

    fn setting(&self, key: &str) -> Option<String> {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn path_of(&self, view: &str) -> Result<PathBuf, WebError> {
        let extension = self.setting("view engine").unwrap_or_else(|| "ejs".into());
        if extension != "ejs" {
            return Err(WebError::View {
                view: view.to_string(),
                reason: format!("no engine registered for `.{extension}`"),
            });
        }
        let dir = PathBuf::from(self.setting("views").unwrap_or_else(|| "views".into()));
        let file = if view.ends_with(".ejs") {
            view.to_string()
        } else {
            format!("{view}.{extension}")
        };
        Ok(dir.join(file))
    }

    pub fn load(&self, view: &str) -> Result<CompiledTemplate, WebError> {
        let path = self.path_of(view)?;
        if !self.fs.exists(&path) {
            return Err(WebError::View {
                view: view.to_string(),
                reason: format!("not found in {}", path.display()),
            });
        }
        let contents = self.fs.read(&path, Some("utf8"))?;
        let source = contents.as_text().unwrap_or_default();
        Ok(template::compile(source)?)
    }
}

impl IncludeResolver for ViewEngine {
    fn resolve(&self, name: &str) -> Result<CompiledTemplate, TemplateError> {
        self.load(name)
            .map_err(|e| TemplateError::Render(format!("include `{name}`: {e}")))
    }
}

impl ViewRenderer for ViewEngine {
    fn render(&self, view: &str, locals: &Value) -> Result<String, WebError> {
        debug!(view, "render");
        let template = self.load(view)?;
        Ok(template.render(locals, self)?)
    }
}
