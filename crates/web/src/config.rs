use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::WebError;

pub const CONFIG_FILE: &str = "tellerkit.json";

/// Where a project keeps its sources, views, static files and data.
///
/// Read from `tellerkit.json` at the project root when present. Every field is
/// optional there; missing ones take the classroom defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectLayout {
    #[serde(skip)]
    pub root: PathBuf,
    pub source_dir: String,
    pub views_dir: String,
    pub public_dir: String,
    pub data_dir: String,
    pub source_extension: String,
    pub view_extension: String,
    pub port: u16,
}

impl Default for ProjectLayout {
    fn default() -> Self {
        ProjectLayout {
            root: PathBuf::new(),
            source_dir: "src".into(),
            views_dir: "views".into(),
            public_dir: "public".into(),
            data_dir: "json".into(),
            source_extension: "rs".into(),
            view_extension: "ejs".into(),
            port: 3000,
        }
    }
}

impl ProjectLayout {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        ProjectLayout {
            root: root.into(),
            ..ProjectLayout::default()
        }
    }

    pub fn load(root: &Path) -> Result<Self, WebError> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(ProjectLayout::at(root));
        }
        let text = std::fs::read_to_string(&path)?;
        let mut layout: ProjectLayout = serde_json::from_str(&text)
            .map_err(|e| WebError::Config(format!("{}: {e}", path.display())))?;
        layout.root = root.to_path_buf();
        Ok(layout)
    }

    pub fn source_root(&self) -> PathBuf {
        self.root.join(&self.source_dir)
    }

    pub fn views(&self) -> PathBuf {
        self.source_root().join(&self.views_dir)
    }

    pub fn public(&self) -> PathBuf {
        self.source_root().join(&self.public_dir)
    }

    pub fn data(&self) -> PathBuf {
        self.source_root().join(&self.data_dir)
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data().join(format!("{name}.json"))
    }

    pub fn view_file(&self, name: &str) -> PathBuf {
        self.views().join(format!("{name}.{}", self.view_extension))
    }

    /// Source file of a module, e.g. `routes/accounts` -> `src/routes/accounts.rs`.
    pub fn module_file(&self, module: &str) -> PathBuf {
        self.source_root()
            .join(format!("{module}.{}", self.source_extension))
    }

    /// A project-relative path written with forward slashes, for messages.
    pub fn display_relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}
