use crate::result::{DeskpackError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const CONFIG_FILE: &str = "deskpack.toml";
pub const DEFAULT_RUNTIME_PACKAGE: &str = "pytron";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub package: PackageSection,
    #[serde(default)]
    pub runtime: RuntimeSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSection {
    pub script: Option<PathBuf>,
    pub name: Option<SmolStr>,
    pub icon: Option<PathBuf>,
    pub onefile: bool,
    pub console: bool,
    pub engine: Engine,
    pub secure: bool,
    pub bundled: bool,
    pub compile_all: bool,
    pub strip_metadata: bool,
    pub installer: bool,
    pub collect_all: bool,
    pub force_hooks: bool,
    pub build_frontend: bool,
    pub add_data: Vec<String>,
    pub hidden_imports: Vec<String>,
    pub excludes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    pub package: SmolStr,
    pub python: Option<PathBuf>,
    pub loader: Option<PathBuf>,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            package: SmolStr::new_static(DEFAULT_RUNTIME_PACKAGE),
            python: None,
            loader: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Webview,
    Chrome,
}

impl Engine {
    pub fn as_str(self) -> &'static str {
        match self {
            Engine::Webview => "webview",
            Engine::Chrome => "chrome",
        }
    }
}

impl ProjectConfig {
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: ProjectConfig = toml::from_str(&content).map_err(|e| {
            DeskpackError::config(format!("Invalid {} format: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    pub async fn discover(dirs: &[&Path]) -> Result<Self> {
        for dir in dirs {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                log::info!("Loading project config: {}", candidate.display());
                return Self::from_file(&candidate).await;
            }
        }
        Ok(Self::default())
    }

    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            DeskpackError::config(format!("Failed to serialize project config: {}", e))
        })?;

        fs::write(path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.package.name {
            if name.trim().is_empty() {
                return Err(DeskpackError::config("package.name cannot be empty"));
            }
        }

        if let Some(script) = &self.package.script {
            if script.as_os_str().is_empty() {
                return Err(DeskpackError::config("package.script cannot be empty"));
            }
        }

        if self.runtime.package.is_empty() {
            return Err(DeskpackError::config("runtime.package cannot be empty"));
        }

        if self.package.bundled && !self.package.secure {
            log::warn!("package.bundled only applies to secure builds; ignoring");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file_with_defaults() {
        let config: ProjectConfig = toml::from_str(
            r#"
            [package]
            name = "Demo"
            engine = "chrome"
            add_data = ["assets;assets"]
            "#,
        )
        .unwrap();

        assert_eq!(config.package.name.as_deref(), Some("Demo"));
        assert_eq!(config.package.engine, Engine::Chrome);
        assert!(!config.package.secure);
        assert_eq!(config.runtime.package, DEFAULT_RUNTIME_PACKAGE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut config = ProjectConfig::default();
        config.package.name = Some("  ".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_engine_fails_to_parse() {
        let parsed: std::result::Result<ProjectConfig, _> =
            toml::from_str("[package]\nengine = \"gecko\"\n");
        assert!(parsed.is_err());
    }
}
