use crate::result::Result;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

pub const LOCK_FILE: &str = "plugins.lock";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledPlugin {
    /// Release tag, or `main` for a branch archive, or `local` for a file install.
    pub tag: SmolStr,
    pub source: String,
    /// SHA-256 of the downloaded archive, hex encoded.
    pub hash: SmolStr,
    pub installed_at: SmolStr,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginLock {
    #[serde(default)]
    pub installed: BTreeMap<SmolStr, InstalledPlugin>,
}

impl PluginLock {
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await?;
        Ok(toml::from_str(&content)?)
    }

    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(path, toml::to_string_pretty(self)?).await?;
        Ok(())
    }

    pub fn record(&mut self, name: impl Into<SmolStr>, tag: impl Into<SmolStr>, source: impl Into<String>, hash: impl Into<SmolStr>) {
        let entry = InstalledPlugin {
            tag: tag.into(),
            source: source.into(),
            hash: hash.into(),
            installed_at: chrono::Utc::now().to_rfc3339().into(),
        };
        self.installed.insert(name.into(), entry);
    }

    pub fn remove(&mut self, name: &str) -> Option<InstalledPlugin> {
        self.installed.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&InstalledPlugin> {
        self.installed.get(name)
    }
}
