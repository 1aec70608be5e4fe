pub mod hook;
pub mod install;
pub mod lock;
pub mod manifest;
pub mod scaffold;

pub use hook::{PackageHookContext, PythonHookRunner};
pub use install::{PluginInstaller, PluginSource};
pub use lock::{PluginLock, LOCK_FILE};
pub use manifest::{discover_plugins, requirement_import_name, Manifest, Plugin, MANIFEST_FILE};
pub use scaffold::create_plugin;

use crate::result::{DeskpackError, Result};
use crate::utils::fs::remove_dir_if_exists;
use std::path::Path;

pub const PLUGINS_DIR: &str = "plugins";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginListing {
    pub dir_name: String,
    /// `(name, version, isolated)` when the manifest loads.
    pub manifest: Option<(String, String, bool)>,
}

impl std::fmt::Display for PluginListing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.manifest {
            Some((name, version, isolated)) => {
                write!(f, "- {} (v{})", name, version)?;
                if *isolated {
                    write!(f, " [isolated]")?;
                }
                Ok(())
            }
            None => write!(f, "- {} (No Manifest)", self.dir_name),
        }
    }
}

pub fn list_plugins(plugins_dir: &Path) -> Result<Vec<PluginListing>> {
    if !plugins_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut listings = Vec::new();
    for entry in std::fs::read_dir(plugins_dir)? {
        let path = entry?.path();
        let Some(dir_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !path.is_dir() || dir_name.starts_with('.') {
            continue;
        }

        let manifest = Plugin::from_manifest_path(path.join(MANIFEST_FILE))
            .ok()
            .map(|p| {
                (
                    p.manifest.name.clone(),
                    p.manifest.version.clone(),
                    p.manifest.isolated,
                )
            });
        listings.push(PluginListing { dir_name, manifest });
    }

    listings.sort_by(|a, b| a.dir_name.cmp(&b.dir_name));
    Ok(listings)
}

pub async fn uninstall_plugin(plugins_dir: &Path, name: &str) -> Result<()> {
    let is_plain_name = !name.is_empty() && !name.contains(['/', '\\']) && name != "..";
    let target = plugins_dir.join(name);
    if !is_plain_name || !target.is_dir() {
        return Err(DeskpackError::not_found(format!("Plugin '{}' not found", name)));
    }

    remove_dir_if_exists(&target)?;

    let lock_path = plugins_dir.join(LOCK_FILE);
    if lock_path.is_file() {
        let mut lock = PluginLock::load_from_file(&lock_path).await?;
        if lock.remove(name).is_some() {
            lock.save_to_file(&lock_path).await?;
        }
    }

    log::info!("Removed plugin {}", name);
    Ok(())
}
