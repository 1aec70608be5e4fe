use crate::result::{DeskpackError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";

static REQUIREMENT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z0-9][A-Za-z0-9._-]*)").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(deserialize_with = "version_text")]
    pub version: String,
    /// `module:object`, where the object is a factory function or a class.
    pub entry_point: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_entry: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub python_dependencies: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub npm_dependencies: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub isolated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Text(String),
    Number(serde_json::Number),
}

/// Accepts `"1.0"` or a bare JSON number.
fn version_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawVersion::deserialize(deserializer)? {
        RawVersion::Text(text) => text,
        RawVersion::Number(number) => number.to_string(),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone)]
pub struct Plugin {
    pub manifest_path: PathBuf,
    pub directory: PathBuf,
    pub manifest: Manifest,
}

impl Plugin {
    /// Loads the manifest; a missing file, malformed JSON or missing required field is a manifest error.
    pub fn from_manifest_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let manifest_path = std::path::absolute(path)?;
        if !manifest_path.is_file() {
            return Err(DeskpackError::manifest(format!(
                "Manifest not found at {}",
                manifest_path.display()
            )));
        }

        let content = std::fs::read_to_string(&manifest_path)?;
        let manifest: Manifest = serde_json::from_str(&content).map_err(|e| {
            DeskpackError::manifest(format!("{}: {}", manifest_path.display(), e))
        })?;

        let directory = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(Self {
            manifest_path,
            directory,
            manifest,
        })
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn entry_parts(&self) -> Result<(&str, &str)> {
        self.manifest
            .entry_point
            .split_once(':')
            .filter(|(module, object)| !module.is_empty() && !object.is_empty())
            .ok_or_else(|| {
                DeskpackError::manifest(format!(
                    "Invalid entry_point '{}' in plugin '{}'. Expected 'module:function' or 'module:Class'",
                    self.manifest.entry_point,
                    self.name()
                ))
            })
    }

    pub fn import_names(&self) -> Vec<String> {
        self.manifest
            .python_dependencies
            .iter()
            .filter_map(|req| requirement_import_name(req))
            .collect()
    }
}

/// Plugins found in the immediate subdirectories of `dir`
pub fn discover_plugins(dir: &Path) -> Vec<Plugin> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.join(MANIFEST_FILE).is_file())
        .collect();
    dirs.sort();

    dirs.into_iter()
        .filter_map(|d| match Plugin::from_manifest_path(d.join(MANIFEST_FILE)) {
            Ok(plugin) => Some(plugin),
            Err(e) => {
                log::debug!("Skipping plugin in {}: {}", d.display(), e);
                None
            }
        })
        .collect()
}

/// `requests>=2` → `requests`, `python-dateutil[tz]` → `python_dateutil`.
pub fn requirement_import_name(requirement: &str) -> Option<String> {
    let caps = REQUIREMENT_NAME.captures(requirement)?;
    let name = caps.get(1)?.as_str().trim_end_matches(['.', '-']);
    if name.is_empty() {
        return None;
    }
    Some(name.replace('-', "_"))
}
