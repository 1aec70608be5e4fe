use crate::build::{RuntimeLayout, Settings, TargetPlatform};
use crate::result::Result;
use crate::utils::process::{first_existing, run_checked, CommandRunner, CommandSpec};
use std::path::{Path, PathBuf};
use which::which;

const RCEDIT_NAMES: &[&str] = &["rcedit", "rcedit-x64"];

/// Stamps version resources onto a Windows executable with `rcedit`
#[derive(Debug, Clone)]
pub struct MetadataEditor {
    rcedit: Option<PathBuf>,
}

impl MetadataEditor {
    pub fn locate(runtime: &RuntimeLayout) -> Self {
        let on_path = RCEDIT_NAMES.iter().find_map(|name| which(name).ok());
        let bundled = runtime.rcedit();
        let rcedit = on_path.or_else(|| first_existing([bundled.as_path()]));
        Self { rcedit }
    }

    pub fn with_tool(rcedit: impl Into<PathBuf>) -> Self {
        Self {
            rcedit: Some(rcedit.into()),
        }
    }

    pub fn tool(&self) -> Option<&Path> {
        self.rcedit.as_deref()
    }

    pub async fn apply(
        &self,
        runner: &dyn CommandRunner,
        exe: &Path,
        icon: Option<&Path>,
        settings: &Settings,
        platform: TargetPlatform,
    ) -> Result<bool> {
        if platform != TargetPlatform::Windows {
            log::debug!("Metadata stamping is Windows-only, skipping for {}", platform);
            return Ok(false);
        }

        let Some(rcedit) = &self.rcedit else {
            log::warn!("metadata: rcedit not found, executable metadata left unchanged");
            return Ok(false);
        };

        if !exe.is_file() {
            log::warn!("metadata: {} does not exist, skipping", exe.display());
            return Ok(false);
        }

        let spec = CommandSpec::new(rcedit).args(rcedit_args(exe, icon, settings));
        run_checked(runner, &spec).await?;
        println!("Updated metadata of {}", exe.display());
        Ok(true)
    }
}

pub fn rcedit_args(exe: &Path, icon: Option<&Path>, settings: &Settings) -> Vec<String> {
    let mut args = vec![exe.display().to_string()];

    if let Some(icon) = icon.filter(|i| i.extension().is_some_and(|e| e.eq_ignore_ascii_case("ico"))) {
        args.push("--set-icon".into());
        args.push(icon.display().to_string());
    }

    let version = settings.version().unwrap_or_else(|| "1.0".to_string());
    args.extend([
        "--set-file-version".to_string(),
        version.clone(),
        "--set-product-version".to_string(),
        version,
    ]);

    let title = settings.title().unwrap_or("App");
    let description = settings.description().unwrap_or(title);
    args.extend([
        "--set-version-string".to_string(),
        "FileDescription".to_string(),
        description.to_string(),
        "--set-version-string".to_string(),
        "ProductName".to_string(),
        title.to_string(),
    ]);

    args
}
