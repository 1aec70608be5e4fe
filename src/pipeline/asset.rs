use crate::build::{BuildContext, DataPair, SETTINGS_FILE};
use crate::pipeline::{order, BuildModule};
use crate::result::Result;
use crate::utils::process::{find_executable, run_checked, CommandSpec};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

const FRONTEND_DIR: &str = "frontend";
const FRONTEND_OUTPUTS: &[&str] = &["dist", "build"];

#[derive(Debug, Default)]
pub struct AssetModule;

impl AssetModule {
    fn assets_dir(ctx: &BuildContext) -> PathBuf {
        ctx.build_dir.join(format!("{}_assets", ctx.runtime.package_name))
    }

    async fn embed_settings(ctx: &mut BuildContext) -> Result<()> {
        let source = ctx.script_dir.join(SETTINGS_FILE);
        if !source.is_file() {
            log::info!("No {} next to the entry script", SETTINGS_FILE);
            return Ok(());
        }

        let clean = ctx.settings.production_copy();
        if ctx.settings.debug() {
            println!("Forcing debug=false in the packaged {}", SETTINGS_FILE);
        }

        let dir = Self::assets_dir(ctx);
        fs::create_dir_all(&dir).await?;
        let target = dir.join(SETTINGS_FILE);
        fs::write(&target, clean.to_pretty_json()?).await?;

        ctx.add_data.push(DataPair::new(target, "."));
        Ok(())
    }

    async fn build_frontend(ctx: &BuildContext) -> Result<()> {
        let Some(dir) = find_frontend_project(&ctx.script_dir).await else {
            log::warn!("asset: no package.json with a build script found, skipping frontend build");
            return Ok(());
        };

        let npm = match find_executable("npm") {
            Ok(npm) => npm,
            Err(_) => {
                log::warn!("asset: npm not found on PATH, skipping frontend build");
                eprintln!("Warning: npm not found, frontend was not rebuilt");
                return Ok(());
            }
        };

        println!("Building frontend in {}...", dir.display());
        let spec = CommandSpec::new(npm)
            .args(["run", "build"])
            .cwd(&dir)
            .streaming();
        if let Err(e) = run_checked(ctx.runner(), &spec).await {
            log::warn!("asset: frontend build failed: {}", e);
            eprintln!("Warning: frontend build failed: {}", e);
        }
        Ok(())
    }

    fn embed_frontend(ctx: &mut BuildContext) {
        let Some(output) = frontend_output(&ctx.script_dir) else {
            return;
        };

        let dest = output
            .strip_prefix(&ctx.script_dir)
            .map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_else(|_| format!("{}/dist", FRONTEND_DIR));

        log::info!("Embedding frontend output {} as {}", output.display(), dest);
        ctx.add_data.push(DataPair::new(output, dest));
    }
}

#[async_trait]
impl BuildModule for AssetModule {
    fn name(&self) -> &'static str {
        "asset"
    }

    fn order(&self) -> u32 {
        order::ASSET
    }

    async fn prepare(&mut self, ctx: &mut BuildContext) -> Result<()> {
        Self::embed_settings(ctx).await?;
        if ctx.options.build_frontend {
            Self::build_frontend(ctx).await?;
        }
        Self::embed_frontend(ctx);
        Ok(())
    }
}

/// Directory holding a `package.json` that declares a `build` script
pub async fn find_frontend_project(root: &Path) -> Option<PathBuf> {
    if has_build_script(root).await {
        return Some(root.to_path_buf());
    }

    let mut children = Vec::new();
    let mut entries = fs::read_dir(root).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if path.is_dir() && !hidden && entry.file_name() != "node_modules" {
            children.push(path);
        }
    }
    children.sort();

    for child in children {
        if has_build_script(&child).await {
            return Some(child);
        }
    }
    None
}

async fn has_build_script(dir: &Path) -> bool {
    let Ok(content) = fs::read_to_string(dir.join("package.json")).await else {
        return false;
    };
    serde_json::from_str::<Value>(&content)
        .ok()
        .and_then(|pkg| pkg.get("scripts")?.get("build").cloned())
        .is_some()
}

pub fn frontend_output(script_dir: &Path) -> Option<PathBuf> {
    FRONTEND_OUTPUTS
        .iter()
        .map(|name| script_dir.join(FRONTEND_DIR).join(name))
        .find(|p| p.is_dir())
}
