use crate::build::{BuildContext, DataPair, Engine, TargetPlatform};
use crate::metadata::MetadataEditor;
use crate::pipeline::{order, BuildModule};
use crate::result::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

const CHROME_BINARY: &str = "electron.exe";

/// Bundles the Chromium engine when `engine = "chrome"`
#[derive(Debug, Default)]
pub struct EngineModule {
    engine_home: Option<PathBuf>,
}

impl EngineModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine_home(mut self, dir: impl Into<PathBuf>) -> Self {
        self.engine_home = Some(dir.into());
        self
    }

    fn engine_home(&self, package_name: &str) -> Option<PathBuf> {
        self.engine_home.clone().or_else(|| {
            dirs::home_dir().map(|home| {
                home.join(format!(".{}", package_name))
                    .join("engines")
                    .join("chrome")
            })
        })
    }

    fn engine_candidates(ctx: &BuildContext) -> Vec<PathBuf> {
        let dest = ctx.runtime.chrome_engine_dest();
        let dist = ctx.dist_dir();
        vec![
            dist.join(&dest).join(CHROME_BINARY),
            dist.join("_internal").join(&dest).join(CHROME_BINARY),
        ]
    }
}

#[async_trait]
impl BuildModule for EngineModule {
    fn name(&self) -> &'static str {
        "engine"
    }

    fn order(&self) -> u32 {
        order::ENGINE
    }

    async fn prepare(&mut self, ctx: &mut BuildContext) -> Result<()> {
        if ctx.options.engine != Engine::Chrome {
            return Ok(());
        }

        println!("Configuring Chrome engine...");
        match self.engine_home(&ctx.runtime.package_name) {
            Some(home) if home.is_dir() => {
                log::info!("Bundling Chrome engine from {}", home.display());
                ctx.add_data
                    .push(DataPair::new(home, ctx.runtime.chrome_engine_dest()));
            }
            other => {
                let shown = other.map(|p| p.display().to_string()).unwrap_or_default();
                log::error!("engine: Chrome engine not found at {}", shown);
                eprintln!(
                    "Chrome engine not found. Install it with `{} engine install chrome` first.",
                    ctx.runtime.package_name
                );
            }
        }

        let shell = ctx.runtime.chrome_shell();
        if shell.is_dir() {
            ctx.add_data
                .push(DataPair::new(shell, ctx.runtime.chrome_shell_dest()));
        } else {
            log::warn!("engine: Chrome shell source missing at {}", shell.display());
        }

        Ok(())
    }

    async fn post_build(&mut self, ctx: &mut BuildContext) -> Result<()> {
        if ctx.options.engine != Engine::Chrome || ctx.platform != TargetPlatform::Windows {
            return Ok(());
        }

        let Some(engine_exe) = Self::engine_candidates(ctx).into_iter().find(|p| p.is_file()) else {
            log::warn!("engine: {} not found in the distribution", CHROME_BINARY);
            return Ok(());
        };

        let renamed = engine_exe.with_file_name(ctx.platform.exe_name(&ctx.out_name));
        fs::rename(&engine_exe, &renamed).await?;
        println!("Renamed Chrome engine to {}", renamed.display());

        MetadataEditor::locate(&ctx.runtime)
            .apply(
                ctx.runner(),
                &renamed,
                ctx.app_icon.as_deref(),
                &ctx.settings,
                ctx.platform,
            )
            .await?;
        Ok(())
    }
}
