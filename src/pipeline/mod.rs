pub mod asset;
pub mod cleaning;
pub mod compile;
pub mod engine;
pub mod hook;
pub mod icon;
pub mod installer;
pub mod metadata;
pub mod plugin;

pub use asset::AssetModule;
pub use cleaning::MetadataCleaningModule;
pub use compile::CompileModule;
pub use engine::EngineModule;
pub use hook::HookModule;
pub use icon::IconModule;
pub use installer::InstallerModule;
pub use metadata::MetadataModule;
pub use plugin::PluginModule;

use crate::backend::FreezeBackend;
use crate::build::{BuildContext, BuildOptions};
use crate::result::Result;
use crate::secure::SecurityModule;
use async_trait::async_trait;

/** One stage of the packaging pipeline
 *
 * # Contract
 * - `prepare` runs before the freeze backend, `post_build` after it
 * - Modules run one at a time, sorted by [`BuildModule::order`]
 * - A failing hook gets its context mutations rolled back
 * - `prepare` failures abort the build; `post_build` failures are warnings
 *   unless the module is [`critical`](BuildModule::critical)
 * - At most one module may [`intercept`](BuildModule::intercepts_build) the
 *   backend step; it is handed the backend and decides how to run it
 */
#[async_trait]
pub trait BuildModule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Position in the pipeline; lower runs first. Equal values keep registration order.
    fn order(&self) -> u32;

    fn critical(&self) -> bool {
        false
    }

    async fn prepare(&mut self, _ctx: &mut BuildContext) -> Result<()> {
        Ok(())
    }

    async fn post_build(&mut self, _ctx: &mut BuildContext) -> Result<()> {
        Ok(())
    }

    fn intercepts_build(&self) -> bool {
        false
    }

    async fn run_build(&mut self, ctx: &mut BuildContext, backend: &dyn FreezeBackend) -> Result<()> {
        backend.build(ctx).await.map(|_| ())
    }
}

pub mod order {
    pub const ASSET: u32 = 10;
    pub const ENGINE: u32 = 20;
    pub const PLUGIN: u32 = 30;
    pub const HOOK: u32 = 40;
    pub const ICON: u32 = 50;
    pub const SECURITY: u32 = 60;
    pub const COMPILE: u32 = 70;
    pub const METADATA_CLEANING: u32 = 80;
    pub const METADATA: u32 = 90;
    pub const INSTALLER: u32 = 100;
}

#[derive(Default)]
pub struct Pipeline {
    modules: Vec<Box<dyn BuildModule>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standard(options: &BuildOptions) -> Self {
        let mut pipeline = Self::new()
            .with_module(AssetModule)
            .with_module(EngineModule::new())
            .with_module(PluginModule::default())
            .with_module(HookModule)
            .with_module(IconModule);

        if options.secure {
            pipeline = pipeline.with_module(SecurityModule::new());
            if options.compile_all {
                pipeline = pipeline.with_module(CompileModule::new());
            }
        }

        if options.secure || options.strip_metadata {
            pipeline = pipeline.with_module(MetadataCleaningModule);
        }

        pipeline = pipeline.with_module(MetadataModule);

        if options.build_installer {
            pipeline = pipeline.with_module(InstallerModule);
        }

        pipeline
    }

    pub fn with_module(mut self, module: impl BuildModule + 'static) -> Self {
        self.add(Box::new(module));
        self
    }

    pub fn add(&mut self, module: Box<dyn BuildModule>) {
        self.modules.push(module);
        self.modules.sort_by_key(|m| m.order());
    }

    pub fn module_names(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub async fn run(&mut self, ctx: &mut BuildContext, backend: &dyn FreezeBackend) -> Result<()> {
        let total = self.modules.len().max(1) as u64;

        for (idx, module) in self.modules.iter_mut().enumerate() {
            ctx.report(
                format!("Preparing: {}", module.name()),
                5 + 25 * idx as u64 / total,
            );

            let snapshot = ctx.clone();
            if let Err(e) = module.prepare(ctx).await {
                *ctx = snapshot;
                log::error!("{} prepare failed: {}", module.name(), e);
                return Err(e);
            }
        }

        ctx.report("Compiling...", 40);
        match self.modules.iter_mut().find(|m| m.intercepts_build()) {
            Some(interceptor) => {
                log::info!("Build step handled by {}", interceptor.name());
                interceptor.run_build(ctx, backend).await?;
            }
            None => {
                backend.build(ctx).await?;
            }
        }

        for (idx, module) in self.modules.iter_mut().enumerate() {
            ctx.report(
                format!("Finishing: {}", module.name()),
                75 + 20 * idx as u64 / total,
            );

            let snapshot = ctx.clone();
            if let Err(e) = module.post_build(ctx).await {
                *ctx = snapshot;
                if module.critical() {
                    log::error!("{} post-build failed: {}", module.name(), e);
                    return Err(e);
                }
                log::warn!("{} post-build failed, continuing: {}", module.name(), e);
                eprintln!("Warning: {} failed: {}", module.name(), e);
            }
        }

        ctx.report("Done", 100);
        Ok(())
    }
}
