pub mod assemble;
pub mod fuse;
pub mod loader;
pub mod promote;
pub mod stage;
pub mod transform;

pub use stage::SecureStage;

use crate::backend::FreezeBackend;
use crate::build::{BuildContext, DataPair};
use crate::compiler::{NativeCompiler, Toolchain};
use crate::pipeline::{order, BuildModule};
use crate::result::{DeskpackError, Result};
use crate::utils::fs::remove_dir_if_exists;
use assemble::{ensure_root_module, Staging};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use transform::{bootstrap_source, unguard_main, BOOTSTRAP_FILE, ENTRY_MODULE};

pub const SECURE_BUILD_DIR: &str = "secure_build";

/** Hardening interceptor
 *
 * # Process Flow
 * 1. `prepare`: rewrite the entry script, compile it to a native extension,
 *    generate a bootstrap and point the context at it
 * 2. Build step: freeze once under `<name>_base`
 * 3. Assemble a staging copy, optionally fuse modules into `app.bundle`,
 *    promote runtimes, deploy the native loader
 * 4. Swap the staging tree into `dist/<name>`
 *
 * Any failure aborts packaging; the final output directory is only
 * replaced once every stage succeeded.
 */
#[derive(Debug)]
pub struct SecurityModule {
    stage: SecureStage,
    toolchain: Option<Toolchain>,
    compiled: Option<PathBuf>,
}

impl Default for SecurityModule {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityModule {
    pub fn new() -> Self {
        Self {
            stage: SecureStage::Init,
            toolchain: None,
            compiled: None,
        }
    }

    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = Some(toolchain);
        self
    }

    pub fn stage(&self) -> SecureStage {
        self.stage
    }

    pub fn compiled_module(&self) -> Option<&Path> {
        self.compiled.as_deref()
    }

    pub fn secure_dir(ctx: &BuildContext) -> PathBuf {
        ctx.build_dir.join(SECURE_BUILD_DIR)
    }

    fn advance(&mut self, stage: SecureStage) {
        log::info!("Hardening: {}", stage);
        self.stage = stage;
    }

    fn harden(&mut self, ctx: &BuildContext, base_dist: &Path, staging: &Staging) -> Result<()> {
        self.advance(SecureStage::Assembled);
        ctx.report("Hardening distribution...", 60);
        let skipped = staging
            .populate(base_dist)
            .map_err(|e| e.at_stage(SecureStage::Assembled))?;
        if skipped > 0 {
            log::warn!("{} files could not be copied into the secure distribution", skipped);
        }
        let module = format!("{}{}", ENTRY_MODULE, ctx.platform.extension_suffix());
        ensure_root_module(&staging.dir, &module).map_err(|e| e.at_stage(SecureStage::Assembled))?;

        if ctx.options.bundled {
            self.advance(SecureStage::BundleFused);
            fuse::fuse_library(&staging.dir).map_err(|e| e.at_stage(SecureStage::BundleFused))?;
        } else {
            log::info!("Skipping library fusion; use --bundled to fuse modules into {}", fuse::BUNDLE_NAME);
        }

        self.advance(SecureStage::RuntimesPromoted);
        promote::promote_runtimes(&staging.dir, &ctx.runtime.package_name, ctx.platform)
            .map_err(|e| e.at_stage(SecureStage::RuntimesPromoted))?;

        self.advance(SecureStage::LoaderDeployed);
        let loader = ctx
            .options
            .loader_override
            .clone()
            .unwrap_or_else(|| ctx.runtime.loader_binary(ctx.platform));
        loader::deploy_loader(&staging.dir, &loader, &ctx.out_name, ctx.platform)
            .map_err(|e| e.at_stage(SecureStage::LoaderDeployed))?;

        Ok(())
    }
}

#[async_trait]
impl BuildModule for SecurityModule {
    fn name(&self) -> &'static str {
        "security"
    }

    fn order(&self) -> u32 {
        order::SECURITY
    }

    fn critical(&self) -> bool {
        true
    }

    fn intercepts_build(&self) -> bool {
        true
    }

    async fn prepare(&mut self, ctx: &mut BuildContext) -> Result<()> {
        self.stage = SecureStage::Init;
        println!("Initializing secure packaging (native compilation)...");

        let secure_dir = Self::secure_dir(ctx);
        remove_dir_if_exists(&secure_dir)?;
        fs::create_dir_all(&secure_dir).await?;
        let secure_dir = std::path::absolute(&secure_dir)?;

        self.advance(SecureStage::SourceTransform);
        let source = fs::read_to_string(&ctx.script)
            .await
            .map_err(|e| DeskpackError::from(e).at_stage(SecureStage::SourceTransform))?;
        let (transformed, patched) = unguard_main(&source);
        if patched {
            log::info!("Patched __main__ guard of {}", ctx.script.display());
        }
        let entry = secure_dir.join(format!("{}.py", ENTRY_MODULE));
        fs::write(&entry, transformed)
            .await
            .map_err(|e| DeskpackError::from(e).at_stage(SecureStage::SourceTransform))?;

        self.advance(SecureStage::NativeCompile);
        let compiled = {
            let toolchain = match &self.toolchain {
                Some(toolchain) => toolchain.clone(),
                None => Toolchain::probe(ctx.runner(), &ctx.python, ctx.platform).await,
            };
            println!("Compiling {} with {}...", ctx.script.display(), toolchain);

            let compiler = NativeCompiler::new(ctx.runner(), &ctx.python, ctx.platform, toolchain);
            compiler
                .ensure_cython()
                .await
                .map_err(|e| e.at_stage(SecureStage::NativeCompile))?;
            compiler
                .compile(&entry, &secure_dir)
                .await
                .map_err(|e| e.at_stage(SecureStage::NativeCompile))?
        };

        self.advance(SecureStage::BootstrapGenerated);
        let bootstrap = secure_dir.join(BOOTSTRAP_FILE);
        fs::write(&bootstrap, bootstrap_source(&ctx.runtime.package_name))
            .await
            .map_err(|e| DeskpackError::from(e).at_stage(SecureStage::BootstrapGenerated))?;

        let original = std::mem::replace(&mut ctx.script, bootstrap);
        if let Some(stem) = original.file_stem() {
            ctx.excludes.push_unique(stem.to_string_lossy().into_owned());
        }
        ctx.original_script = Some(original);
        ctx.pathex.push_unique(secure_dir.clone());
        ctx.binaries.push(DataPair::new(compiled.clone(), "."));
        if !ctx.extra_args.iter().any(|a| a == "--debug") {
            ctx.extra_args
                .extend(["--debug".to_string(), "noarchive".to_string()]);
        }

        self.compiled = Some(compiled);
        Ok(())
    }

    async fn run_build(&mut self, ctx: &mut BuildContext, backend: &dyn FreezeBackend) -> Result<()> {
        self.advance(SecureStage::DualBuild);
        let final_name = ctx.out_name.clone();
        ctx.out_name = format!("{}_base", final_name);
        let built = backend.build(ctx).await;
        ctx.out_name = final_name;
        let base_dist = built.map_err(|e| e.at_stage(SecureStage::DualBuild))?;

        let staging = Staging::for_final(&ctx.dist_dir())?;
        if let Err(e) = self.harden(ctx, &base_dist, &staging) {
            staging.discard();
            return Err(e);
        }

        let final_dir = staging
            .commit()
            .map_err(|e| e.at_stage(SecureStage::Assembled))?;

        if let Err(e) = remove_dir_if_exists(&base_dist) {
            log::warn!("Could not remove {}: {}", base_dist.display(), e);
        }

        self.advance(SecureStage::Done);
        println!("Secure distribution ready: {}", final_dir.display());
        Ok(())
    }
}
