use crate::build::BuildContext;
use crate::compiler::{NativeCompiler, Toolchain};
use crate::pipeline::{order, BuildModule};
use crate::result::Result;
use crate::secure::fuse::preserved_packages;
use crate::utils::fs::remove_dir_if_exists;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

const WORK_DIR: &str = "compile_all";

/// Compiles the interpreted modules left in a hardened distribution
#[derive(Debug, Default)]
pub struct CompileModule {
    toolchain: Option<Toolchain>,
}

impl CompileModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = Some(toolchain);
        self
    }
}

pub fn compile_candidates(root: &Path) -> Vec<PathBuf> {
    let internal = root.join("_internal");
    if !internal.is_dir() {
        return Vec::new();
    }
    let preserved: BTreeSet<String> = preserved_packages(&internal);

    WalkDir::new(&internal)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() != 1
                || !e.file_type().is_dir()
                || !preserved.contains(e.file_name().to_string_lossy().as_ref())
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == "py")
                && p.file_stem().is_some_and(|stem| stem != "__init__")
        })
        .collect()
}

#[async_trait]
impl BuildModule for CompileModule {
    fn name(&self) -> &'static str {
        "compile"
    }

    fn order(&self) -> u32 {
        order::COMPILE
    }

    async fn post_build(&mut self, ctx: &mut BuildContext) -> Result<()> {
        if !(ctx.options.secure && ctx.options.compile_all) {
            return Ok(());
        }

        let candidates = compile_candidates(&ctx.dist_dir());
        if candidates.is_empty() {
            log::info!("compile: no interpreted modules left to compile");
            return Ok(());
        }

        let toolchain = match &self.toolchain {
            Some(toolchain) => toolchain.clone(),
            None => Toolchain::probe(ctx.runner(), &ctx.python, ctx.platform).await,
        };
        let compiler = NativeCompiler::new(ctx.runner(), &ctx.python, ctx.platform, toolchain);
        compiler.ensure_cython().await?;

        let work_root = ctx.build_dir.join(WORK_DIR);
        remove_dir_if_exists(&work_root)?;

        let mut compiled = 0;
        for (idx, source) in candidates.iter().enumerate() {
            let work = work_root.join(idx.to_string());
            match compile_one(&compiler, source, &work).await {
                Ok(()) => compiled += 1,
                Err(e) => {
                    log::warn!("compile: {} kept as source: {}", source.display(), e);
                    eprintln!("Warning: could not compile {}: {}", source.display(), e);
                }
            }
        }

        println!("Compiled {}/{} modules to native extensions", compiled, candidates.len());
        Ok(())
    }
}

async fn compile_one(compiler: &NativeCompiler<'_>, source: &Path, work: &Path) -> Result<()> {
    fs::create_dir_all(work).await?;
    let Some(file_name) = source.file_name() else {
        return Ok(());
    };
    let staged = work.join(file_name);
    fs::copy(source, &staged).await?;

    let built = compiler.compile(&staged, work).await?;
    let Some(built_name) = built.file_name() else {
        return Ok(());
    };
    let parent = source.parent().unwrap_or(Path::new("."));
    fs::copy(&built, parent.join(built_name)).await?;
    fs::remove_file(source).await?;
    Ok(())
}
