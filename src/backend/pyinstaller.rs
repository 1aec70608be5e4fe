use crate::backend::FreezeBackend;
use crate::build::{BuildContext, TargetPlatform};
use crate::result::{DeskpackError, Result};
use crate::utils::fs::remove_dir_if_exists;
use crate::utils::{run_checked, CommandRunner, CommandSpec};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const TK_FOLDERS: &[&str] = &["_tcl_data", "_tk_data", "tcl", "tk", "tcl8"];

/** PyInstaller driver
 *
 * # Build Flow
 * 1. `makespec` writes `<build_dir>/<out_name>.spec` from the context
 * 2. The generated `.spec` file is built into `<dist_root>/<out_name>`
 * 3. Unused Tcl/Tk data is pruned from the output
 */
#[derive(Debug, Default, Clone, Copy)]
pub struct PyInstaller;

impl PyInstaller {
    pub fn new() -> Self {
        Self
    }

    pub fn spec_path(ctx: &BuildContext) -> PathBuf {
        ctx.build_dir.join(format!("{}.spec", ctx.out_name))
    }

    /// Arguments for the interpreter that generate the build specification.
    pub fn makespec_args(ctx: &BuildContext) -> Vec<String> {
        let platform = ctx.platform;
        let mut args: Vec<String> = vec![
            "-m".into(),
            "PyInstaller.utils.cliutils.makespec".into(),
            "--name".into(),
            ctx.out_name.clone(),
            "--specpath".into(),
            ctx.build_dir.display().to_string(),
        ];

        args.push(if ctx.options.onefile { "--onefile" } else { "--onedir" }.into());
        args.push(
            if ctx.options.console || ctx.settings.console() {
                "--console"
            } else {
                "--noconsole"
            }
            .into(),
        );

        let webview = ctx.runtime.webview_library(platform);
        if !webview.exists() {
            log::warn!("Webview library missing: {}", webview.display());
        }
        args.push(format!(
            "--add-binary={}{}{}",
            webview.display(),
            platform.path_separator(),
            ctx.runtime.dependency_dest()
        ));

        args.push(ctx.script.display().to_string());
        if ctx.options.secure {
            if let Some(original) = &ctx.original_script {
                args.push(original.display().to_string());
            }
        }

        if platform == TargetPlatform::Windows {
            let utf8_hook = ctx.runtime.utf8_hook();
            if utf8_hook.exists() {
                args.push(format!("--runtime-hook={}", utf8_hook.display()));
            }
        }
        for hook in &ctx.runtime_hooks {
            args.push(format!("--runtime-hook={}", hook.display()));
        }

        for pair in &ctx.add_data {
            args.push("--add-data".into());
            args.push(pair.render(platform));
        }
        for pair in &ctx.binaries {
            args.push("--add-binary".into());
            args.push(pair.render(platform));
        }

        args.push(format!("--hidden-import={}", ctx.runtime.package_name));
        for import in &ctx.hidden_imports {
            args.push(format!("--hidden-import={}", import));
        }
        for module in &ctx.excludes {
            args.push(format!("--exclude-module={}", module));
        }
        for path in &ctx.pathex {
            args.push(format!("--paths={}", path.display()));
        }

        args.extend(ctx.extra_args.iter().cloned());

        if let Some(icon) = &ctx.app_icon {
            args.push("--icon".into());
            args.push(icon.display().to_string());
        }

        args
    }

    pub fn build_args(ctx: &BuildContext, spec_file: &Path) -> Vec<String> {
        vec![
            "-m".into(),
            "PyInstaller".into(),
            "--noconfirm".into(),
            "--clean".into(),
            "--distpath".into(),
            ctx.dist_root.display().to_string(),
            "--workpath".into(),
            ctx.build_dir.join("work").display().to_string(),
            spec_file.display().to_string(),
        ]
    }

    pub async fn build_spec_file(
        runner: &dyn CommandRunner,
        python: &Path,
        spec_file: &Path,
    ) -> Result<()> {
        let cmd = CommandSpec::new(python)
            .args(["-m", "PyInstaller"])
            .arg(spec_file.display().to_string())
            .arg("--noconfirm")
            .streaming();

        println!("Running: {}", cmd);
        run_checked(runner, &cmd).await?;
        Ok(())
    }
}

#[async_trait]
impl FreezeBackend for PyInstaller {
    fn name(&self) -> &'static str {
        "pyinstaller"
    }

    async fn build(&self, ctx: &BuildContext) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&ctx.build_dir).await?;

        ctx.report("Generating spec...", 30);
        let makespec = CommandSpec::new(&ctx.python)
            .args(Self::makespec_args(ctx))
            .cwd(&ctx.script_dir);
        log::info!("Running makespec: {}", makespec);
        run_checked(ctx.runner(), &makespec).await?;

        let spec_file = Self::spec_path(ctx);
        if !spec_file.is_file() {
            return Err(DeskpackError::not_found(format!(
                "Spec file not generated: {}",
                spec_file.display()
            )));
        }

        ctx.report("Compiling...", 50);
        let build = CommandSpec::new(&ctx.python)
            .args(Self::build_args(ctx, &spec_file))
            .cwd(&ctx.script_dir)
            .streaming();
        log::info!("Building from spec: {}", build);
        run_checked(ctx.runner(), &build).await?;

        let dist = ctx.dist_dir();
        let has_splash = ctx.settings.splash_image().is_some();
        let pruned = cleanup_dist(&dist, has_splash)?;
        if pruned > 0 {
            log::info!("Pruned {} Tcl/Tk folders from {}", pruned, dist.display());
        }

        Ok(dist)
    }
}

pub fn cleanup_dist(dist: &Path, preserve_tk: bool) -> Result<usize> {
    if preserve_tk || !dist.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for root in [dist.to_path_buf(), dist.join("_internal")] {
        for folder in TK_FOLDERS {
            let candidate = root.join(folder);
            if candidate.is_dir() {
                remove_dir_if_exists(&candidate)?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}
