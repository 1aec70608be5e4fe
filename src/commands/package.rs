use crate::backend::PyInstaller;
use crate::build::{
    sanitize_out_name, BuildContext, BuildOptions, PackageSection, ProjectConfig, RuntimeLayout,
    Settings, SETTINGS_FILE,
};
use crate::cli::parser::CliParser;
use crate::cli::PackageArgs;
use crate::compiler::python::{discover_python, locate_package};
use crate::installer::InstallerBuilder;
use crate::pipeline::Pipeline;
use crate::result::Result;
use crate::utils::{CommandRunner, SystemRunner};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_SCRIPT: &str = "app.py";

pub async fn execute(args: PackageArgs) -> Result<()> {
    let mut cmd = PackageCommand::new(args);
    cmd.execute().await
}

pub struct PackageCommand {
    args: PackageArgs,
    runner: Arc<dyn CommandRunner>,
}

impl PackageCommand {
    pub fn new(args: PackageArgs) -> Self {
        let runner = Arc::new(SystemRunner::new(args.verbose));
        Self { args, runner }
    }

    pub async fn execute(&mut self) -> Result<()> {
        let started = Instant::now();
        let cwd = std::env::current_dir()?;

        let config = match &self.args.script {
            Some(script) => {
                let dir = absolute(&cwd, script)
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| cwd.clone());
                ProjectConfig::discover(&[dir.as_path(), cwd.as_path()]).await?
            }
            None => ProjectConfig::discover(&[cwd.as_path()]).await?,
        };

        let script = self
            .args
            .script
            .clone()
            .or_else(|| config.package.script.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT));
        let script = CliParser::validate_script_path(&absolute(&cwd, &script))?;
        let script_dir = script
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.clone());

        let python_override = self.args.python.clone().or_else(|| config.runtime.python.clone());
        let python = discover_python(python_override.as_deref(), &script_dir)?;
        log::info!("Packaging {} with {}", script.display(), python.display());

        let settings = Settings::load(&script_dir.join(SETTINGS_FILE)).await?;
        let out_name = derive_out_name(
            self.args.name.as_deref().or(config.package.name.as_deref()),
            &settings,
            &script,
        )?;

        if script.extension().and_then(|e| e.to_str()) == Some("spec") {
            return self
                .package_spec_file(&script, &script_dir, &out_name, &settings, &config, &python)
                .await;
        }

        let package_dir =
            locate_package(self.runner.as_ref(), &python, &config.runtime.package).await?;
        let runtime = RuntimeLayout::new(package_dir, config.runtime.package.as_str());

        let mut options = resolve_options(&self.args, &config.package);
        options.loader_override = config.runtime.loader.clone();

        let progress = ProgressBar::new(100);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
                .unwrap(),
        );
        progress.enable_steady_tick(std::time::Duration::from_millis(100));

        let mut ctx = BuildContext::new(
            &script,
            out_name,
            settings,
            runtime,
            &python,
            self.runner.clone(),
        )
        .with_options(options.clone())
        .with_progress(progress.clone());

        let mut directives = config.package.add_data.clone();
        directives.extend(self.args.add_data.iter().cloned());
        ctx.add_data.extend(CliParser::validate_add_data(&directives)?);
        for import in &config.package.hidden_imports {
            ctx.hidden_imports.push_unique(import.clone());
        }
        ctx.excludes.extend(config.package.excludes.iter().cloned());
        ctx.app_icon = self
            .args
            .icon
            .clone()
            .or_else(|| config.package.icon.clone())
            .map(|icon| absolute(&cwd, &icon));

        if self.args.verbose {
            progress.suspend(|| {
                println!("Package configuration:");
                println!("  Script: {}", ctx.script.display());
                println!("  Output name: {}", ctx.out_name);
                println!("  Engine: {}", ctx.options.engine.as_str());
                println!("  Secure: {}", ctx.options.secure);
            });
        }

        let mut pipeline = Pipeline::standard(&options);
        log::info!("Pipeline modules: {}", pipeline.module_names().join(", "));

        match pipeline.run(&mut ctx, &PyInstaller::new()).await {
            Ok(()) => {
                progress.finish_and_clear();
                println!(
                    "Packaged {} in {:.2}s: {}",
                    ctx.out_name,
                    started.elapsed().as_secs_f64(),
                    ctx.dist_dir().display()
                );
                Ok(())
            }
            Err(e) => {
                progress.abandon_with_message("Packaging failed");
                Err(e)
            }
        }
    }

    async fn package_spec_file(
        &self,
        spec_file: &Path,
        script_dir: &Path,
        out_name: &str,
        settings: &Settings,
        config: &ProjectConfig,
        python: &Path,
    ) -> Result<()> {
        println!("Building from spec file: {}", spec_file.display());
        PyInstaller::build_spec_file(self.runner.as_ref(), python, spec_file).await?;

        if self.args.installer || config.package.installer {
            let package_dir =
                locate_package(self.runner.as_ref(), python, &config.runtime.package).await?;
            let runtime = RuntimeLayout::new(package_dir, config.runtime.package.as_str());
            let icon = self.args.icon.clone().or_else(|| config.package.icon.clone());

            InstallerBuilder::new(self.runner.as_ref(), &runtime)
                .build(
                    out_name,
                    script_dir,
                    &script_dir.join("dist").join(out_name),
                    icon.as_deref(),
                    settings.version(),
                )
                .await?;
        }

        println!("Spec build finished");
        Ok(())
    }
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// `--name` (or `package.name`), then the sanitised settings title, then the script stem.
pub fn derive_out_name(explicit: Option<&str>, settings: &Settings, script: &Path) -> Result<String> {
    if let Some(name) = explicit {
        return CliParser::validate_name(name);
    }

    if let Some(title) = settings.title() {
        let sanitized = sanitize_out_name(title);
        if !sanitized.is_empty() {
            return Ok(sanitized);
        }
    }

    Ok(script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app".to_string()))
}

/// Command-line switches win; a switch left off falls back to the project file.
pub fn resolve_options(args: &PackageArgs, config: &PackageSection) -> BuildOptions {
    BuildOptions {
        onefile: args.onefile || config.onefile,
        console: args.console || config.console,
        engine: args.engine.unwrap_or(config.engine),
        secure: args.secure || config.secure,
        bundled: args.bundled || config.bundled,
        compile_all: args.compile_all || config.compile_all,
        strip_metadata: args.strip_metadata || config.strip_metadata,
        build_installer: args.installer || config.installer,
        collect_all: args.collect_all || config.collect_all,
        force_hooks: args.force_hooks || config.force_hooks,
        build_frontend: args.build_frontend || config.build_frontend,
        loader_override: None,
    }
}
