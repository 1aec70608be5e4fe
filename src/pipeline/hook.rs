use crate::build::BuildContext;
use crate::compiler::InterpreterConfig;
use crate::pipeline::{order, BuildModule};
use crate::result::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;

pub const HOOKS_DIR: &str = "nuclear_hooks";

const SKIPPED_PACKAGES: &[&str] = &[
    "pip",
    "setuptools",
    "wheel",
    "pkg_resources",
    "distutils",
    "PyInstaller",
    "pyinstaller_hooks_contrib",
    "_pyinstaller_hooks_contrib",
    "Cython",
    "pyximport",
    "altgraph",
    "pefile",
    "macholib",
];

#[derive(Debug, Default)]
pub struct HookModule;

#[async_trait]
impl BuildModule for HookModule {
    fn name(&self) -> &'static str {
        "hook"
    }

    fn order(&self) -> u32 {
        order::HOOK
    }

    async fn prepare(&mut self, ctx: &mut BuildContext) -> Result<()> {
        let collect_all = ctx.options.collect_all;
        if !collect_all && !ctx.options.force_hooks {
            return Ok(());
        }

        let site_packages = match InterpreterConfig::query(ctx.runner(), &ctx.python).await {
            Ok(config) => config.platlib,
            Err(e) => {
                log::warn!("hook: interpreter query failed, no hooks generated: {}", e);
                None
            }
        };
        let Some(site_packages) = site_packages.filter(|p| p.is_dir()) else {
            log::warn!("hook: site-packages not found, skipping hook generation");
            return Ok(());
        };

        let packages = importable_packages(&site_packages).await?;
        let hooks_dir = ctx.build_dir.join(HOOKS_DIR);
        let written = write_hooks(&hooks_dir, &packages, collect_all).await?;
        println!(
            "Generated {} dependency hooks ({})",
            written,
            if collect_all { "collect_all" } else { "collect_submodules" }
        );

        let hooks_dir = std::path::absolute(&hooks_dir).unwrap_or(hooks_dir);
        ctx.extra_args
            .push(format!("--additional-hooks-dir={}", hooks_dir.display()));
        Ok(())
    }
}

pub async fn importable_packages(site_packages: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(site_packages).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().into_owned();

        let name = if path.is_dir() {
            if !path.join("__init__.py").is_file() {
                continue;
            }
            file_name
        } else if let Some(stem) = file_name.strip_suffix(".py") {
            stem.to_string()
        } else {
            continue;
        };

        if name.starts_with('_') || name.contains('-') || name.contains('.') {
            continue;
        }
        if SKIPPED_PACKAGES.contains(&name.as_str()) {
            continue;
        }
        names.push(name);
    }

    names.sort();
    names.dedup();
    Ok(names)
}

pub fn hook_source(package: &str, collect_all: bool) -> String {
    if collect_all {
        format!(
            "from PyInstaller.utils.hooks import collect_all\n\n\
             datas, binaries, hiddenimports = collect_all(\"{}\")\n",
            package
        )
    } else {
        format!(
            "from PyInstaller.utils.hooks import collect_submodules\n\n\
             hiddenimports = collect_submodules(\"{}\")\n",
            package
        )
    }
}

pub async fn write_hooks(dir: &Path, packages: &[String], collect_all: bool) -> Result<usize> {
    fs::create_dir_all(dir).await?;
    for package in packages {
        let file = dir.join(format!("hook-{}.py", package));
        fs::write(&file, hook_source(package, collect_all)).await?;
    }
    Ok(packages.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BuildOptions, RuntimeLayout, Settings};
    use crate::utils::{CommandOutput, RecordingRunner};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn site_packages(root: &Path) -> std::path::PathBuf {
        let site = root.join("site");
        for pkg in ["requests", "pip", "_private", "numpy"] {
            std::fs::create_dir_all(site.join(pkg)).unwrap();
            std::fs::write(site.join(pkg).join("__init__.py"), "").unwrap();
        }
        std::fs::create_dir_all(site.join("requests-2.31.0.dist-info")).unwrap();
        std::fs::create_dir_all(site.join("data_only")).unwrap();
        std::fs::write(site.join("six.py"), "").unwrap();
        site
    }

    #[tokio::test]
    async fn finds_importable_names() {
        let tmp = TempDir::new().unwrap();
        let site = site_packages(tmp.path());

        let names = importable_packages(&site).await.unwrap();

        assert_eq!(names, vec!["numpy", "requests", "six"]);
    }

    #[test]
    fn hook_body_depends_on_mode() {
        assert!(hook_source("numpy", true).contains("collect_all(\"numpy\")"));
        assert!(hook_source("numpy", false).contains("collect_submodules(\"numpy\")"));
    }

    #[tokio::test]
    async fn hooks_dir_is_passed_to_backend() {
        let tmp = TempDir::new().unwrap();
        let site = site_packages(tmp.path());
        let stdout = serde_json::json!({
            "include": "/inc",
            "version": "312",
            "base_prefix": "/usr",
            "platlib": site,
        })
        .to_string();
        let runner = RecordingRunner::new(move |_| CommandOutput::success().with_stdout(stdout.clone()));
        let mut ctx = BuildContext::new(
            tmp.path().join("app.py"),
            "App",
            Settings::default(),
            RuntimeLayout::new("/site", "pytron"),
            "python",
            Arc::new(runner),
        )
        .with_options(BuildOptions {
            collect_all: true,
            ..BuildOptions::default()
        });

        HookModule.prepare(&mut ctx).await.unwrap();

        let hooks = tmp.path().join("build").join(HOOKS_DIR);
        assert!(hooks.join("hook-requests.py").is_file());
        assert!(!hooks.join("hook-pip.py").exists());
        assert_eq!(
            ctx.extra_args[0],
            format!("--additional-hooks-dir={}", hooks.display())
        );
    }

    #[tokio::test]
    async fn disabled_by_default() {
        let runner = Arc::new(RecordingRunner::succeeding());
        let mut ctx = BuildContext::new(
            "/p/app.py",
            "App",
            Settings::default(),
            RuntimeLayout::new("/site", "pytron"),
            "python",
            runner.clone(),
        );

        HookModule.prepare(&mut ctx).await.unwrap();

        assert!(ctx.extra_args.is_empty());
        assert!(runner.calls().is_empty());
    }
}
