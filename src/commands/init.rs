use crate::build::{ProjectConfig, TargetPlatform, CONFIG_FILE, SETTINGS_FILE};
use crate::build::config::DEFAULT_RUNTIME_PACKAGE;
use crate::result::{DeskpackError, Result};
use crate::utils::fs::make_executable;
use crate::utils::{find_executable, run_checked, CommandRunner, CommandSpec, SystemRunner};
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::fs;

const FRONTEND_DIR: &str = "frontend";
const ENV_DIR: &str = "env";

pub async fn execute(name: &str, no_frontend: bool) -> Result<()> {
    let target = std::env::current_dir()?.join(name);
    let runner = SystemRunner::new(false);
    let mut cmd = InitCommand::new(&runner, target);
    cmd.execute(!no_frontend).await
}

pub struct InitCommand<'a> {
    runner: &'a dyn CommandRunner,
    target: PathBuf,
    package: String,
    platform: TargetPlatform,
}

impl<'a> InitCommand<'a> {
    pub fn new(runner: &'a dyn CommandRunner, target: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            target: target.into(),
            package: DEFAULT_RUNTIME_PACKAGE.to_string(),
            platform: TargetPlatform::current(),
        }
    }

    pub fn with_platform(mut self, platform: TargetPlatform) -> Self {
        self.platform = platform;
        self
    }

    pub async fn execute(&mut self, with_frontend: bool) -> Result<()> {
        if self.target.exists() {
            return Err(DeskpackError::config(format!(
                "Target '{}' already exists",
                self.target.display()
            )));
        }

        println!("Creating new application at: {}", self.target.display());
        log::info!("Scaffolding project at {}", self.target.display());
        self.write_project_files().await?;

        if with_frontend {
            self.scaffold_frontend().await?;
        }

        if let Err(e) = self.create_environment().await {
            log::warn!("init: virtual environment setup failed: {}", e);
            eprintln!("Warning: Failed to set up virtual environment: {}", e);
        }

        println!("Scaffolded app files:");
        println!(" - {}", self.target.join("app.py").display());
        println!(" - {}", self.target.join(SETTINGS_FILE).display());
        println!(" - {}", self.target.join(CONFIG_FILE).display());
        if with_frontend {
            println!(" - {}", self.target.join(FRONTEND_DIR).display());
        }
        println!("Then run: deskpack package");
        Ok(())
    }

    async fn write_project_files(&self) -> Result<()> {
        fs::create_dir_all(&self.target).await?;

        fs::write(self.target.join("app.py"), app_source(&self.package)).await?;

        let settings = json!({
            "title": "My App",
            "width": 800,
            "height": 600,
            "resizable": true,
            "frameless": false,
            "easy_drag": true,
            "url": "frontend/dist/index.html",
            "version": "1.0.0",
            "debug": true
        });
        fs::write(
            self.target.join(SETTINGS_FILE),
            serde_json::to_string_pretty(&settings)?,
        )
        .await?;

        let mut config = ProjectConfig::default();
        config.package.script = Some(PathBuf::from("app.py"));
        config.runtime.package = self.package.as_str().into();
        config.save_to_file(&self.target.join(CONFIG_FILE)).await?;

        fs::write(
            self.target.join("README.md"),
            format!(
                "# My App\n\n## Structure\n- `app.py`: Python entry point\n- `{}`: window settings\n- `{}`: packaging options\n- `{}/`: web frontend\n",
                SETTINGS_FILE, CONFIG_FILE, FRONTEND_DIR
            ),
        )
        .await?;
        fs::write(self.target.join("requirements.txt"), format!("{}\n", self.package)).await?;
        Ok(())
    }

    /// `npx create-vite` then `npm install`; on failure a static page stands in.
    async fn scaffold_frontend(&self) -> Result<()> {
        println!("Initializing Vite React app...");
        match self.run_vite().await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::warn!("init: frontend scaffold failed: {}", e);
                eprintln!("Failed to initialize Vite app: {}", e);

                let frontend = self.target.join(FRONTEND_DIR);
                fs::create_dir_all(&frontend).await?;
                let index = frontend.join("index.html");
                if !index.exists() {
                    fs::write(
                        index,
                        "<!doctype html><html><body><h1>App (Vite init failed)</h1></body></html>",
                    )
                    .await?;
                }
                Ok(())
            }
        }
    }

    async fn run_vite(&self) -> Result<()> {
        let npx = find_executable("npx")?;
        let create = CommandSpec::new(npx)
            .args(["-y", "create-vite", FRONTEND_DIR, "--template", "react"])
            .cwd(&self.target)
            .streaming();
        run_checked(self.runner, &create).await?;

        println!("Installing dependencies...");
        let npm = find_executable("npm")?;
        let install = CommandSpec::new(npm)
            .arg("install")
            .cwd(self.target.join(FRONTEND_DIR))
            .streaming();
        run_checked(self.runner, &install).await?;
        Ok(())
    }

    async fn create_environment(&self) -> Result<()> {
        println!("Creating virtual environment...");
        let python = which::which("python3")
            .or_else(|_| which::which("python"))
            .map_err(|_| DeskpackError::not_found("No Python interpreter found on PATH"))?;
        let env_dir = self.target.join(ENV_DIR);

        run_checked(
            self.runner,
            &CommandSpec::new(python).args(["-m", "venv"]).arg(env_dir.display().to_string()),
        )
        .await?;

        println!("Installing {} in virtual environment...", self.package);
        let pip = venv_tool(&env_dir, self.platform, "pip");
        run_checked(
            self.runner,
            &CommandSpec::new(pip).args(["install", self.package.as_str()]).streaming(),
        )
        .await?;

        self.write_run_script().await?;
        Ok(())
    }

    async fn write_run_script(&self) -> Result<PathBuf> {
        let (file, body) = match self.platform {
            TargetPlatform::Windows => (
                "run.bat",
                format!("@echo off\ncall {}\\Scripts\\activate.bat\npython app.py\npause\n", ENV_DIR),
            ),
            _ => (
                "run.sh",
                format!("#!/bin/bash\nsource {}/bin/activate\npython app.py\n", ENV_DIR),
            ),
        };

        let path = self.target.join(file);
        fs::write(&path, body).await?;
        make_executable(&path)?;
        Ok(path)
    }
}

fn venv_tool(env_dir: &Path, platform: TargetPlatform, tool: &str) -> PathBuf {
    match platform {
        TargetPlatform::Windows => env_dir.join("Scripts").join(format!("{}.exe", tool)),
        _ => env_dir.join("bin").join(tool),
    }
}

fn app_source(package: &str) -> String {
    format!(
        r#"from {package} import App


def main():
    app = App()
    app.create_window()
    app.run()


if __name__ == "__main__":
    main()
"#
    )
}
