use crate::build::TargetPlatform;
use crate::result::{DeskpackError, Result};
use crate::utils::{run_checked, CommandRunner, CommandSpec};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_QUERY: &str = "import json, sys, sysconfig; print(json.dumps({\
\"include\": sysconfig.get_path(\"include\"), \
\"libdir\": sysconfig.get_config_var(\"LIBDIR\") or \"\", \
\"version\": \"%d%d\" % sys.version_info[:2], \
\"full_version\": sys.version.split()[0], \
\"base_prefix\": sys.base_prefix, \
\"platlib\": sysconfig.get_path(\"platlib\")}))";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InterpreterConfig {
    pub include: PathBuf,
    #[serde(default)]
    pub libdir: String,
    /// `major` and `minor` without separator, e.g. `312`.
    pub version: String,
    #[serde(default)]
    pub full_version: String,
    pub base_prefix: PathBuf,
    #[serde(default)]
    pub platlib: Option<PathBuf>,
}

impl InterpreterConfig {
    pub async fn query(runner: &dyn CommandRunner, python: &Path) -> Result<Self> {
        let cmd = CommandSpec::new(python).args(["-c", CONFIG_QUERY]);
        let output = run_checked(runner, &cmd).await?;
        Self::parse(&output.stdout)
    }

    pub fn parse(stdout: &str) -> Result<Self> {
        let line = stdout
            .lines()
            .rev()
            .find(|l| l.trim_start().starts_with('{'))
            .ok_or_else(|| DeskpackError::process("Interpreter returned no configuration"))?;
        Ok(serde_json::from_str(line.trim())?)
    }

    pub fn lib_dir(&self, platform: TargetPlatform) -> PathBuf {
        match platform {
            TargetPlatform::Windows => self.base_prefix.join("libs"),
            _ if !self.libdir.is_empty() => PathBuf::from(&self.libdir),
            _ => self.base_prefix.join("lib"),
        }
    }

    pub fn link_name(&self) -> String {
        format!("python{}", self.version)
    }
}

/** Chooses the Python interpreter used for every packaging tool
 *
 * # Search Order
 * 1. Explicit override (`[runtime].python`)
 * 2. Active virtual environment (`VIRTUAL_ENV`)
 * 3. `.venv` / `venv` / `env` next to the project
 * 4. `python3` / `python` on `PATH`
 */
pub fn discover_python(override_path: Option<&Path>, project_dir: &Path) -> Result<PathBuf> {
    if let Some(path) = override_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return which::which(path).map_err(|_| {
            DeskpackError::not_found(format!("Python interpreter not found: {}", path.display()))
        });
    }

    if let Some(venv) = std::env::var_os("VIRTUAL_ENV") {
        if let Some(python) = venv_python(Path::new(&venv)) {
            return Ok(python);
        }
    }

    for name in [".venv", "venv", "env"] {
        if let Some(python) = venv_python(&project_dir.join(name)) {
            log::info!("Using project environment: {}", python.display());
            return Ok(python);
        }
    }

    which::which("python3")
        .or_else(|_| which::which("python"))
        .map_err(|_| DeskpackError::not_found("No Python interpreter found on PATH"))
}

fn venv_python(venv: &Path) -> Option<PathBuf> {
    [
        venv.join("Scripts").join("python.exe"),
        venv.join("bin").join("python3"),
        venv.join("bin").join("python"),
    ]
    .into_iter()
    .find(|p| p.is_file())
}

pub async fn locate_package(
    runner: &dyn CommandRunner,
    python: &Path,
    package: &str,
) -> Result<PathBuf> {
    let script = format!(
        "import os, {pkg}; print(os.path.dirname(os.path.dirname(os.path.abspath({pkg}.__file__))))",
        pkg = package
    );
    let output = runner
        .run(&CommandSpec::new(python).args(["-c", script.as_str()]))
        .await?;

    let location = output.stdout.trim();
    if !output.is_success() || location.is_empty() {
        return Err(DeskpackError::not_found(format!(
            "Cannot determine {} installation location. Install it into the build environment: pip install {}",
            package, package
        )));
    }
    Ok(PathBuf::from(location))
}

pub async fn version_string(runner: &dyn CommandRunner, python: &Path) -> Result<String> {
    let output = run_checked(runner, &CommandSpec::new(python).arg("--version")).await?;
    let text = if output.stdout.trim().is_empty() {
        output.stderr
    } else {
        output.stdout
    };
    Ok(text.trim().to_string())
}
