use crate::build::{RuntimeLayout, TargetPlatform};
use crate::result::{DeskpackError, Result};
use crate::utils::process::{first_existing, run_checked, CommandRunner, CommandSpec};
use std::path::{Path, PathBuf};
use which::which;

const STANDARD_MAKENSIS: &[&str] = &[
    r"C:\Program Files (x86)\NSIS\makensis.exe",
    r"C:\Program Files\NSIS\makensis.exe",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerParams {
    pub name: String,
    pub version: String,
    pub build_dir: PathBuf,
    pub main_exe: String,
    pub out_dir: PathBuf,
    pub icon: Option<PathBuf>,
}

impl InstallerParams {
    pub fn defines(&self) -> Vec<String> {
        let mut defines = vec![
            format!("/DNAME={}", self.name),
            format!("/DVERSION={}", self.version),
            format!("/DBUILD_DIR={}", self.build_dir.display()),
            format!("/DMAIN_EXE_NAME={}", self.main_exe),
            format!("/DOUT_DIR={}", self.out_dir.display()),
        ];
        if let Some(icon) = &self.icon {
            defines.push(format!("/DMUI_ICON={}", icon.display()));
            defines.push(format!("/DMUI_UNICON={}", icon.display()));
        }
        defines
    }
}

pub fn find_template(project_dir: &Path, runtime: &RuntimeLayout) -> Option<PathBuf> {
    let candidates = [
        project_dir.join("installer.nsi"),
        project_dir.join("installer").join("Installation.nsi"),
        runtime.installer_template(),
    ];
    first_existing(candidates.iter().map(PathBuf::as_path))
}

pub fn find_makensis() -> Option<PathBuf> {
    which("makensis")
        .ok()
        .or_else(|| first_existing(STANDARD_MAKENSIS.iter().map(Path::new)))
}

pub struct InstallerBuilder<'a> {
    runner: &'a dyn CommandRunner,
    runtime: &'a RuntimeLayout,
    compiler: Option<PathBuf>,
}

impl<'a> InstallerBuilder<'a> {
    pub fn new(runner: &'a dyn CommandRunner, runtime: &'a RuntimeLayout) -> Self {
        Self {
            runner,
            runtime,
            compiler: None,
        }
    }

    pub fn with_compiler(mut self, makensis: impl Into<PathBuf>) -> Self {
        self.compiler = Some(makensis.into());
        self
    }

    async fn resolve_compiler(&self) -> Result<PathBuf> {
        if let Some(path) = self.compiler.clone().or_else(find_makensis) {
            return Ok(path);
        }

        let setup = self.runtime.bundled_nsis_setup();
        if setup.is_file() {
            println!("NSIS not found. Running bundled installer...");
            let spec = CommandSpec::new(&setup).streaming();
            if let Err(e) = run_checked(self.runner, &spec).await {
                log::warn!("installer: bundled NSIS setup failed: {}", e);
            }
            if let Some(path) = find_makensis() {
                return Ok(path);
            }
        }

        Err(DeskpackError::not_found(
            DeskpackError::INSTALLER_COMPILER_NOT_FOUND,
        ))
    }

    /// Compiles the installer; child failures carry makensis' exit code.
    pub async fn build(
        &self,
        out_name: &str,
        project_dir: &Path,
        dist_dir: &Path,
        icon: Option<&Path>,
        version: Option<String>,
    ) -> Result<()> {
        let main_exe = TargetPlatform::Windows.exe_name(out_name);
        if !dist_dir.join(&main_exe).is_file() {
            return Err(DeskpackError::not_found(format!(
                "Build output not found: {}",
                dist_dir.join(&main_exe).display()
            )));
        }

        let template = find_template(project_dir, self.runtime).ok_or_else(|| {
            DeskpackError::not_found("Installer script (installer.nsi) not found")
        })?;
        let makensis = self.resolve_compiler().await?;

        let params = InstallerParams {
            name: out_name.to_string(),
            version: version.unwrap_or_else(|| "1.0".to_string()),
            build_dir: std::path::absolute(dist_dir)?,
            main_exe,
            out_dir: std::path::absolute(project_dir)?,
            icon: icon.map(std::path::absolute).transpose()?,
        };

        println!("Building installer with {}...", template.display());
        let spec = CommandSpec::new(makensis)
            .args(params.defines())
            .arg(template.display().to_string())
            .streaming();
        run_checked(self.runner, &spec).await?;
        println!("Installer built successfully in {}", params.out_dir.display());
        Ok(())
    }
}
