use crate::build::TargetPlatform;
use crate::compiler::python::InterpreterConfig;
use crate::compiler::toolchain::{zig_target, Toolchain};
use crate::result::{DeskpackError, Result};
use crate::utils::{run_checked, CommandRunner, CommandSpec};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const FALLBACK_SCRIPT: &str = "setup_compile.py";

/** Compiles Python modules into native extension modules
 *
 * # Process Flow
 * 1. Make sure Cython is importable (installs it with pip if needed)
 * 2. Translate the module to C with Cython
 * 3. Build a shared library with `zig cc`, linking against the interpreter's
 *    headers and import library
 * 4. If zig is unavailable or fails, run exactly one setuptools build with
 *    the platform's default compiler
 *
 * The extension's init symbol follows the source file name, so callers
 * pick the module name through the file they pass in.
 */
pub struct NativeCompiler<'a> {
    runner: &'a dyn CommandRunner,
    python: &'a Path,
    platform: TargetPlatform,
    toolchain: Toolchain,
}

impl<'a> NativeCompiler<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        python: &'a Path,
        platform: TargetPlatform,
        toolchain: Toolchain,
    ) -> Self {
        Self {
            runner,
            python,
            platform,
            toolchain,
        }
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub async fn ensure_cython(&self) -> Result<()> {
        let check = CommandSpec::new(self.python).args(["-c", "import Cython"]);
        if self.runner.run(&check).await?.is_success() {
            return Ok(());
        }

        println!("Cython missing in build environment. Installing...");
        let install = CommandSpec::new(self.python)
            .args(["-m", "pip", "install", "Cython"])
            .streaming();
        run_checked(self.runner, &install).await.map_err(|e| {
            log::error!("Failed to install Cython: {}", e);
            e
        })?;
        Ok(())
    }

    pub async fn compile(&self, source: &Path, out_dir: &Path) -> Result<PathBuf> {
        let stem = module_stem(source)?;
        let output = out_dir.join(format!("{}{}", stem, self.platform.extension_suffix()));

        let zig = match &self.toolchain {
            Toolchain::Zig(zig) => zig.clone(),
            Toolchain::Default => return self.compile_fallback(source, out_dir).await,
        };

        let c_file = out_dir.join(format!("{}.c", stem));
        self.cythonize(source, &c_file).await?;

        let config = InterpreterConfig::query(self.runner, self.python).await?;
        let cmd = self.zig_command(&zig, &c_file, &output, &config);

        log::info!("Compiling {} with zig cc ({})", output.display(), zig_target(self.platform));
        match run_checked(self.runner, &cmd).await {
            Ok(_) if output.is_file() => {
                log::info!("Compiled {} with zig", output.display());
                Ok(output)
            }
            Ok(_) => {
                log::warn!("zig reported success but {} is missing", output.display());
                self.compile_fallback(source, out_dir).await
            }
            Err(e) => {
                log::warn!("zig compilation failed ({}), trying the default toolchain", e);
                self.compile_fallback(source, out_dir).await
            }
        }
    }

    async fn cythonize(&self, source: &Path, c_file: &Path) -> Result<()> {
        let cmd = CommandSpec::new(self.python).args([
            "-m".to_string(),
            "cython".to_string(),
            "-3".to_string(),
            "--fast-fail".to_string(),
            source.display().to_string(),
            "-o".to_string(),
            c_file.display().to_string(),
        ]);
        run_checked(self.runner, &cmd).await?;

        if !c_file.is_file() {
            return Err(DeskpackError::not_found(format!(
                "Cython produced no C source: {}",
                c_file.display()
            )));
        }
        Ok(())
    }

    pub fn zig_command(
        &self,
        zig: &Path,
        c_file: &Path,
        output: &Path,
        config: &InterpreterConfig,
    ) -> CommandSpec {
        let lib_dir = config.lib_dir(self.platform);
        let mut cmd = CommandSpec::new(zig).args([
            "cc".to_string(),
            "-target".to_string(),
            zig_target(self.platform),
            "-O3".to_string(),
            "-shared".to_string(),
            "-o".to_string(),
            output.display().to_string(),
            c_file.display().to_string(),
            format!("-I{}", config.include.display()),
        ]);

        match self.platform {
            TargetPlatform::Windows => {
                cmd = cmd
                    .arg(format!("-L{}", lib_dir.display()))
                    .arg(format!("-l{}", config.link_name()));
            }
            TargetPlatform::MacOs => {
                cmd = cmd
                    .arg("-fPIC")
                    .arg(format!("-L{}", lib_dir.display()))
                    .arg("-Wl,-undefined,dynamic_lookup");
            }
            TargetPlatform::Linux => {
                cmd = cmd.arg("-fPIC").arg(format!("-L{}", lib_dir.display()));
            }
        }
        cmd
    }

    /// Builds `source` in place with setuptools; the one fallback attempt.
    pub async fn compile_fallback(&self, source: &Path, out_dir: &Path) -> Result<PathBuf> {
        println!("Using standard Python build tools...");
        let stem = module_stem(source)?;
        let ext = self.platform.extension_suffix();

        let setup = out_dir.join(FALLBACK_SCRIPT);
        fs::write(&setup, setup_script(source)).await?;

        let cmd = CommandSpec::new(self.python)
            .args([FALLBACK_SCRIPT, "build_ext", "--inplace"])
            .cwd(out_dir);
        run_checked(self.runner, &cmd).await?;

        let target = out_dir.join(format!("{}{}", stem, ext));
        let built = find_built_extension(out_dir, &stem, ext).ok_or_else(|| {
            DeskpackError::not_found(format!(
                "Default toolchain produced no {}{} in {}",
                stem,
                ext,
                out_dir.display()
            ))
        })?;

        if built != target {
            if target.exists() {
                fs::remove_file(&target).await?;
            }
            fs::rename(&built, &target).await?;
        }
        Ok(target)
    }
}

fn module_stem(source: &Path) -> Result<String> {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| DeskpackError::config(format!("Not a module file: {}", source.display())))
}

pub fn setup_script(source: &Path) -> String {
    let posix = source.display().to_string().replace('\\', "/");
    format!(
        r#"from setuptools import setup
from Cython.Build import cythonize

setup(
    ext_modules=cythonize(
        "{}",
        compiler_directives={{"language_level": "3"}},
        quiet=True,
    ),
)
"#,
        posix
    )
}

/// Finds `<stem>*<ext>` produced by setuptools, in `dir` or its `build/lib*` folders.
pub fn find_built_extension(dir: &Path, stem: &str, ext: &str) -> Option<PathBuf> {
    let matches = |path: &Path| {
        path.file_name()
            .map(|n| n.to_string_lossy())
            .is_some_and(|n| n.starts_with(stem) && n.ends_with(ext))
    };

    let direct = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && matches(p))
        .min_by_key(|p| p.as_os_str().len());
    if direct.is_some() {
        return direct;
    }

    walkdir::WalkDir::new(dir.join("build"))
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .find(|p| p.is_file() && matches(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{CommandOutput, RecordingRunner};
    use tempfile::TempDir;

    fn config() -> InterpreterConfig {
        InterpreterConfig::parse(
            r#"{"include": "/py/include", "libdir": "/py/lib", "version": "311", "base_prefix": "/py"}"#,
        )
        .unwrap()
    }

    #[test]
    fn windows_links_import_library() {
        let runner = RecordingRunner::succeeding();
        let python = PathBuf::from("python");
        let compiler = NativeCompiler::new(
            &runner,
            &python,
            TargetPlatform::Windows,
            Toolchain::Zig("zig".into()),
        );

        let cmd = compiler.zig_command(
            Path::new("zig"),
            Path::new("app.c"),
            Path::new("app.pyd"),
            &config(),
        );

        assert!(cmd.has_arg("-lpython311"));
        assert!(cmd.has_arg("-I/py/include"));
        assert!(!cmd.has_arg("-fPIC"));
    }

    #[test]
    fn macos_defers_symbol_resolution() {
        let runner = RecordingRunner::succeeding();
        let python = PathBuf::from("python");
        let compiler = NativeCompiler::new(
            &runner,
            &python,
            TargetPlatform::MacOs,
            Toolchain::Zig("zig".into()),
        );

        let cmd = compiler.zig_command(
            Path::new("zig"),
            Path::new("app.c"),
            Path::new("app.so"),
            &config(),
        );

        assert!(cmd.has_arg("-fPIC"));
        assert!(cmd.has_arg("-Wl,-undefined,dynamic_lookup"));
        assert!(cmd.has_arg("-L/py/lib"));
    }

    #[tokio::test]
    async fn default_toolchain_goes_straight_to_setuptools() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().to_path_buf();
        let source = out.join("app.py");
        std::fs::write(&source, "print('hi')").unwrap();

        let built = out.join("app.cpython-311-x86_64-linux-gnu.so");
        let runner = RecordingRunner::new(move |spec| {
            if spec.has_arg(FALLBACK_SCRIPT) {
                std::fs::write(&built, b"elf").unwrap();
            }
            CommandOutput::success()
        });
        let python = PathBuf::from("python");
        let compiler =
            NativeCompiler::new(&runner, &python, TargetPlatform::Linux, Toolchain::Default);

        let result = compiler.compile(&source, &out).await.unwrap();

        assert_eq!(result, out.join("app.so"));
        assert!(result.is_file());
        assert_eq!(runner.calls().len(), 1);
        assert!(std::fs::read_to_string(out.join(FALLBACK_SCRIPT))
            .unwrap()
            .contains("cythonize("));
    }

    #[test]
    fn setup_script_uses_forward_slashes() {
        let script = setup_script(Path::new(r"C:\proj\build\app.py"));
        assert!(script.contains("\"C:/proj/build/app.py\""));
    }
}
