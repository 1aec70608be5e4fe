mod helpers;

use deskpack::build::{BuildOptions, TargetPlatform};
use deskpack::compiler::native::FALLBACK_SCRIPT;
use deskpack::compiler::python::CONFIG_QUERY;
use deskpack::compiler::Toolchain;
use deskpack::pipeline::{AssetModule, BuildModule, MetadataCleaningModule, Pipeline};
use deskpack::result::DeskpackError;
use deskpack::secure::fuse::BUNDLE_NAME;
use deskpack::secure::transform::BOOTSTRAP_FILE;
use deskpack::secure::{SecureStage, SecurityModule};
use deskpack::utils::{CommandOutput, CommandSpec, RecordingRunner};
use helpers::{context, project, write_file, FakeBackend, FRAMEWORK};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Answers the setuptools build by dropping `app.so` into its working directory.
fn setuptools_responder(spec: &CommandSpec) -> CommandOutput {
    if spec.has_arg(FALLBACK_SCRIPT) {
        if let Some(cwd) = &spec.cwd {
            std::fs::write(cwd.join("app.cpython-311-x86_64-linux-gnu.so"), b"elf").unwrap();
        }
    }
    CommandOutput::success()
}

fn install_loader(root: &Path) -> PathBuf {
    write_file(
        root,
        &format!("site/{}/pack/secure_loader/bin/pytron_rust_bootloader", FRAMEWORK),
        "loader",
    )
}

fn frozen_layout() -> FakeBackend {
    FakeBackend::with_layout(&[
        ("{name}", "frozen"),
        ("_internal/app.so", "elf"),
        ("_internal/libpython3.11.so.1.0", "runtime"),
        ("_internal/mylib/__init__.py", "VALUE = 1\n"),
        ("_internal/mylib/util.py", "def f(): pass\n"),
        ("_internal/native_pkg/__init__.py", "from . import core\n"),
        ("_internal/native_pkg/core.so", "elf"),
        ("_internal/mylib-1.0.dist-info/METADATA", "Name: mylib\n"),
    ])
}

fn secure_options() -> BuildOptions {
    BuildOptions {
        secure: true,
        bundled: true,
        ..BuildOptions::default()
    }
}

#[tokio::test]
async fn hardened_build_is_assembled_and_swapped_in() {
    let tmp = TempDir::new().unwrap();
    let dir = project(tmp.path(), r#"{"title": "Demo", "debug": true}"#);
    install_loader(tmp.path());
    let runner = Arc::new(RecordingRunner::new(setuptools_responder));
    let mut ctx = context(tmp.path(), &dir, runner.clone())
        .await
        .with_options(secure_options());
    write_file(&dir, "dist/Demo/stale.txt", "old build");
    let backend = frozen_layout();

    Pipeline::new()
        .with_module(AssetModule)
        .with_module(SecurityModule::new().with_toolchain(Toolchain::Default))
        .with_module(MetadataCleaningModule)
        .run(&mut ctx, &backend)
        .await
        .unwrap();

    assert_eq!(backend.names(), vec!["Demo_base"]);
    let args = &backend.builds()[0];
    assert!(args.iter().any(|a| a.ends_with("bootstrap_env.py")));
    assert!(args.contains(&dir.join("app.py").display().to_string()));
    assert!(args.contains(&"--exclude-module=app".to_string()));

    let dist = dir.join("dist").join("Demo");
    assert_eq!(std::fs::read_to_string(dist.join("Demo")).unwrap(), "loader");
    assert!(!dist.join("Demo_base").exists());
    assert!(!dist.join("stale.txt").exists());
    assert!(dist.join("app.so").is_file());
    assert!(dist.join("libpython3.11.so.1.0").is_file());
    assert!(!dist.join("_internal/mylib-1.0.dist-info").exists());
    assert!(!dir.join("dist").join("Demo_base").exists());
    assert!(!dir.join("dist").join(".Demo.staging").exists());

    assert!(dist.join("_internal/native_pkg/__init__.py").is_file());
    assert!(!dist.join("_internal/mylib").exists());
    let mut bundle = zip::ZipArchive::new(std::fs::File::open(dist.join(BUNDLE_NAME)).unwrap()).unwrap();
    let mut source = String::new();
    bundle
        .by_name("mylib/__init__.py")
        .unwrap()
        .read_to_string(&mut source)
        .unwrap();
    assert_eq!(source, "VALUE = 1\n");
    assert!(bundle.by_name("native_pkg/__init__.py").is_err());

    assert_eq!(runner.count_matching(|s| s.has_arg(FALLBACK_SCRIPT)), 1);
}

#[tokio::test]
async fn missing_loader_keeps_previous_distribution() {
    let tmp = TempDir::new().unwrap();
    let dir = project(tmp.path(), r#"{"title": "Demo"}"#);
    let runner = Arc::new(RecordingRunner::new(setuptools_responder));
    let mut ctx = context(tmp.path(), &dir, runner)
        .await
        .with_options(secure_options());
    write_file(&dir, "dist/Demo/Demo", "previous release");
    let backend = frozen_layout();

    let err = Pipeline::new()
        .with_module(SecurityModule::new().with_toolchain(Toolchain::Default))
        .run(&mut ctx, &backend)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeskpackError::Hardening {
            stage: SecureStage::LoaderDeployed,
            ..
        }
    ));
    let dist = dir.join("dist").join("Demo");
    assert_eq!(
        std::fs::read_to_string(dist.join("Demo")).unwrap(),
        "previous release"
    );
    assert!(!dist.join(BUNDLE_NAME).exists());
    assert!(!dir.join("dist").join(".Demo.staging").exists());
}

#[tokio::test]
async fn portable_toolchain_failure_falls_back_exactly_once() {
    let tmp = TempDir::new().unwrap();
    let dir = project(tmp.path(), "{}");
    let runner = Arc::new(RecordingRunner::new(|spec: &CommandSpec| {
        if spec.program == Path::new("zig-cc") {
            return CommandOutput::failure(1, "zig: unsupported target");
        }
        if spec.has_arg(FALLBACK_SCRIPT) {
            return CommandOutput::failure(2, "error: Microsoft Visual C++ 14.0 is required");
        }
        if spec.has_arg(CONFIG_QUERY) {
            return CommandOutput::success().with_stdout(
                r#"{"include": "/py/include", "libdir": "/py/lib", "version": "311", "base_prefix": "/py"}"#,
            );
        }
        if spec.has_arg("cython") {
            if let Some(pos) = spec.args.iter().position(|a| a == "-o") {
                std::fs::write(&spec.args[pos + 1], "/* c */").unwrap();
            }
        }
        CommandOutput::success()
    }));
    let mut ctx = context(tmp.path(), &dir, runner.clone())
        .await
        .with_options(secure_options())
        .with_platform(TargetPlatform::Linux);
    let backend = FakeBackend::default();

    let err = Pipeline::new()
        .with_module(SecurityModule::new().with_toolchain(Toolchain::Zig("zig-cc".into())))
        .run(&mut ctx, &backend)
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 2);
    assert_eq!(runner.count_matching(|s| s.program == Path::new("zig-cc")), 1);
    assert_eq!(runner.count_matching(|s| s.has_arg(FALLBACK_SCRIPT)), 1);
    assert!(backend.builds().is_empty());
    assert_eq!(ctx.script, dir.join("app.py"));
}

#[tokio::test]
async fn portable_toolchain_failure_recovers_through_fallback() {
    let tmp = TempDir::new().unwrap();
    let dir = project(tmp.path(), r#"{"title": "Demo"}"#);
    install_loader(tmp.path());
    let runner = Arc::new(RecordingRunner::new(|spec: &CommandSpec| {
        if spec.program == Path::new("zig-cc") {
            return CommandOutput::failure(1, "zig: unsupported target");
        }
        if spec.has_arg(CONFIG_QUERY) {
            return CommandOutput::success().with_stdout(
                r#"{"include": "/py/include", "libdir": "/py/lib", "version": "311", "base_prefix": "/py"}"#,
            );
        }
        if spec.has_arg("cython") {
            if let Some(pos) = spec.args.iter().position(|a| a == "-o") {
                std::fs::write(&spec.args[pos + 1], "/* c */").unwrap();
            }
        }
        setuptools_responder(spec)
    }));
    let mut ctx = context(tmp.path(), &dir, runner.clone())
        .await
        .with_options(secure_options());
    let backend = frozen_layout();
    let mut module = SecurityModule::new().with_toolchain(Toolchain::Zig("zig-cc".into()));

    module.prepare(&mut ctx).await.unwrap();
    module.run_build(&mut ctx, &backend).await.unwrap();

    assert_eq!(module.stage(), SecureStage::Done);
    assert_eq!(runner.count_matching(|s| s.program == Path::new("zig-cc")), 1);
    assert_eq!(runner.count_matching(|s| s.has_arg(FALLBACK_SCRIPT)), 1);
    assert_eq!(
        module.compiled_module().and_then(|p| p.file_name()),
        Some(std::ffi::OsStr::new("app.so"))
    );
    let dist = dir.join("dist").join("Demo");
    assert_eq!(std::fs::read_to_string(dist.join("Demo")).unwrap(), "loader");
    assert!(dist.join("app.so").is_file());
}

#[tokio::test]
async fn unwritable_bootstrap_names_its_stage() {
    let tmp = TempDir::new().unwrap();
    let dir = project(tmp.path(), "{}");
    let runner = Arc::new(RecordingRunner::new(|spec: &CommandSpec| {
        if spec.has_arg(FALLBACK_SCRIPT) {
            if let Some(cwd) = &spec.cwd {
                std::fs::create_dir_all(cwd.join(BOOTSTRAP_FILE)).unwrap();
            }
        }
        setuptools_responder(spec)
    }));
    let mut ctx = context(tmp.path(), &dir, runner)
        .await
        .with_options(secure_options());

    let err = SecurityModule::new()
        .with_toolchain(Toolchain::Default)
        .prepare(&mut ctx)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeskpackError::Hardening {
            stage: SecureStage::BootstrapGenerated,
            ..
        }
    ));
}
