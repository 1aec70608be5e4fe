use crate::build::platform::host_arch;
use crate::build::runtime::DEPENDENCY_DIR;
use crate::build::TargetPlatform;
use crate::result::Result;
use crate::secure::transform::ENTRY_MODULE;
use std::fs;
use std::path::{Path, PathBuf};

pub fn is_python_runtime(name: &str, platform: TargetPlatform) -> bool {
    let lower = name.to_ascii_lowercase();
    match platform {
        TargetPlatform::Windows => {
            lower.starts_with("python3") && lower.ends_with(".dll") && lower.len() > "python3.dll".len()
        }
        TargetPlatform::Linux => lower.starts_with("libpython3") && lower.contains(".so"),
        TargetPlatform::MacOs => lower.starts_with("libpython3") && lower.ends_with(".dylib"),
    }
}

/// Copies the files the native loader opens from its own directory to the top level
pub fn promote_runtimes(
    root: &Path,
    framework_package: &str,
    platform: TargetPlatform,
) -> Result<Vec<String>> {
    let internal = root.join("_internal");
    let search_dirs = [
        internal.clone(),
        internal.join(framework_package).join(DEPENDENCY_DIR),
    ];

    let module = format!("{}{}", ENTRY_MODULE, platform.extension_suffix());
    let webview = platform.webview_library(host_arch());
    let mut promoted = Vec::new();

    for dir in search_dirs.iter().filter(|d| d.is_dir()) {
        for path in read_files(dir)? {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let wanted =
                name == module || name == webview || is_python_runtime(&name, platform);
            if !wanted {
                continue;
            }

            let target = root.join(&name);
            if target.exists() {
                continue;
            }
            fs::copy(&path, &target)?;
            log::info!("Promoted runtime: {}", name);
            promoted.push(name);
        }
    }

    Ok(promoted)
}

fn read_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    #[test]
    fn runtime_names_per_platform() {
        assert!(is_python_runtime("python312.dll", TargetPlatform::Windows));
        assert!(!is_python_runtime("python3.dll", TargetPlatform::Windows));
        assert!(is_python_runtime("libpython3.11.so.1.0", TargetPlatform::Linux));
        assert!(is_python_runtime("libpython3.12.dylib", TargetPlatform::MacOs));
        assert!(!is_python_runtime("libssl.so.3", TargetPlatform::Linux));
    }

    #[test]
    fn promotes_from_internal_and_dependency_folder() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "_internal/python312.dll");
        touch(root, "_internal/app.pyd");
        touch(root, "_internal/pytron/dependancies/webview.dll");
        touch(root, "_internal/vcruntime140.dll");

        let promoted = promote_runtimes(root, "pytron", TargetPlatform::Windows).unwrap();

        assert_eq!(promoted, vec!["app.pyd", "python312.dll", "webview.dll"]);
        assert!(root.join("webview.dll").is_file());
        assert!(!root.join("vcruntime140.dll").exists());
    }

    #[test]
    fn existing_top_level_files_are_kept() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "_internal/app.so");
        fs::write(root.join("app.so"), "top").unwrap();

        let promoted = promote_runtimes(root, "pytron", TargetPlatform::Linux).unwrap();

        assert!(promoted.is_empty());
        assert_eq!(fs::read_to_string(root.join("app.so")).unwrap(), "top");
    }
}
