use crate::result::Result;
use crate::utils::fs::{dotted_extension, prune_empty_dirs};
use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const BUNDLE_NAME: &str = "app.bundle";
const BASE_LIBRARY: &str = "base_library.zip";

/// Files that must stay on disk; a package containing any of them is never fused.
const PHYSICAL_EXTENSIONS: &[&str] = &[
    ".pyd", ".so", ".dll", ".lib", ".pem", ".onnx", ".prototxt", ".bin", ".pb",
];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FuseReport {
    pub preserved: BTreeSet<String>,
    pub fused: usize,
    pub bundle: Option<PathBuf>,
}

pub fn preserved_packages(internal: &Path) -> BTreeSet<String> {
    WalkDir::new(internal)
        .min_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_physical(e.path()))
        .filter_map(|e| top_level(internal, e.path()))
        .collect()
}

fn is_physical(path: &Path) -> bool {
    dotted_extension(path).is_some_and(|ext| PHYSICAL_EXTENSIONS.contains(&ext.as_str()))
}

fn top_level(internal: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(internal)
        .ok()?
        .components()
        .next()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
}

fn archive_name(internal: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(internal).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/** Fuses loose Python modules of `<root>/_internal` into `<root>/app.bundle`
 *
 * # Process Flow
 * 1. Compute the preserved package set before anything is written
 * 2. Copy every entry of `base_library.zip` into the bundle
 * 3. Add `.py`/`.pyc` files outside preserved packages (stored, uncompressed)
 * 4. Delete the fused files and prune empty directories
 */
pub fn fuse_library(root: &Path) -> Result<FuseReport> {
    let internal = root.join("_internal");
    if !internal.is_dir() {
        log::info!("No _internal directory in {}, skipping fusion", root.display());
        return Ok(FuseReport::default());
    }

    let preserved = preserved_packages(&internal);
    if !preserved.is_empty() {
        log::info!(
            "Preserving physical packages: {}",
            preserved.iter().cloned().collect::<Vec<_>>().join(", ")
        );
    }

    let bundle_path = root.join(BUNDLE_NAME);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut writer = ZipWriter::new(File::create(&bundle_path)?);
    let mut written: HashSet<String> = HashSet::new();
    let mut to_remove: Vec<PathBuf> = Vec::new();

    let base_zip = internal.join(BASE_LIBRARY);
    if base_zip.is_file() {
        let mut archive = ZipArchive::new(File::open(&base_zip)?)?;
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            if written.insert(name.clone()) {
                writer.start_file(name, options)?;
                writer.write_all(&buf)?;
            }
        }
        to_remove.push(base_zip.clone());
    }

    for entry in WalkDir::new(&internal)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() != 1
                || !e.file_type().is_dir()
                || !preserved.contains(e.file_name().to_string_lossy().as_ref())
        })
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || path == base_zip {
            continue;
        }
        let is_module = matches!(dotted_extension(path).as_deref(), Some(".py") | Some(".pyc"));
        if !is_module {
            continue;
        }

        let Some(name) = archive_name(&internal, path) else {
            continue;
        };
        if written.insert(name.clone()) {
            writer.start_file(name, options)?;
            writer.write_all(&fs::read(path)?)?;
        }
        to_remove.push(path.to_path_buf());
    }

    writer.finish()?;

    for path in &to_remove {
        if let Err(e) = fs::remove_file(path) {
            log::warn!("Could not remove fused file {}: {}", path.display(), e);
        }
    }
    prune_empty_dirs(&internal);

    let fused = to_remove.len();
    println!("Fused {} modules into {}", fused, BUNDLE_NAME);
    Ok(FuseReport {
        preserved,
        fused,
        bundle: Some(bundle_path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel.as_bytes()).unwrap();
    }

    fn bundle_names(bundle: &Path) -> Vec<String> {
        let mut archive = ZipArchive::new(File::open(bundle).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn preservation_set_names_top_level_packages() {
        let tmp = TempDir::new().unwrap();
        let internal = tmp.path();
        touch(internal, "numpy/core/_multiarray.so");
        touch(internal, "certifi/cacert.pem");
        touch(internal, "requests/api.pyc");
        touch(internal, "python312.dll");

        let preserved = preserved_packages(internal);
        assert_eq!(
            preserved.into_iter().collect::<Vec<_>>(),
            vec!["certifi".to_string(), "numpy".to_string()]
        );
    }

    #[test]
    fn preserved_packages_never_enter_the_bundle() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "_internal/numpy/__init__.pyc");
        touch(root, "_internal/numpy/core/_multiarray.so");
        touch(root, "_internal/requests/__init__.pyc");
        touch(root, "_internal/requests/api.py");
        touch(root, "_internal/top.pyc");
        touch(root, "_internal/data/readme.txt");

        let report = fuse_library(root).unwrap();
        let names = bundle_names(&root.join(BUNDLE_NAME));

        assert!(report.preserved.contains("numpy"));
        assert!(names.iter().all(|n| !n.starts_with("numpy/")));
        assert!(names.contains(&"requests/__init__.pyc".to_string()));
        assert!(names.contains(&"requests/api.py".to_string()));
        assert!(names.contains(&"top.pyc".to_string()));
        assert_eq!(report.fused, 3);

        assert!(root.join("_internal/numpy/__init__.pyc").exists());
        assert!(!root.join("_internal/requests").exists());
        assert!(root.join("_internal/data/readme.txt").exists());
    }

    #[test]
    fn base_library_is_merged_and_removed() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("_internal")).unwrap();
        {
            let file = File::create(root.join("_internal").join(BASE_LIBRARY)).unwrap();
            let mut zip = ZipWriter::new(file);
            zip.start_file("os.pyc", SimpleFileOptions::default()).unwrap();
            zip.write_all(b"os").unwrap();
            zip.finish().unwrap();
        }

        fuse_library(root).unwrap();

        assert_eq!(bundle_names(&root.join(BUNDLE_NAME)), vec!["os.pyc".to_string()]);
        assert!(!root.join("_internal").join(BASE_LIBRARY).exists());
    }

    #[test]
    fn missing_internal_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let report = fuse_library(tmp.path()).unwrap();
        assert_eq!(report, FuseReport::default());
        assert!(!tmp.path().join(BUNDLE_NAME).exists());
    }
}
