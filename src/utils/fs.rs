use crate::result::{DeskpackError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug)]
pub struct CopyFailure {
    pub path: PathBuf,
    pub error: std::io::Error,
}

/// Recursively copies `src` into `dst`
pub fn copy_tree(src: &Path, dst: &Path) -> Result<Vec<CopyFailure>> {
    let mut failures = Vec::new();
    fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            DeskpackError::process(format!("Failed to walk {}: {}", src.display(), e))
        })?;
        let relative = match entry.path().strip_prefix(src) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if let Err(error) = copy_file(entry.path(), &target) {
            failures.push(CopyFailure {
                path: entry.path().to_path_buf(),
                error,
            });
        }
    }

    Ok(failures)
}

fn copy_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)?;
    Ok(())
}

pub fn prune_empty_dirs(root: &Path) -> usize {
    let mut removed = 0;
    for entry in WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_dir() {
            continue;
        }
        let is_empty = fs::read_dir(entry.path())
            .map(|mut it| it.next().is_none())
            .unwrap_or(false);
        if is_empty && fs::remove_dir(entry.path()).is_ok() {
            removed += 1;
        }
    }
    removed
}

pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    Ok(())
}

#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

pub fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn copy_tree_mirrors_structure() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::write(src.join("a/b/file.txt"), "x").unwrap();
        fs::write(src.join("top.bin"), "y").unwrap();

        let dst = tmp.path().join("dst");
        let failures = copy_tree(&src, &dst).unwrap();

        assert!(failures.is_empty());
        assert_eq!(fs::read_to_string(dst.join("a/b/file.txt")).unwrap(), "x");
        assert!(dst.join("top.bin").is_file());
    }

    #[test]
    fn prune_keeps_non_empty_dirs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("empty/nested")).unwrap();
        fs::create_dir_all(root.join("full")).unwrap();
        fs::write(root.join("full/f"), "").unwrap();

        let removed = prune_empty_dirs(root);

        assert_eq!(removed, 2);
        assert!(!root.join("empty").exists());
        assert!(root.join("full/f").exists());
    }
}
