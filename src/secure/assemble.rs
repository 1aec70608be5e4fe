use crate::result::{DeskpackError, Result};
use crate::utils::fs::{copy_tree, remove_dir_if_exists};
use std::fs;
use std::path::{Path, PathBuf};

/// Hidden sibling of the final distribution that hardening works in
#[derive(Debug)]
pub struct Staging {
    pub dir: PathBuf,
    pub final_dir: PathBuf,
}

impl Staging {
    pub fn for_final(final_dir: &Path) -> Result<Self> {
        let name = final_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                DeskpackError::config(format!("Invalid output directory: {}", final_dir.display()))
            })?;
        let parent = final_dir.parent().unwrap_or_else(|| Path::new("."));

        Ok(Self {
            dir: parent.join(format!(".{}.staging", name)),
            final_dir: final_dir.to_path_buf(),
        })
    }

    fn backup_dir(&self) -> PathBuf {
        let mut name = self.final_dir.as_os_str().to_owned();
        name.push(".old");
        PathBuf::from(name)
    }

    pub fn populate(&self, base_dist: &Path) -> Result<usize> {
        if !base_dist.is_dir() {
            return Err(DeskpackError::not_found(format!(
                "Base distribution missing: {}",
                base_dist.display()
            )));
        }

        remove_dir_if_exists(&self.dir)?;
        let failures = copy_tree(base_dist, &self.dir)?;
        for failure in &failures {
            log::warn!(
                "Could not copy {}: {}",
                failure.path.display(),
                failure.error
            );
            eprintln!("Warning: Could not copy {}", failure.path.display());
        }
        Ok(failures.len())
    }

    /** Swaps the staged tree into the final location
     *
     * An existing final directory is renamed aside first and restored if the
     * staged tree cannot be moved in, so the final path always holds either
     * the complete old tree or the complete new one.
     */
    pub fn commit(self) -> Result<PathBuf> {
        let backup = self.backup_dir();
        remove_dir_if_exists(&backup)?;

        let had_previous = self.final_dir.exists();
        if had_previous {
            fs::rename(&self.final_dir, &backup).map_err(|e| {
                DeskpackError::process(format!(
                    "Could not move previous distribution {} aside (files may be locked): {}",
                    self.final_dir.display(),
                    e
                ))
            })?;
        }

        if let Err(e) = fs::rename(&self.dir, &self.final_dir) {
            if had_previous {
                if let Err(restore) = fs::rename(&backup, &self.final_dir) {
                    log::error!(
                        "Failed to restore {} from {}: {}",
                        self.final_dir.display(),
                        backup.display(),
                        restore
                    );
                }
            }
            return Err(DeskpackError::process(format!(
                "Could not move assembled distribution into {}: {}",
                self.final_dir.display(),
                e
            )));
        }

        if had_previous {
            if let Err(e) = fs::remove_dir_all(&backup) {
                log::warn!("Could not remove {}: {}", backup.display(), e);
            }
        }

        Ok(self.final_dir)
    }

    pub fn discard(self) {
        if let Err(e) = remove_dir_if_exists(&self.dir) {
            log::warn!("Could not remove staging dir {}: {}", self.dir.display(), e);
        }
    }
}

pub fn ensure_root_module(root: &Path, file_name: &str) -> Result<bool> {
    let at_root = root.join(file_name);
    if at_root.exists() {
        return Ok(true);
    }

    let nested = root.join("_internal").join(file_name);
    if nested.is_file() {
        fs::copy(&nested, &at_root)?;
        return Ok(true);
    }

    log::warn!("Compiled module {} not found in distribution", file_name);
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree(root: &Path, files: &[(&str, &str)]) {
        for (rel, content) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
    }

    #[test]
    fn commit_replaces_previous_tree_entirely() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("App_base");
        let final_dir = tmp.path().join("App");
        tree(&base, &[("new.txt", "new"), ("_internal/lib.so", "x")]);
        tree(&final_dir, &[("old.txt", "old")]);

        let staging = Staging::for_final(&final_dir).unwrap();
        assert_eq!(staging.populate(&base).unwrap(), 0);
        assert!(final_dir.join("old.txt").exists());

        staging.commit().unwrap();

        assert!(final_dir.join("new.txt").exists());
        assert!(final_dir.join("_internal/lib.so").exists());
        assert!(!final_dir.join("old.txt").exists());
        assert!(!tmp.path().join(".App.staging").exists());
        assert!(!tmp.path().join("App.old").exists());
    }

    #[test]
    fn failed_commit_keeps_previous_tree() {
        let tmp = TempDir::new().unwrap();
        let final_dir = tmp.path().join("App");
        tree(&final_dir, &[("old.txt", "old")]);

        // Nothing was staged, so moving the staging dir in fails.
        let staging = Staging::for_final(&final_dir).unwrap();
        assert!(staging.commit().is_err());

        assert_eq!(fs::read_to_string(final_dir.join("old.txt")).unwrap(), "old");
        assert!(!tmp.path().join("App.old").exists());
    }

    #[test]
    fn discard_leaves_final_untouched() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("App_base");
        let final_dir = tmp.path().join("App");
        tree(&base, &[("new.txt", "new")]);
        tree(&final_dir, &[("old.txt", "old")]);

        let staging = Staging::for_final(&final_dir).unwrap();
        staging.populate(&base).unwrap();
        staging.discard();

        assert!(final_dir.join("old.txt").exists());
        assert!(!final_dir.join("new.txt").exists());
    }

    #[test]
    fn module_is_lifted_from_internal() {
        let tmp = TempDir::new().unwrap();
        tree(tmp.path(), &[("_internal/app.so", "elf")]);

        assert!(ensure_root_module(tmp.path(), "app.so").unwrap());
        assert!(tmp.path().join("app.so").is_file());
        assert!(!ensure_root_module(tmp.path(), "app.pyd").unwrap());
    }
}
