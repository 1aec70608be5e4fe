use crate::build::TargetPlatform;
use crate::result::{DeskpackError, Result};
use crate::secure::SecureStage;
use crate::utils::fs::make_executable;
use std::fs;
use std::path::{Path, PathBuf};

/// Replaces the frozen entry executable with the precompiled native loader
pub fn deploy_loader(
    root: &Path,
    loader: &Path,
    out_name: &str,
    platform: TargetPlatform,
) -> Result<PathBuf> {
    if !loader.is_file() {
        return Err(DeskpackError::hardening(
            SecureStage::LoaderDeployed,
            format!("Native loader not found: {}", loader.display()),
        ));
    }

    let target = root.join(platform.exe_name(out_name));
    fs::copy(loader, &target)?;
    if platform != TargetPlatform::Windows {
        make_executable(&target)?;
    }

    let base_exe = root.join(platform.exe_name(&format!("{}_base", out_name)));
    if base_exe.exists() {
        if let Err(e) = fs::remove_file(&base_exe) {
            log::warn!("Could not remove {}: {}", base_exe.display(), e);
        }
    }

    log::info!("Deployed native loader as {}", target.display());
    Ok(target)
}
