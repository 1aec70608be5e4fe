use crate::build::platform::host_arch;
use crate::build::TargetPlatform;
use crate::utils::{CommandRunner, CommandSpec};
use std::fmt;
use std::path::{Path, PathBuf};

const ZIGLANG_QUERY: &str = "import os, ziglang; print(os.path.dirname(os.path.abspath(ziglang.__file__)))";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toolchain {
    Zig(PathBuf),
    Default,
}

impl Toolchain {
    /// Finds the portable toolchain
    pub async fn probe(runner: &dyn CommandRunner, python: &Path, platform: TargetPlatform) -> Self {
        if let Ok(zig) = which::which("zig") {
            log::info!("Using zig from PATH: {}", zig.display());
            return Toolchain::Zig(zig);
        }

        let query = CommandSpec::new(python).args(["-c", ZIGLANG_QUERY]);
        let package_dir = match runner.run(&query).await {
            Ok(output) if output.is_success() && !output.stdout.trim().is_empty() => {
                PathBuf::from(output.stdout.trim())
            }
            _ => {
                log::warn!("zig not found, falling back to the default C compiler");
                return Toolchain::Default;
            }
        };

        match zig_candidates(&package_dir, platform)
            .into_iter()
            .find(|p| p.is_file())
        {
            Some(zig) => {
                log::info!("Using zig from ziglang package: {}", zig.display());
                Toolchain::Zig(zig)
            }
            None => {
                log::warn!("ziglang package has no zig binary, falling back to the default C compiler");
                Toolchain::Default
            }
        }
    }

    pub fn is_portable(&self) -> bool {
        matches!(self, Toolchain::Zig(_))
    }
}

impl fmt::Display for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Toolchain::Zig(path) => write!(f, "zig ({})", path.display()),
            Toolchain::Default => f.write_str("default C compiler"),
        }
    }
}

pub fn zig_candidates(ziglang_dir: &Path, platform: TargetPlatform) -> Vec<PathBuf> {
    let exe = platform.exe_name("zig");
    let mut candidates = vec![ziglang_dir.join(&exe), ziglang_dir.join("bin").join(&exe)];
    if let Some(parent) = ziglang_dir.parent() {
        candidates.push(parent.join("bin").join(&exe));
    }
    candidates
}

pub fn zig_target(platform: TargetPlatform) -> String {
    let mut target = format!("{}-{}", host_arch(), platform.zig_os());
    if platform == TargetPlatform::Linux {
        target.push_str("-gnu");
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_cover_package_and_sibling_bin() {
        let candidates = zig_candidates(Path::new("/site/ziglang"), TargetPlatform::Windows);
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/site/ziglang/zig.exe"),
                PathBuf::from("/site/ziglang/bin/zig.exe"),
                PathBuf::from("/site/bin/zig.exe"),
            ]
        );
    }

    #[test]
    fn linux_target_uses_gnu_abi() {
        assert!(zig_target(TargetPlatform::Linux).ends_with("-linux-gnu"));
        assert!(zig_target(TargetPlatform::Windows).ends_with("-windows"));
    }
}
