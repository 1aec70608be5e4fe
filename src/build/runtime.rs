use crate::build::platform::{host_arch, TargetPlatform};
use std::path::PathBuf;

pub const DEPENDENCY_DIR: &str = "dependancies";
pub const LOADER_NAME: &str = "pytron_rust_bootloader";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeLayout {
    pub package_dir: PathBuf,
    pub package_name: String,
}

impl RuntimeLayout {
    pub fn new(package_dir: impl Into<PathBuf>, package_name: impl Into<String>) -> Self {
        Self {
            package_dir: package_dir.into(),
            package_name: package_name.into(),
        }
    }

    pub fn package_root(&self) -> PathBuf {
        self.package_dir.join(&self.package_name)
    }

    pub fn dependency_dest(&self) -> String {
        format!("{}/{}", self.package_name, DEPENDENCY_DIR)
    }

    pub fn dependencies_dir(&self) -> PathBuf {
        self.package_root().join(DEPENDENCY_DIR)
    }

    pub fn webview_library(&self, platform: TargetPlatform) -> PathBuf {
        self.dependencies_dir()
            .join(platform.webview_library(host_arch()))
    }

    pub fn default_icon(&self) -> PathBuf {
        self.package_root().join("installer").join(format!("{}.ico", self.package_name))
    }

    pub fn installer_template(&self) -> PathBuf {
        self.package_root().join("installer").join("Installation.nsi")
    }

    pub fn bundled_nsis_setup(&self) -> PathBuf {
        self.package_root().join("nsis-setup.exe")
    }

    pub fn utf8_hook(&self) -> PathBuf {
        self.package_root().join("utf8_hook.py")
    }

    pub fn chrome_shell(&self) -> PathBuf {
        self.package_root().join("engines").join("chrome").join("shell")
    }

    pub fn chrome_shell_dest(&self) -> String {
        format!("{}/engines/chrome/shell", self.package_name)
    }

    pub fn chrome_engine_dest(&self) -> String {
        format!("{}/{}/chrome", self.package_name, DEPENDENCY_DIR)
    }

    pub fn rcedit(&self) -> PathBuf {
        self.dependencies_dir().join("rcedit-x64.exe")
    }

    pub fn loader_binary(&self, platform: TargetPlatform) -> PathBuf {
        self.package_root()
            .join("pack")
            .join("secure_loader")
            .join("bin")
            .join(platform.exe_name(LOADER_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_package_root() {
        let layout = RuntimeLayout::new("/site", "pytron");
        assert_eq!(layout.package_root(), PathBuf::from("/site/pytron"));
        assert_eq!(
            layout.default_icon(),
            PathBuf::from("/site/pytron/installer/pytron.ico")
        );
        assert_eq!(
            layout.loader_binary(TargetPlatform::Windows),
            PathBuf::from("/site/pytron/pack/secure_loader/bin/pytron_rust_bootloader.exe")
        );
        assert_eq!(layout.dependency_dest(), "pytron/dependancies");
        assert_eq!(
            layout.webview_library(TargetPlatform::Windows),
            PathBuf::from("/site/pytron/dependancies/webview.dll")
        );
        assert_eq!(layout.rcedit(), PathBuf::from("/site/pytron/dependancies/rcedit-x64.exe"));
    }
}
