use std::fmt;

/// Operating system the distribution is built for.
///
/// The freeze backend cannot cross-compile, so this is the host platform
/// outside of tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetPlatform {
    Windows,
    MacOs,
    Linux,
}

impl TargetPlatform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            TargetPlatform::Windows
        } else if cfg!(target_os = "macos") {
            TargetPlatform::MacOs
        } else {
            TargetPlatform::Linux
        }
    }

    pub fn path_separator(self) -> char {
        match self {
            TargetPlatform::Windows => ';',
            _ => ':',
        }
    }

    pub fn exe_suffix(self) -> &'static str {
        match self {
            TargetPlatform::Windows => ".exe",
            _ => "",
        }
    }

    pub fn exe_name(self, stem: &str) -> String {
        format!("{}{}", stem, self.exe_suffix())
    }

    pub fn extension_suffix(self) -> &'static str {
        match self {
            TargetPlatform::Windows => ".pyd",
            _ => ".so",
        }
    }

    pub fn webview_library(self, arch: &str) -> String {
        match self {
            TargetPlatform::Windows => "webview.dll".to_string(),
            TargetPlatform::Linux => "libwebview.so".to_string(),
            TargetPlatform::MacOs if arch == "aarch64" => "libwebview_arm64.dylib".to_string(),
            TargetPlatform::MacOs => "libwebview_x64.dylib".to_string(),
        }
    }

    pub fn zig_os(self) -> &'static str {
        match self {
            TargetPlatform::Windows => "windows",
            TargetPlatform::MacOs => "macos",
            TargetPlatform::Linux => "linux",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetPlatform::Windows => "windows",
            TargetPlatform::MacOs => "macos",
            TargetPlatform::Linux => "linux",
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x86_64",
        "aarch64" => "aarch64",
        _ => "x86",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_naming() {
        let p = TargetPlatform::Windows;
        assert_eq!(p.path_separator(), ';');
        assert_eq!(p.exe_name("App"), "App.exe");
        assert_eq!(p.extension_suffix(), ".pyd");
    }

    #[test]
    fn unix_naming() {
        let p = TargetPlatform::Linux;
        assert_eq!(p.path_separator(), ':');
        assert_eq!(p.exe_name("App"), "App");
        assert_eq!(p.webview_library("x86_64"), "libwebview.so");
        assert_eq!(
            TargetPlatform::MacOs.webview_library("aarch64"),
            "libwebview_arm64.dylib"
        );
    }
}
