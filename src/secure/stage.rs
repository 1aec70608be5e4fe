use std::fmt;

/// Progress of the hardening chain; each build walks these in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecureStage {
    Init,
    SourceTransform,
    NativeCompile,
    BootstrapGenerated,
    DualBuild,
    Assembled,
    /// Only entered for bundled builds.
    BundleFused,
    RuntimesPromoted,
    LoaderDeployed,
    Done,
}

impl SecureStage {
    pub fn as_str(self) -> &'static str {
        match self {
            SecureStage::Init => "init",
            SecureStage::SourceTransform => "source transform",
            SecureStage::NativeCompile => "native compile",
            SecureStage::BootstrapGenerated => "bootstrap generation",
            SecureStage::DualBuild => "dual build",
            SecureStage::Assembled => "assembly",
            SecureStage::BundleFused => "bundle fusion",
            SecureStage::RuntimesPromoted => "runtime promotion",
            SecureStage::LoaderDeployed => "loader deployment",
            SecureStage::Done => "done",
        }
    }

    pub fn next(self, bundled: bool) -> Option<SecureStage> {
        use SecureStage::*;
        Some(match self {
            Init => SourceTransform,
            SourceTransform => NativeCompile,
            NativeCompile => BootstrapGenerated,
            BootstrapGenerated => DualBuild,
            DualBuild => Assembled,
            Assembled if bundled => BundleFused,
            Assembled | BundleFused => RuntimesPromoted,
            RuntimesPromoted => LoaderDeployed,
            LoaderDeployed => Done,
            Done => return None,
        })
    }
}

impl fmt::Display for SecureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
