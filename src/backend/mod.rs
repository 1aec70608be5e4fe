pub mod pyinstaller;

pub use pyinstaller::{cleanup_dist, PyInstaller};

use crate::build::BuildContext;
use crate::result::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// The external freeze compiler that turns the accumulated context into a distribution.
#[async_trait]
pub trait FreezeBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn build(&self, ctx: &BuildContext) -> Result<PathBuf>;
}
