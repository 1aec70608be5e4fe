use crate::build::BuildContext;
use crate::metadata::MetadataEditor;
use crate::pipeline::{order, BuildModule};
use crate::result::Result;
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct MetadataModule;

#[async_trait]
impl BuildModule for MetadataModule {
    fn name(&self) -> &'static str {
        "metadata"
    }

    fn order(&self) -> u32 {
        order::METADATA
    }

    async fn post_build(&mut self, ctx: &mut BuildContext) -> Result<()> {
        let editor = MetadataEditor::locate(&ctx.runtime);
        editor
            .apply(
                ctx.runner(),
                &ctx.main_executable(),
                ctx.app_icon.as_deref(),
                &ctx.settings,
                ctx.platform,
            )
            .await?;
        Ok(())
    }
}
