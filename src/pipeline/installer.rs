use crate::build::BuildContext;
use crate::installer::InstallerBuilder;
use crate::pipeline::{order, BuildModule};
use crate::result::Result;
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct InstallerModule;

#[async_trait]
impl BuildModule for InstallerModule {
    fn name(&self) -> &'static str {
        "installer"
    }

    fn order(&self) -> u32 {
        order::INSTALLER
    }

    async fn post_build(&mut self, ctx: &mut BuildContext) -> Result<()> {
        if !ctx.options.build_installer {
            return Ok(());
        }

        ctx.report("Building Installer...", 90);
        InstallerBuilder::new(ctx.runner(), &ctx.runtime)
            .build(
                &ctx.out_name,
                &ctx.script_dir,
                &ctx.dist_dir(),
                ctx.app_icon.as_deref(),
                ctx.settings.version(),
            )
            .await
    }
}
