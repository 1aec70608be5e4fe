use crate::build::{BuildContext, DataPair};
use crate::icon::{platform_icon, resolve_icon};
use crate::pipeline::{order, BuildModule};
use crate::result::Result;
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct IconModule;

#[async_trait]
impl BuildModule for IconModule {
    fn name(&self) -> &'static str {
        "icon"
    }

    fn order(&self) -> u32 {
        order::ICON
    }

    async fn prepare(&mut self, ctx: &mut BuildContext) -> Result<()> {
        let Some(source) = resolve_icon(
            ctx.app_icon.as_deref(),
            &ctx.settings,
            &ctx.script_dir,
            &ctx.runtime,
        ) else {
            log::warn!("icon: no icon available, the backend default is used");
            ctx.app_icon = None;
            return Ok(());
        };

        let source = std::path::absolute(&source).unwrap_or(source);
        let icon = platform_icon(&source, &ctx.build_dir.join("icons"), &ctx.out_name, ctx.platform);

        ctx.add_data.push(DataPair::new(icon.clone(), "."));
        if icon != source {
            ctx.add_data.push(DataPair::new(source, "."));
        }
        ctx.app_icon = Some(icon);
        Ok(())
    }
}
