use crate::build::{BuildContext, DataPair};
use crate::pipeline::{order, BuildModule};
use crate::plugin::{discover_plugins, PackageHookContext, PythonHookRunner, PLUGINS_DIR};
use crate::result::Result;
use async_trait::async_trait;

const HOOK_WORK_DIR: &str = "plugin_hooks";

/// Bundles `plugins/` and lets each plugin adjust the build
#[derive(Debug, Default)]
pub struct PluginModule {
    invoked: Vec<String>,
}

impl PluginModule {
    pub fn invoked(&self) -> &[String] {
        &self.invoked
    }
}

#[async_trait]
impl BuildModule for PluginModule {
    fn name(&self) -> &'static str {
        "plugin"
    }

    fn order(&self) -> u32 {
        order::PLUGIN
    }

    async fn prepare(&mut self, ctx: &mut BuildContext) -> Result<()> {
        self.invoked.clear();
        let plugins_dir = ctx.script_dir.join(PLUGINS_DIR);
        if !plugins_dir.is_dir() {
            return Ok(());
        }

        println!("Bundling plugins directory: {}", PLUGINS_DIR);
        ctx.add_data
            .push(DataPair::new(plugins_dir.clone(), PLUGINS_DIR));

        let plugins = discover_plugins(&plugins_dir);
        if plugins.is_empty() {
            return Ok(());
        }

        let baseline = PackageHookContext::from_context(ctx);
        let mut current = baseline.clone();
        {
            let work_dir = ctx.build_dir.join(HOOK_WORK_DIR);
            let hooks = PythonHookRunner::prepare(ctx.runner(), &ctx.python, &work_dir).await?;

            for plugin in &plugins {
                match hooks.invoke(plugin, &current, &ctx.script_dir).await {
                    Ok(updated) => {
                        current = updated;
                        self.invoked.push(plugin.name().to_string());
                    }
                    Err(e) => {
                        log::warn!("plugin: build analysis for '{}' failed: {}", plugin.name(), e);
                        eprintln!("Warning: build analysis for plugin '{}' failed: {}", plugin.name(), e);
                    }
                }

                let deps = plugin.import_names();
                if !deps.is_empty() {
                    println!("  + Auto-injecting dependencies for {}: {}", plugin.name(), deps.join(", "));
                    for dep in deps {
                        if !current.hidden_imports.contains(&dep) {
                            current.hidden_imports.push(dep);
                        }
                    }
                }
            }
        }

        let restored = current.apply_to(ctx, &baseline);
        if restored > 0 {
            log::warn!("plugin: {} directive(s) removed by plugin hooks were kept", restored);
        }
        log::info!("Build context updated by {} plugin(s)", plugins.len());
        Ok(())
    }
}
