use crate::build::{sanitize_out_name, BuildContext, DataPair, Settings, TargetPlatform};
use crate::plugin::manifest::Plugin;
use crate::result::{DeskpackError, Result};
use crate::utils::process::{run_checked, CommandRunner, CommandSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const DRIVER_FILE: &str = "package_hook_driver.py";

/// Python driver that loads one plugin against a build-time app and calls `on_package`
pub const DRIVER_SOURCE: &str = r#"import importlib
import json
import logging
import os
import sys


class BuildStore:
    def __init__(self):
        self._values = {}

    def get(self, key, default=None):
        return self._values.get(key, default)

    def set(self, key, value):
        self._values[key] = value

    def delete(self, key):
        self._values.pop(key, None)

    def to_dict(self):
        return dict(self._values)


class PackageApp:
    def __init__(self, config, app_root, name):
        self.config = config
        self.app_root = app_root
        self.storage_path = os.path.join(app_root, "build", "storage")
        self.logger = logging.getLogger("plugin." + name)
        self.state = BuildStore()
        self.storage = BuildStore()

    def expose(self, func=None, name=None, secure=False):
        return func

    def broadcast(self, *args, **kwargs):
        return None

    def publish(self, *args, **kwargs):
        return None

    def on_exit(self, func):
        return func


def main():
    plugin_dir, name, module_name, object_name, app_root, in_path, out_path = sys.argv[1:8]
    with open(in_path, encoding="utf-8") as f:
        context = json.load(f)

    sys.path.insert(0, plugin_dir)
    app = PackageApp(context.get("settings", {}), app_root, name)
    target = getattr(importlib.import_module(module_name), object_name)
    instance = target(app)
    if isinstance(target, type) and hasattr(instance, "setup"):
        instance.setup()

    hook = getattr(instance, "on_package", None)
    if callable(hook):
        hook(context)

    with open(out_path, "w", encoding="utf-8") as f:
        json.dump(context, f)


if __name__ == "__main__":
    main()
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageHookContext {
    pub add_data: Vec<String>,
    pub hidden_imports: Vec<String>,
    pub binaries: Vec<String>,
    pub extra_args: Vec<String>,
    pub script: String,
    pub out_name: String,
    pub settings: Settings,
    pub package_dir: String,
    pub app_icon: Option<String>,
}

impl PackageHookContext {
    pub fn from_context(ctx: &BuildContext) -> Self {
        Self {
            add_data: render_pairs(&ctx.add_data, ctx.platform),
            hidden_imports: ctx.hidden_imports.to_vec(),
            binaries: render_pairs(&ctx.binaries, ctx.platform),
            extra_args: ctx.extra_args.to_vec(),
            script: ctx.script.display().to_string(),
            out_name: ctx.out_name.clone(),
            settings: ctx.settings.clone(),
            package_dir: ctx.runtime.package_dir.display().to_string(),
            app_icon: ctx.app_icon.as_ref().map(|p| p.display().to_string()),
        }
    }

    /// Writes the hook results back into `ctx`
    pub fn apply_to(&self, ctx: &mut BuildContext, baseline: &PackageHookContext) -> usize {
        let mut restored = 0;

        restored += dropped(&baseline.add_data, &self.add_data);
        for entry in added(&baseline.add_data, &self.add_data) {
            match DataPair::parse(entry) {
                Ok(pair) => ctx.add_data.push(pair),
                Err(e) => log::warn!("plugin: ignoring add_data entry '{}': {}", entry, e),
            }
        }

        restored += dropped(&baseline.binaries, &self.binaries);
        for entry in added(&baseline.binaries, &self.binaries) {
            match DataPair::parse(entry) {
                Ok(pair) => ctx.binaries.push(pair),
                Err(e) => log::warn!("plugin: ignoring binaries entry '{}': {}", entry, e),
            }
        }

        restored += dropped(&baseline.hidden_imports, &self.hidden_imports);
        for entry in added(&baseline.hidden_imports, &self.hidden_imports) {
            ctx.hidden_imports.push_unique(entry.clone());
        }

        restored += dropped(&baseline.extra_args, &self.extra_args);
        ctx.extra_args
            .extend(added(&baseline.extra_args, &self.extra_args).cloned());

        if !self.out_name.trim().is_empty() {
            ctx.out_name = self.out_name.clone();
        }
        ctx.app_icon = self.app_icon.as_ref().map(PathBuf::from);
        ctx.settings = self.settings.clone();

        restored
    }
}

fn render_pairs(pairs: &[DataPair], platform: TargetPlatform) -> Vec<String> {
    pairs.iter().map(|p| p.render(platform)).collect()
}

fn added<'a>(before: &'a [String], after: &'a [String]) -> impl Iterator<Item = &'a String> {
    after.iter().filter(move |e| !before.contains(e))
}

fn dropped(before: &[String], after: &[String]) -> usize {
    before.iter().filter(|e| !after.contains(e)).count()
}

/// Manifest names may carry separators; exchange files stay inside the work dir.
fn hook_file_stem(name: &str) -> String {
    let stem = sanitize_out_name(name);
    if stem.is_empty() {
        "plugin".to_string()
    } else {
        stem
    }
}

pub struct PythonHookRunner<'a> {
    runner: &'a dyn CommandRunner,
    python: &'a Path,
    work_dir: PathBuf,
}

impl<'a> PythonHookRunner<'a> {
    pub async fn prepare(runner: &'a dyn CommandRunner, python: &'a Path, work_dir: &Path) -> Result<Self> {
        fs::create_dir_all(work_dir).await?;
        fs::write(work_dir.join(DRIVER_FILE), DRIVER_SOURCE).await?;
        Ok(Self {
            runner,
            python,
            work_dir: work_dir.to_path_buf(),
        })
    }

    pub async fn invoke(
        &self,
        plugin: &Plugin,
        context: &PackageHookContext,
        app_root: &Path,
    ) -> Result<PackageHookContext> {
        let (module, object) = plugin.entry_parts()?;
        let stem = hook_file_stem(plugin.name());
        let input = self.work_dir.join(format!("{}.in.json", stem));
        let output = self.work_dir.join(format!("{}.out.json", stem));
        fs::write(&input, serde_json::to_string(context)?).await?;
        if output.exists() {
            fs::remove_file(&output).await?;
        }

        let spec = CommandSpec::new(self.python).args([
            self.work_dir.join(DRIVER_FILE).display().to_string(),
            plugin.directory.display().to_string(),
            plugin.name().to_string(),
            module.to_string(),
            object.to_string(),
            app_root.display().to_string(),
            input.display().to_string(),
            output.display().to_string(),
        ]);
        log::info!("Invoking on_package hook for '{}'", plugin.name());
        run_checked(self.runner, &spec).await?;

        let content = fs::read_to_string(&output).await.map_err(|e| {
            DeskpackError::process(format!("Plugin '{}' produced no hook result: {}", plugin.name(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}
