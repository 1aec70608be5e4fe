#![allow(dead_code)]

use async_trait::async_trait;
use deskpack::backend::{FreezeBackend, PyInstaller};
use deskpack::build::{BuildContext, RuntimeLayout, Settings, TargetPlatform, SETTINGS_FILE};
use deskpack::result::Result;
use deskpack::utils::CommandRunner;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const FRAMEWORK: &str = "pytron";

pub fn write_file(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// `project/app.py` plus `project/settings.json` with the given JSON.
pub fn project(root: &Path, settings: &str) -> PathBuf {
    let dir = root.join("project");
    write_file(
        &dir,
        "app.py",
        "from pytron import App\n\nif __name__ == \"__main__\":\n    App().run()\n",
    );
    write_file(&dir, SETTINGS_FILE, settings);
    dir
}

/// Framework install location used by every test context: `<root>/site/pytron`.
pub fn runtime(root: &Path) -> RuntimeLayout {
    RuntimeLayout::new(root.join("site"), FRAMEWORK)
}

pub async fn context(root: &Path, project: &Path, runner: Arc<dyn CommandRunner>) -> BuildContext {
    let settings = Settings::load(&project.join(SETTINGS_FILE)).await.unwrap();
    BuildContext::new(
        project.join("app.py"),
        "Demo",
        settings,
        runtime(root),
        "python",
        runner,
    )
    .with_platform(TargetPlatform::Linux)
}

/** Stand-in freeze backend
 *
 * Records the makespec arguments of every build and writes `layout`
 * (relative path, content) under the context's dist directory.
 */
#[derive(Default)]
pub struct FakeBackend {
    pub layout: Vec<(String, String)>,
    builds: Mutex<Vec<Vec<String>>>,
    names: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn with_layout(files: &[(&str, &str)]) -> Self {
        Self {
            layout: files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn builds(&self) -> Vec<Vec<String>> {
        self.builds.lock().unwrap().clone()
    }

    /// `out_name` seen by each build.
    pub fn names(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }
}

#[async_trait]
impl FreezeBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn build(&self, ctx: &BuildContext) -> Result<PathBuf> {
        self.builds
            .lock()
            .unwrap()
            .push(PyInstaller::makespec_args(ctx));
        self.names.lock().unwrap().push(ctx.out_name.clone());

        let dist = ctx.dist_dir();
        std::fs::create_dir_all(&dist)?;
        for (rel, content) in &self.layout {
            let rel = rel.replace("{name}", &ctx.out_name);
            write_file(&dist, &rel, content);
        }
        Ok(dist)
    }
}

/// Values following each `--add-data` flag, in order.
pub fn add_data_values(args: &[String]) -> Vec<String> {
    args.windows(2)
        .filter(|w| w[0] == "--add-data")
        .map(|w| w[1].clone())
        .collect()
}
