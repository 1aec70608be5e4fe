mod helpers;

use async_trait::async_trait;
use deskpack::build::{BuildContext, DataPair, SETTINGS_FILE};
use deskpack::pipeline::{AssetModule, BuildModule, Pipeline, PluginModule};
use deskpack::result::{DeskpackError, Result};
use deskpack::utils::RecordingRunner;
use helpers::{add_data_values, context, project, FakeBackend};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn packaged_settings_have_debug_disabled() {
    let tmp = TempDir::new().unwrap();
    let dir = project(
        tmp.path(),
        r#"{"title": "Demo", "debug": true, "width": 800}"#,
    );
    let mut ctx = context(tmp.path(), &dir, Arc::new(RecordingRunner::succeeding())).await;
    let backend = FakeBackend::default();

    Pipeline::new()
        .with_module(AssetModule)
        .run(&mut ctx, &backend)
        .await
        .unwrap();

    let embedded = dir.join("build").join("pytron_assets").join(SETTINGS_FILE);
    let packaged: Value = serde_json::from_str(&std::fs::read_to_string(&embedded).unwrap()).unwrap();
    assert_eq!(packaged["debug"], Value::Bool(false));
    assert_eq!(packaged["width"], 800);
    assert_eq!(packaged["title"], "Demo");

    let source: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.join(SETTINGS_FILE)).unwrap()).unwrap();
    assert_eq!(source["debug"], Value::Bool(true));

    let values = add_data_values(&backend.builds()[0]);
    assert_eq!(values, vec![format!("{}:.", embedded.display())]);
}

#[tokio::test]
async fn data_directives_reach_the_backend_in_order() {
    let tmp = TempDir::new().unwrap();
    let dir = project(tmp.path(), r#"{"title": "Demo"}"#);
    let mut ctx = context(tmp.path(), &dir, Arc::new(RecordingRunner::succeeding())).await;
    ctx.add_data.push(DataPair::parse("assets;assets").unwrap());
    ctx.add_data.push(DataPair::parse("docs:help").unwrap());
    helpers::write_file(&dir, "plugins/.keep", "");
    let backend = FakeBackend::default();

    Pipeline::new()
        .with_module(PluginModule::default())
        .with_module(AssetModule)
        .run(&mut ctx, &backend)
        .await
        .unwrap();

    let values = add_data_values(&backend.builds()[0]);
    let embedded = dir.join("build").join("pytron_assets").join(SETTINGS_FILE);
    assert_eq!(
        values,
        vec![
            "assets:assets".to_string(),
            "docs:help".to_string(),
            format!("{}:.", embedded.display()),
            format!("{}:plugins", dir.join("plugins").display()),
        ]
    );
}

struct Failing;

#[async_trait]
impl BuildModule for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn order(&self) -> u32 {
        5
    }

    async fn prepare(&mut self, ctx: &mut BuildContext) -> Result<()> {
        ctx.add_data.push(DataPair::new("half", "."));
        ctx.out_name = "Broken".to_string();
        Err(DeskpackError::config("refusing"))
    }
}

#[tokio::test]
async fn failed_prepare_rolls_back_and_skips_backend() {
    let tmp = TempDir::new().unwrap();
    let dir = project(tmp.path(), "{}");
    let mut ctx = context(tmp.path(), &dir, Arc::new(RecordingRunner::succeeding())).await;
    ctx.add_data.push(DataPair::new("kept", "."));
    let backend = FakeBackend::default();

    let err = Pipeline::new()
        .with_module(AssetModule)
        .with_module(Failing)
        .run(&mut ctx, &backend)
        .await
        .unwrap_err();

    assert!(matches!(err, DeskpackError::Config(_)));
    assert_eq!(ctx.out_name, "Demo");
    assert_eq!(ctx.add_data.len(), 1);
    assert!(backend.builds().is_empty());
}
