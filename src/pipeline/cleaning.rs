use crate::build::BuildContext;
use crate::pipeline::{order, BuildModule};
use crate::result::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const METADATA_SUFFIXES: &[&str] = &[".dist-info", ".egg-info"];

#[derive(Debug, Default)]
pub struct MetadataCleaningModule;

#[async_trait]
impl BuildModule for MetadataCleaningModule {
    fn name(&self) -> &'static str {
        "metadata-cleaning"
    }

    fn order(&self) -> u32 {
        order::METADATA_CLEANING
    }

    async fn post_build(&mut self, ctx: &mut BuildContext) -> Result<()> {
        let dist = ctx.dist_dir();
        if !dist.is_dir() {
            return Ok(());
        }

        let removed = prune_metadata_dirs(&dist)?;
        if removed > 0 {
            println!("Stripped {} package metadata folders", removed);
        }
        Ok(())
    }
}

fn is_metadata_dir(name: &str) -> bool {
    METADATA_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

pub fn prune_metadata_dirs(root: &Path) -> Result<usize> {
    let targets: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir() && is_metadata_dir(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path())
        .collect();

    let mut removed = 0;
    for dir in targets {
        if !dir.exists() {
            continue;
        }
        std::fs::remove_dir_all(&dir)?;
        log::debug!("Removed {}", dir.display());
        removed += 1;
    }
    Ok(removed)
}
