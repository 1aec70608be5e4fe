use crate::build::ProjectConfig;
use crate::plugin::{create_plugin, list_plugins, uninstall_plugin, PluginInstaller, PLUGINS_DIR};
use crate::result::Result;
use std::path::PathBuf;

fn plugins_dir() -> Result<PathBuf> {
    Ok(std::env::current_dir()?.join(PLUGINS_DIR))
}

pub async fn install(identifier: &str) -> Result<()> {
    let dir = plugins_dir()?;
    println!("Installing plugin {}...", identifier);
    let installed = PluginInstaller::new().install(identifier, &dir).await?;
    println!("Plugin installed to {}", installed.display());
    Ok(())
}

pub async fn list() -> Result<()> {
    let dir = plugins_dir()?;
    let listings = list_plugins(&dir)?;
    if listings.is_empty() {
        println!("No plugins installed in {}", dir.display());
        return Ok(());
    }

    println!("Installed plugins:");
    for listing in listings {
        println!("{}", listing);
    }
    Ok(())
}

pub async fn uninstall(name: &str) -> Result<()> {
    uninstall_plugin(&plugins_dir()?, name).await?;
    println!("Plugin '{}' removed", name);
    Ok(())
}

pub async fn create(name: &str) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = ProjectConfig::discover(&[cwd.as_path()]).await?;
    let target = create_plugin(&cwd, name, &config.runtime.package).await?;

    println!("Plugin '{}' created at {}", name, target.display());
    println!(" - manifest.json");
    println!(" - main.py");
    println!(" - {}_widget.js", name);
    Ok(())
}
