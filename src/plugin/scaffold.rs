use crate::build::{CONFIG_FILE, SETTINGS_FILE};
use crate::plugin::manifest::{Manifest, MANIFEST_FILE};
use crate::result::{DeskpackError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub fn is_project_dir(dir: &Path) -> bool {
    dir.join(SETTINGS_FILE).is_file() || dir.join(CONFIG_FILE).is_file()
}

pub fn scaffold_target(cwd: &Path, name: &str) -> PathBuf {
    if is_project_dir(cwd) {
        cwd.join("plugins").join(name)
    } else {
        cwd.join(name)
    }
}

pub fn scaffold_manifest(name: &str) -> Manifest {
    Manifest {
        name: name.to_string(),
        version: "1.0.0".to_string(),
        entry_point: format!("main:{}Plugin", capitalize(name)),
        ui_entry: Some(format!("{}_widget.js", name)),
        python_dependencies: Vec::new(),
        npm_dependencies: BTreeMap::new(),
        isolated: false,
        description: Some("Auto-generated plugin".to_string()),
    }
}

fn python_source(name: &str) -> String {
    let class = capitalize(name);
    format!(
        r#"import logging


class {class}Plugin:
    def __init__(self, app):
        self.app = app
        self.logger = logging.getLogger("plugin.{name}")

    def setup(self):
        self.app.expose(self.greet, name="{name}_greet")

        count = self.app.storage.get("load_count", 0)
        self.app.storage.set("load_count", count + 1)
        self.logger.info("Plugin loaded %d times.", count + 1)

    def greet(self, user="User"):
        return f"Hello {{user}} from {name} plugin!"

    def on_package(self, context):
        pass
"#
    )
}

fn widget_source(name: &str, bridge: &str) -> String {
    let class = capitalize(name);
    format!(
        r#"class {class}Widget extends HTMLElement {{
    constructor() {{
        super();
        this.attachShadow({{ mode: 'open' }});
    }}

    connectedCallback() {{
        this.render();
    }}

    async callGreet() {{
        const welcome = await window.{bridge}.{name}_greet("Explorer");
        alert(welcome);
    }}

    render() {{
        this.shadowRoot.innerHTML = `
            <style>
                :host {{
                    display: block;
                    padding: 1rem;
                    border-radius: 8px;
                    border: 1px solid #334155;
                }}
            </style>
            <div>
                <strong>{class} Plugin</strong>
                <button onclick="this.getRootNode().host.callGreet()">Test Bridge</button>
            </div>
        `;
    }}
}}

if (!customElements.get('{name}-widget')) {{
    customElements.define('{name}-widget', {class}Widget);
}}
"#
    )
}

pub async fn create_plugin(cwd: &Path, name: &str, bridge: &str) -> Result<PathBuf> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(DeskpackError::config(format!("Invalid plugin name '{}'", name)));
    }

    let target = scaffold_target(cwd, name);
    if target.exists() {
        return Err(DeskpackError::config(format!(
            "Plugin directory '{}' already exists",
            target.display()
        )));
    }
    fs::create_dir_all(&target).await?;

    let manifest = serde_json::to_string_pretty(&scaffold_manifest(name))?;
    fs::write(target.join(MANIFEST_FILE), manifest).await?;
    fs::write(target.join("main.py"), python_source(name)).await?;
    fs::write(
        target.join(format!("{}_widget.js", name)),
        widget_source(name, bridge),
    )
    .await?;

    log::info!("Scaffolded plugin {} at {}", name, target.display());
    Ok(target)
}
