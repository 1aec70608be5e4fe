pub mod info;
pub mod init;
pub mod package;
pub mod plugin;

use crate::cli::{PackageArgs, PluginAction};
use crate::result::Result;
use smol_str::SmolStr;

#[derive(Debug)]
pub enum CommandType {
    Package(PackageArgs),
    Init {
        name: SmolStr,
        no_frontend: bool,
    },
    PluginInstall {
        identifier: SmolStr,
    },
    PluginList,
    PluginUninstall {
        name: SmolStr,
    },
    PluginCreate {
        name: SmolStr,
    },
    Info,
}

impl CommandType {
    pub async fn execute(self) -> Result<()> {
        match self {
            CommandType::Package(args) => package::execute(args).await,
            CommandType::Init { name, no_frontend } => init::execute(&name, no_frontend).await,
            CommandType::PluginInstall { identifier } => plugin::install(&identifier).await,
            CommandType::PluginList => plugin::list().await,
            CommandType::PluginUninstall { name } => plugin::uninstall(&name).await,
            CommandType::PluginCreate { name } => plugin::create(&name).await,
            CommandType::Info => info::execute().await,
        }
    }
}

#[derive(Default)]
pub struct CommandExecutor;

impl CommandExecutor {
    pub fn new() -> Self {
        Self
    }

    pub async fn package_app(&mut self, args: PackageArgs) -> Result<()> {
        CommandType::Package(args).execute().await
    }

    pub async fn init_project(&mut self, name: String, no_frontend: bool) -> Result<()> {
        CommandType::Init {
            name: name.into(),
            no_frontend,
        }
        .execute()
        .await
    }

    pub async fn handle_plugin_action(&mut self, action: PluginAction) -> Result<()> {
        let command = match action {
            PluginAction::Install { identifier } => CommandType::PluginInstall {
                identifier: identifier.into(),
            },
            PluginAction::List => CommandType::PluginList,
            PluginAction::Uninstall { name } => CommandType::PluginUninstall { name: name.into() },
            PluginAction::Create { name } => CommandType::PluginCreate { name: name.into() },
        };
        command.execute().await
    }

    pub async fn show_info(&mut self) -> Result<()> {
        CommandType::Info.execute().await
    }
}
