pub mod parser;

use crate::build::Engine;
use crate::commands::CommandExecutor;
use crate::result::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deskpack")]
#[command(about = "Package Python desktop applications with web frontends")]
#[command(version)]
#[command(arg_required_else_help = true)]
#[command(
    help_template = "{before-help}{name} v{version}\n\n{about-with-newline}\n{usage-heading} {usage}\n\n{all-args}{after-help}"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Package the application into a distributable")]
    Package(PackageArgs),

    #[command(about = "Scaffold a new application")]
    Init {
        #[arg(help = "Project directory to create")]
        name: String,

        #[arg(long, help = "Skip the Vite frontend scaffold")]
        no_frontend: bool,
    },

    #[command(about = "Manage plugins")]
    Plugin {
        #[command(subcommand)]
        action: PluginAction,
    },

    #[command(about = "Show tool and environment information")]
    Info,
}

/// Flags of `deskpack package`; unset flags fall back to `deskpack.toml`.
#[derive(Args, Debug, Clone, Default)]
pub struct PackageArgs {
    #[arg(help = "Entry script (.py) or build specification (.spec)")]
    pub script: Option<PathBuf>,

    #[arg(long, help = "Output name of the application")]
    pub name: Option<String>,

    #[arg(long, help = "Application icon (.ico, .icns or .png)")]
    pub icon: Option<PathBuf>,

    #[arg(long = "add-data", value_name = "SRC;DEST", help = "Extra data to bundle (repeatable)")]
    pub add_data: Vec<String>,

    #[arg(long, help = "Build an NSIS installer after packaging")]
    pub installer: bool,

    #[arg(long, help = "Harden the build: native-compile the application code")]
    pub secure: bool,

    #[arg(long, help = "Fuse Python sources into a single bundle (with --secure)")]
    pub bundled: bool,

    #[arg(long, help = "Native-compile every remaining module (with --secure)")]
    pub compile_all: bool,

    #[arg(long, help = "Remove dist-info and egg-info folders from the output")]
    pub strip_metadata: bool,

    #[arg(long, help = "Produce a single executable")]
    pub onefile: bool,

    #[arg(long, help = "Keep a console window")]
    pub console: bool,

    #[arg(long, value_enum, help = "Rendering engine to bundle")]
    pub engine: Option<Engine>,

    #[arg(long, help = "Generate collect-all hooks for every installed package")]
    pub collect_all: bool,

    #[arg(long, help = "Generate submodule hooks for every installed package")]
    pub force_hooks: bool,

    #[arg(long, help = "Run the frontend's npm build first")]
    pub build_frontend: bool,

    #[arg(long, help = "Python interpreter to build with")]
    pub python: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum PluginAction {
    #[command(about = "Install a plugin from GitHub (user.repo[.tag]) or a local archive")]
    Install {
        #[arg(help = "Plugin identifier or archive path")]
        identifier: String,
    },

    #[command(about = "List installed plugins")]
    List,

    #[command(about = "Remove an installed plugin")]
    Uninstall {
        #[arg(help = "Plugin directory name")]
        name: String,
    },

    #[command(about = "Scaffold a new plugin")]
    Create {
        #[arg(help = "Plugin name")]
        name: String,
    },
}

impl Default for Cli {
    fn default() -> Self {
        Self::parse()
    }
}

impl Cli {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn execute(self) -> Result<()> {
        let mut executor = CommandExecutor::new();

        match self.command {
            Commands::Package(args) => executor.package_app(args).await,
            Commands::Init { name, no_frontend } => executor.init_project(name, no_frontend).await,
            Commands::Plugin { action } => executor.handle_plugin_action(action).await,
            Commands::Info => executor.show_info().await,
        }
    }
}
