pub mod config;
pub mod context;
pub mod platform;
pub mod runtime;
pub mod settings;

pub use config::{Engine, PackageSection, ProjectConfig, RuntimeSection, CONFIG_FILE};
pub use context::{sanitize_out_name, AppendOnly, BuildContext, BuildOptions, DataPair};
pub use platform::TargetPlatform;
pub use runtime::{RuntimeLayout, DEPENDENCY_DIR, LOADER_NAME};
pub use settings::{Settings, SETTINGS_FILE};
