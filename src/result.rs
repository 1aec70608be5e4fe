use crate::secure::SecureStage;
use std::borrow::Cow;
use thiserror::Error;

/** Main Result type alias for deskpack operations
 *
 * # Usage
 * ```no_run
 * use deskpack::result::Result;
 *
 * fn read_settings() -> Result<serde_json::Value> {
 *     let content = std::fs::read_to_string("settings.json")?;
 *     Ok(serde_json::from_str(&content)?)
 * }
 * ```
 */
pub type Result<T> = std::result::Result<T, DeskpackError>;

/** Error enumeration for the packaging pipeline
 *
 * # Error Categories
 * - **Io**: File system operations
 * - **Process**: A child process could not be started or produced no usable result
 * - **ChildExit**: A child process ran and exited non-zero (exit code is kept)
 * - **Config**: Invalid settings, project configuration or CLI input
 * - **NotFound**: Missing scripts, tools, templates or build outputs
 * - **Manifest**: Plugin manifest could not be loaded or is incomplete
 * - **Hardening**: A stage of the hardening chain failed
 * - **TomlParse / TomlSerialize / JsonError / Archive**: format-level failures
 */
#[derive(Error, Debug)]
pub enum DeskpackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Process error: {0}")]
    Process(Cow<'static, str>),

    #[error("{program} exited with code {code}")]
    ChildExit { program: String, code: i32 },

    #[error("Config error: {0}")]
    Config(Cow<'static, str>),

    #[error("Not found: {0}")]
    NotFound(Cow<'static, str>),

    #[error("Plugin manifest error: {0}")]
    Manifest(Cow<'static, str>),

    #[error("Hardening failed during {stage}: {message}")]
    Hardening {
        stage: SecureStage,
        message: Cow<'static, str>,
    },

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl DeskpackError {
    pub const NATIVE_COMPILER_NOT_FOUND: &'static str = "No native C toolchain available";
    pub const INSTALLER_COMPILER_NOT_FOUND: &'static str =
        "makensis not found. Please install NSIS and add it to PATH.";
    pub const INVALID_CONFIG: &'static str = "Invalid configuration format";

    pub fn process(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Process(msg.into())
    }

    pub fn config(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn manifest(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Manifest(msg.into())
    }

    pub fn child_exit(program: impl Into<String>, code: i32) -> Self {
        Self::ChildExit {
            program: program.into(),
            code,
        }
    }

    pub fn hardening(stage: SecureStage, msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Hardening {
            stage,
            message: msg.into(),
        }
    }

    /// Attributes a failure to a hardening stage. Child exits keep their code.
    pub fn at_stage(self, stage: SecureStage) -> Self {
        match self {
            Self::ChildExit { .. } | Self::Hardening { .. } => self,
            other => Self::hardening(stage, other.to_string()),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ChildExit { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_exit_code_is_propagated() {
        let err = DeskpackError::child_exit("pyinstaller", 7);
        assert_eq!(err.exit_code(), 7);
        assert_eq!(err.to_string(), "pyinstaller exited with code 7");
    }

    #[test]
    fn other_errors_exit_with_one() {
        assert_eq!(DeskpackError::config("bad").exit_code(), 1);
        assert_eq!(DeskpackError::child_exit("x", 0).exit_code(), 1);
    }

    #[test]
    fn hardening_error_names_stage() {
        let err = DeskpackError::hardening(SecureStage::NativeCompile, "no toolchain");
        assert!(err.to_string().contains("native compile"));
    }
}
