use crate::build::DataPair;
use crate::result::{DeskpackError, Result};
use std::path::{Path, PathBuf};

pub struct CliParser;

impl CliParser {
    /// Entry script or build specification; must exist and end in `.py` or `.spec`.
    pub fn validate_script_path(path: &Path) -> Result<PathBuf> {
        if !path.exists() {
            return Err(DeskpackError::not_found(format!(
                "Script not found: {}",
                path.display()
            )));
        }

        if !path.is_file() {
            return Err(DeskpackError::config(format!(
                "Script path is not a file: {}",
                path.display()
            )));
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some("py") | Some("pyw") | Some("spec") => Ok(path.to_path_buf()),
            _ => Err(DeskpackError::config(format!(
                "Expected a .py script or a .spec file, got {}",
                path.display()
            ))),
        }
    }

    pub fn validate_add_data(directives: &[String]) -> Result<Vec<DataPair>> {
        directives.iter().map(|d| DataPair::parse(d)).collect()
    }

    pub fn validate_name(name: &str) -> Result<String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DeskpackError::config("Name cannot be empty"));
        }
        if trimmed.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
            return Err(DeskpackError::config(format!(
                "Name must not be a path: {}",
                trimmed
            )));
        }
        Ok(trimmed.to_string())
    }
}
