use crate::build::config::Engine;
use crate::build::platform::TargetPlatform;
use crate::build::runtime::RuntimeLayout;
use crate::build::settings::Settings;
use crate::result::{DeskpackError, Result};
use crate::utils::CommandRunner;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Ordered list that can only grow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOnly<T>(Vec<T>);

impl<T> Default for AppendOnly<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> AppendOnly<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: T) {
        self.0.push(item);
    }

    pub fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.0.extend(items);
    }
}

impl<T: PartialEq> AppendOnly<T> {
    pub fn push_unique(&mut self, item: T) -> bool {
        if self.0.contains(&item) {
            false
        } else {
            self.0.push(item);
            true
        }
    }
}

impl<T> Deref for AppendOnly<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T> FromIterator<T> for AppendOnly<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a AppendOnly<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPair {
    pub source: PathBuf,
    pub dest: String,
}

impl DataPair {
    pub fn new(source: impl Into<PathBuf>, dest: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
        }
    }

    /// Parses a `source<sep>destination` directive
    pub fn parse(directive: &str) -> Result<Self> {
        let split_at = directive.rfind(';').or_else(|| {
            directive
                .rfind(':')
                .filter(|&idx| !is_drive_colon(directive, idx))
        });

        let idx = split_at.ok_or_else(|| {
            DeskpackError::config(format!(
                "Invalid data directive '{}': expected SOURCE;DEST or SOURCE:DEST",
                directive
            ))
        })?;

        let (source, dest) = (&directive[..idx], &directive[idx + 1..]);
        if source.is_empty() || dest.is_empty() {
            return Err(DeskpackError::config(format!(
                "Invalid data directive '{}': source and destination are required",
                directive
            )));
        }

        Ok(Self::new(source, dest))
    }

    pub fn render(&self, platform: TargetPlatform) -> String {
        format!(
            "{}{}{}",
            self.source.display(),
            platform.path_separator(),
            self.dest
        )
    }
}

fn is_drive_colon(directive: &str, idx: usize) -> bool {
    let bytes = directive.as_bytes();
    idx == 1
        && bytes[0].is_ascii_alphabetic()
        && matches!(bytes.get(2), Some(b'\\') | Some(b'/'))
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub onefile: bool,
    pub console: bool,
    pub engine: Engine,
    pub secure: bool,
    pub bundled: bool,
    pub compile_all: bool,
    pub strip_metadata: bool,
    pub build_installer: bool,
    pub collect_all: bool,
    pub force_hooks: bool,
    pub build_frontend: bool,
    /// Replacement for the framework's precompiled loader binary.
    pub loader_override: Option<PathBuf>,
}

/** Mutable record flowing through one packaging run
 *
 * Created once per invocation and handed by `&mut` to each module in turn.
 * The list fields are [`AppendOnly`]; scalar fields (`script`, `out_name`,
 * `settings`, `app_icon`) may be reassigned by modules.
 */
#[derive(Clone)]
pub struct BuildContext {
    pub script: PathBuf,
    /// Entry script as given by the user once hardening has substituted a bootstrap.
    pub original_script: Option<PathBuf>,
    pub out_name: String,
    pub settings: Settings,
    pub add_data: AppendOnly<DataPair>,
    pub binaries: AppendOnly<DataPair>,
    pub hidden_imports: AppendOnly<String>,
    pub excludes: AppendOnly<String>,
    pub pathex: AppendOnly<PathBuf>,
    pub extra_args: AppendOnly<String>,
    pub runtime_hooks: AppendOnly<PathBuf>,
    pub app_icon: Option<PathBuf>,
    pub options: BuildOptions,
    pub platform: TargetPlatform,
    pub script_dir: PathBuf,
    pub build_dir: PathBuf,
    pub dist_root: PathBuf,
    pub runtime: RuntimeLayout,
    pub python: PathBuf,
    pub runner: Arc<dyn CommandRunner>,
    pub progress: ProgressBar,
}

impl BuildContext {
    pub fn new(
        script: impl Into<PathBuf>,
        out_name: impl Into<String>,
        settings: Settings,
        runtime: RuntimeLayout,
        python: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let script = script.into();
        let script_dir = script
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            original_script: None,
            out_name: out_name.into(),
            settings,
            add_data: AppendOnly::new(),
            binaries: AppendOnly::new(),
            hidden_imports: AppendOnly::new(),
            excludes: AppendOnly::new(),
            pathex: AppendOnly::new(),
            extra_args: AppendOnly::new(),
            runtime_hooks: AppendOnly::new(),
            app_icon: None,
            options: BuildOptions::default(),
            platform: TargetPlatform::current(),
            build_dir: script_dir.join("build"),
            dist_root: script_dir.join("dist"),
            script_dir,
            script,
            runtime,
            python: python.into(),
            runner,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_platform(mut self, platform: TargetPlatform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.dist_root.join(&self.out_name)
    }

    pub fn main_executable(&self) -> PathBuf {
        self.dist_dir().join(self.platform.exe_name(&self.out_name))
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub fn report(&self, message: impl Into<String>, percent: u64) {
        let message = message.into();
        log::info!("{}", message);
        self.progress.set_message(message);
        self.progress.set_position(percent);
    }
}

/// Sanitises an application title into an output name
pub fn sanitize_out_name(title: &str) -> String {
    let mapped: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut collapsed = String::with_capacity(mapped.len());
    for c in mapped.chars() {
        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }

    collapsed.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_both_separators() {
        assert_eq!(DataPair::parse("a;.").unwrap(), DataPair::new("a", "."));
        assert_eq!(DataPair::parse("b:sub").unwrap(), DataPair::new("b", "sub"));
    }

    #[test]
    fn parse_keeps_windows_drive() {
        let pair = DataPair::parse(r"C:\assets\img;img").unwrap();
        assert_eq!(pair.source, PathBuf::from(r"C:\assets\img"));
        assert_eq!(pair.dest, "img");

        let pair = DataPair::parse(r"C:\assets\img:img").unwrap();
        assert_eq!(pair.dest, "img");

        assert!(DataPair::parse(r"C:\assets").is_err());
    }

    #[test]
    fn parse_rejects_empty_parts() {
        assert!(DataPair::parse(";dest").is_err());
        assert!(DataPair::parse("src;").is_err());
        assert!(DataPair::parse("nothing").is_err());
    }

    #[test]
    fn render_uses_platform_separator() {
        let pair = DataPair::new("a", ".");
        assert_eq!(pair.render(TargetPlatform::Windows), "a;.");
        assert_eq!(pair.render(TargetPlatform::Linux), "a:.");
    }

    #[test]
    fn append_only_push_unique() {
        let mut list: AppendOnly<String> = AppendOnly::new();
        assert!(list.push_unique("x".into()));
        assert!(!list.push_unique("x".into()));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn sanitize_title() {
        assert_eq!(sanitize_out_name("My App"), "My_App");
        assert_eq!(sanitize_out_name("  Hello,  World! "), "Hello_World");
        assert_eq!(sanitize_out_name("a-b_c"), "a-b_c");
        assert_eq!(sanitize_out_name("!!!"), "");
    }
}
