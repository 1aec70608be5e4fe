use crate::result::{DeskpackError, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::Command;
use which::which;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
    pub stream: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
            stream: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the child was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(-1)
    }
}

/// Seam through which every external tool is invoked
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs `spec` and turns a non-zero exit into [`DeskpackError::ChildExit`].
pub async fn run_checked(runner: &dyn CommandRunner, spec: &CommandSpec) -> Result<CommandOutput> {
    let output = runner.run(spec).await?;
    if output.is_success() {
        return Ok(output);
    }

    let stderr = output.stderr.trim();
    if !stderr.is_empty() {
        eprintln!("{} stderr:\n{}", spec.program_name(), stderr);
    }
    log::error!(
        "{} failed with exit code {}: {}",
        spec.program_name(),
        output.exit_code(),
        stderr
    );
    Err(DeskpackError::child_exit(spec.program_name(), output.exit_code()))
}

#[derive(Debug, Default, Clone)]
pub struct SystemRunner {
    verbose: bool,
}

impl SystemRunner {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.envs {
            cmd.env(key, value);
        }

        log::debug!("Running: {}", spec);

        if spec.stream || self.verbose {
            cmd.stdout(Stdio::inherit());
            cmd.stderr(Stdio::inherit());

            let mut child = cmd.spawn().map_err(|e| {
                DeskpackError::process(format!("Failed to execute {}: {}", spec.program_name(), e))
            })?;
            let status = child.wait().await.map_err(|e| {
                DeskpackError::process(format!("Failed to wait for {}: {}", spec.program_name(), e))
            })?;

            Ok(CommandOutput {
                code: status.code(),
                ..CommandOutput::default()
            })
        } else {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());

            let output = cmd.output().await.map_err(|e| {
                DeskpackError::process(format!("Failed to execute {}: {}", spec.program_name(), e))
            })?;

            Ok(CommandOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

type Responder = Box<dyn Fn(&CommandSpec) -> CommandOutput + Send + Sync>;

pub struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
    responder: Responder,
}

impl RecordingRunner {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(|_| CommandOutput::success())
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn count_matching(&self, predicate: impl Fn(&CommandSpec) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }
        Ok((self.responder)(spec))
    }
}

pub fn find_executable(name: &str) -> Result<PathBuf> {
    which(name).map_err(|_| DeskpackError::not_found(format!("Executable not found: {}", name)))
}

pub fn first_existing<'a, I>(candidates: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = &'a Path>,
{
    candidates
        .into_iter()
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_checked_reports_exit_code() {
        let runner = RecordingRunner::new(|_| CommandOutput::failure(3, "boom"));
        let spec = CommandSpec::new("/usr/bin/tool").arg("--flag");

        let err = run_checked(&runner, &spec).await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(runner.calls(), vec![spec]);
    }

    #[test]
    fn display_joins_program_and_args() {
        let spec = CommandSpec::new("zig").args(["cc", "-O3"]);
        assert_eq!(spec.to_string(), "zig cc -O3");
        assert_eq!(spec.program_name(), "zig");
    }
}
