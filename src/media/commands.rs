use std::ffi::{OsStr, OsString};
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SubflowError};

/// One ffmpeg invocation, assembled argument by argument
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    pub program: String,
    pub args: Vec<OsString>,
    /// Short label used in logs and error messages
    pub label: &'static str,
}

/// Captured output of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl FfmpegCommand {
    pub fn new<S: Into<String>>(program: S, label: &'static str) -> Self {
        Self {
            program: program.into(),
            args: vec!["-hide_banner".into()],
            label,
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn input(self, path: &Path) -> Self {
        self.arg("-i").arg(path)
    }

    /// Keep only stream `stream` of input 0
    pub fn select_stream(self, stream: u32) -> Self {
        self.arg("-map").arg(format!("0:{}", stream))
    }

    /// Overwrite `path` if it exists
    pub fn output(self, path: &Path) -> Self {
        self.arg("-y").arg(path)
    }

    /// Run to completion, capturing output whatever the exit status
    pub async fn run(&self) -> Result<CommandOutput> {
        debug!("{}: {} {:?}", self.label, self.program, self.args);

        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SubflowError::Media(format!("Cannot run {}: {}", self.program, e)))?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Like [`run`](FfmpegCommand::run), but a non-zero exit is an error
    pub async fn run_checked(&self) -> Result<CommandOutput> {
        let output = self.run().await?;
        if output.success {
            return Ok(output);
        }
        let reason = output.stderr.lines().last().unwrap_or("no diagnostics").trim().to_string();
        Err(SubflowError::Media(format!("{} failed: {}", self.label, reason)))
    }
}

/// The invocations the toolkit needs, bound to one ffmpeg binary
pub struct FfmpegCommands {
    program: String,
}

impl FfmpegCommands {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self { program: program.into() }
    }

    pub fn version(&self) -> FfmpegCommand {
        FfmpegCommand::new(self.program.as_str(), "Version check").arg("-version")
    }

    /// `ffmpeg -i` without outputs prints the stream table on stderr and exits non-zero
    pub fn probe(&self, video: &Path) -> FfmpegCommand {
        FfmpegCommand::new(self.program.as_str(), "Stream probe").input(video)
    }

    pub fn extract_subtitle(&self, video: &Path, stream: u32, destination: &Path) -> FfmpegCommand {
        FfmpegCommand::new(self.program.as_str(), "Subtitle extraction")
            .input(video)
            .select_stream(stream)
            .output(destination)
    }
}
