//! External accessibility checker invocation

use crate::config::CheckerConfig;
use crate::ConfigError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// What one checker run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckerOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CheckerOutput {
    /// Exit 0 (no findings) and exit 2 (findings present) are successful runs
    pub fn exited_cleanly(&self) -> bool {
        matches!(self.exit_code, Some(0) | Some(2))
    }
}

/// Something that checks one URL with a generated config file
#[async_trait]
pub trait Checker: Send + Sync {
    /// Runs the checker once
    ///
    /// Dropping the returned future must stop the underlying work.
    async fn run(&self, url: &str, config_path: &Path) -> std::io::Result<CheckerOutput>;

    /// Human-readable command line, for logs
    fn describe(&self, url: &str, config_path: &Path) -> String;
}

/// Runs the checker binary as a subprocess
///
/// `<binary> <url> --config=<file> [flags...]`
#[derive(Debug, Clone)]
pub struct ProcessChecker {
    binary: String,
    flags: Vec<String>,
}

impl ProcessChecker {
    pub fn new(binary: impl Into<String>, flags: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            flags,
        }
    }

    pub fn from_config(config: &CheckerConfig) -> Self {
        Self::new(config.binary.clone(), config.flags.clone())
    }

    fn args(&self, url: &str, config_path: &Path) -> Vec<String> {
        let mut args = vec![
            url.to_string(),
            format!("--config={}", config_path.display()),
        ];
        args.extend(self.flags.iter().cloned());
        args
    }

    /// Checks that the binary can be started (`<binary> --version`)
    pub async fn verify(&self) -> Result<String, ConfigError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ConfigError::CheckerMissing(format!(
                    "checker is not installed at {} ({}). Run `npm install` to install it.",
                    self.binary, e
                ))
            })?;

        if !output.status.success() {
            return Err(ConfigError::CheckerMissing(format!(
                "{} --version exited with {}",
                self.binary, output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::debug!("Checker {} version {}", self.binary, version);
        Ok(version)
    }
}

#[async_trait]
impl Checker for ProcessChecker {
    async fn run(&self, url: &str, config_path: &Path) -> std::io::Result<CheckerOutput> {
        let output = Command::new(&self.binary)
            .args(self.args(url, config_path))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(CheckerOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn describe(&self, url: &str, config_path: &Path) -> String {
        std::iter::once(self.binary.clone())
            .chain(self.args(url, config_path))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
