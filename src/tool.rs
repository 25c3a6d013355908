//! External introspection tools.
//!
//! `readelf` and `objdump` are run with a fixed C locale so their output parses the same way on
//! every system. Each run is one-shot: the child is waited on and its pipes are closed before
//! `run` returns, whether or not it succeeded.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct Tool {
    program: PathBuf,
}

impl Tool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn name(&self) -> String {
        self.program.display().to_string()
    }

    /// Runs the tool as `program <fixed..> <passthrough..> <binary>` and returns its stdout.
    pub fn run<S: AsRef<OsStr>>(
        &self,
        fixed: &[&str],
        passthrough: &[S],
        binary: &Path,
    ) -> Result<String> {
        tracing::debug!(
            "running {} {} on {}",
            self.name(),
            fixed.join(" "),
            binary.display()
        );

        let output = Command::new(&self.program)
            .args(fixed)
            .args(passthrough)
            .arg(binary)
            .env("LANG", "C")
            .env("LC_ALL", "C")
            .output()
            .map_err(|e| Error::ExternalToolFailure {
                tool: self.name(),
                reason: format!("failed to launch: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ExternalToolFailure {
                tool: self.name(),
                reason: format!("{}: {}", output.status, stderr.trim()),
            }
            .into());
        }

        String::from_utf8(output.stdout).map_err(|_| {
            Error::ExternalToolFailure {
                tool: self.name(),
                reason: "output is not valid UTF-8".to_string(),
            }
            .into()
        })
    }
}
