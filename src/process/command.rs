//! Launch description of the supervised process.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::config::{PathsConfig, ProcessSettings};

/// Binary and argument vector. Restarts reuse it unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    binary: PathBuf,
    args: Vec<String>,
}

impl ProcessSpec {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The edge server invocation:
    /// `-conf <config> -log <destination> [-ca <acme directory>]`.
    pub fn edge(paths: &PathsConfig, process: &ProcessSettings) -> Self {
        let mut spec = Self::new(&paths.binary)
            .arg("-conf")
            .arg(&paths.config)
            .arg("-log")
            .arg(&process.log_destination);

        if let Some(ca) = process.acme_ca.as_deref().filter(|ca| !ca.is_empty()) {
            spec = spec.arg("-ca").arg(ca);
        }
        spec
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::inherit())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}
