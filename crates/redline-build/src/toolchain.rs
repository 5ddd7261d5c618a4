//! Native toolchain adapter
//!
//! Drives a C++ compiler driver (`g++`, `clang++`, ...) to compile generated
//! implementations into objects or link them into an executable.

use crate::error::{FatalEnvironmentError, ToolchainError};
use crate::process::{self, ProcessError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::debug;

/// Port to the native compiler/linker
pub trait Toolchain: Send + Sync {
    /// Fail fast if the compiler cannot be run at all
    fn check_available(&self) -> Result<(), FatalEnvironmentError>;

    /// Compile one implementation file into a standalone object
    fn compile_object(
        &self,
        source: &Path,
        output: &Path,
        include_dirs: &[PathBuf],
    ) -> Result<(), ToolchainError>;

    /// Compile and link implementation files into one executable
    fn link(
        &self,
        sources: &[PathBuf],
        output: &Path,
        include_dirs: &[PathBuf],
    ) -> Result<(), ToolchainError>;
}

/// Toolchain backed by a command-line C++ compiler driver
#[derive(Debug, Clone)]
pub struct CxxToolchain {
    compiler: PathBuf,
    std: String,
    timeout: Option<Duration>,
}

impl CxxToolchain {
    pub fn new(compiler: impl Into<PathBuf>, std: impl Into<String>) -> Self {
        Self {
            compiler: compiler.into(),
            std: std.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn compiler(&self) -> &Path {
        &self.compiler
    }

    /// Arguments for compiling a single object
    pub fn object_args(&self, source: &Path, output: &Path, include_dirs: &[PathBuf]) -> Vec<OsString> {
        let mut args = vec![self.std_flag(), OsString::from("-c"), source.into()];
        self.push_output_and_includes(&mut args, output, include_dirs);
        args
    }

    /// Arguments for compiling and linking an executable
    pub fn link_args(&self, sources: &[PathBuf], output: &Path, include_dirs: &[PathBuf]) -> Vec<OsString> {
        let mut args = vec![self.std_flag()];
        args.extend(sources.iter().map(OsString::from));
        self.push_output_and_includes(&mut args, output, include_dirs);
        args
    }

    fn std_flag(&self) -> OsString {
        OsString::from(format!("-std={}", self.std))
    }

    fn push_output_and_includes(&self, args: &mut Vec<OsString>, output: &Path, include_dirs: &[PathBuf]) {
        args.push(OsString::from("-o"));
        args.push(output.into());
        for dir in include_dirs {
            let mut flag = OsString::from("-I");
            flag.push(dir);
            args.push(flag);
        }
    }

    fn invoke(&self, args: Vec<OsString>, output: &Path) -> Result<(), ToolchainError> {
        debug!(compiler = %self.compiler.display(), output = %output.display(), "running compiler");

        let mut command = Command::new(&self.compiler);
        command.args(args);

        let result = process::run(&mut command, self.timeout).map_err(|e| match e {
            ProcessError::TimedOut(timeout) => ToolchainError::TimedOut {
                output: output.to_path_buf(),
                timeout,
            },
            ProcessError::Io(error) => ToolchainError::Io {
                output: output.to_path_buf(),
                error,
            },
        })?;

        if !result.success() {
            return Err(ToolchainError::Failed {
                output: output.to_path_buf(),
                status: result.status.to_string(),
                stderr: result.stderr,
            });
        }
        Ok(())
    }
}

impl Toolchain for CxxToolchain {
    fn check_available(&self) -> Result<(), FatalEnvironmentError> {
        process::find_executable(&self.compiler)
            .map(|_| ())
            .ok_or_else(|| FatalEnvironmentError {
                tool: "compiler",
                program: self.compiler.clone(),
            })
    }

    fn compile_object(
        &self,
        source: &Path,
        output: &Path,
        include_dirs: &[PathBuf],
    ) -> Result<(), ToolchainError> {
        self.invoke(self.object_args(source, output, include_dirs), output)
    }

    fn link(
        &self,
        sources: &[PathBuf],
        output: &Path,
        include_dirs: &[PathBuf],
    ) -> Result<(), ToolchainError> {
        self.invoke(self.link_args(sources, output, include_dirs), output)
    }
}
