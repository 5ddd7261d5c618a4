//! Front-end adapter
//!
//! The front-end is an external binary invoked once per module and mode:
//!
//! ```text
//! <frontend> --ast    <file.rl>   # JSON AST on stdout
//! <frontend> --header <file.rl>   # C++ header on stdout
//! <frontend> --cpp    <file.rl>   # C++ implementation on stdout
//! ```
//!
//! Diagnostics go to stderr and are carried through unmodified.

use crate::ast::Ast;
use crate::error::{FatalEnvironmentError, FrontEndError};
use crate::module::SourceModule;
use crate::process::{self, ProcessError};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::debug;

/// Generated artifact kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerateTarget {
    Header,
    Implementation,
}

impl GenerateTarget {
    /// Command-line flag selecting this mode
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Header => "--header",
            Self::Implementation => "--cpp",
        }
    }

    /// Extension of the file the generated text is written to
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Header => "hpp",
            Self::Implementation => "cpp",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Implementation => "implementation",
        }
    }
}

const AST_FLAG: &str = "--ast";

/// Port to the language front-end
pub trait FrontEnd: Send + Sync {
    /// Fail fast if the front-end cannot be run at all
    fn check_available(&self) -> Result<(), FatalEnvironmentError>;

    /// Parse one module into its AST
    fn extract_ast(&self, path: &Path) -> Result<Ast, FrontEndError>;

    /// Generate header or implementation text for one module
    fn generate(&self, module: &SourceModule, target: GenerateTarget)
        -> Result<String, FrontEndError>;
}

/// Front-end backed by an external process
#[derive(Debug, Clone)]
pub struct ProcessFrontEnd {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessFrontEnd {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill the front-end if a single invocation runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn invoke(&self, flag: &str, mode: &'static str, path: &Path) -> Result<Vec<u8>, FrontEndError> {
        debug!(mode, path = %path.display(), "running front-end");

        let mut command = Command::new(&self.program);
        command.arg(flag).arg(path);

        let output = process::run(&mut command, self.timeout).map_err(|e| match e {
            ProcessError::TimedOut(timeout) => FrontEndError::TimedOut {
                path: path.to_path_buf(),
                mode,
                timeout,
            },
            ProcessError::Io(error) => FrontEndError::Io {
                path: path.to_path_buf(),
                error,
            },
        })?;

        if !output.success() {
            return Err(FrontEndError::Failed {
                path: path.to_path_buf(),
                mode,
                status: output.status.to_string(),
                stderr: output.stderr,
            });
        }

        Ok(output.stdout)
    }
}

impl FrontEnd for ProcessFrontEnd {
    fn check_available(&self) -> Result<(), FatalEnvironmentError> {
        process::find_executable(&self.program)
            .map(|_| ())
            .ok_or_else(|| FatalEnvironmentError {
                tool: "front-end",
                program: self.program.clone(),
            })
    }

    fn extract_ast(&self, path: &Path) -> Result<Ast, FrontEndError> {
        let stdout = self.invoke(AST_FLAG, "ast", path)?;
        serde_json::from_slice(&stdout).map_err(|error| FrontEndError::MalformedAst {
            path: path.to_path_buf(),
            error,
        })
    }

    fn generate(
        &self,
        module: &SourceModule,
        target: GenerateTarget,
    ) -> Result<String, FrontEndError> {
        let stdout = self.invoke(target.flag(), target.name(), &module.path)?;
        String::from_utf8(stdout).map_err(|_| FrontEndError::InvalidOutput {
            path: module.path.clone(),
            mode: target.name(),
        })
    }
}
