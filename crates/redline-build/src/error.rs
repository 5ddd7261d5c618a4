/// Build system error types
use crate::builder::BuildStage;
use redline_config::ConfigError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

/// Failure reported by the external front-end for one module
#[derive(Debug, Error)]
pub enum FrontEndError {
    #[error("front-end {mode} exited with {status} on {}:\n{stderr}", .path.display())]
    Failed {
        path: PathBuf,
        mode: &'static str,
        status: String,
        stderr: String,
    },

    #[error("front-end produced a malformed AST for {}: {error}", .path.display())]
    MalformedAst {
        path: PathBuf,
        error: serde_json::Error,
    },

    #[error("front-end produced non UTF-8 {mode} output for {}", .path.display())]
    InvalidOutput { path: PathBuf, mode: &'static str },

    #[error("front-end {mode} timed out after {}s on {}", .timeout.as_secs(), .path.display())]
    TimedOut {
        path: PathBuf,
        mode: &'static str,
        timeout: Duration,
    },

    #[error("failed to run front-end on {}: {error}", .path.display())]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },
}

/// Failure reported by the native compiler or linker
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("compiler exited with {status} producing {}:\n{stderr}", .output.display())]
    Failed {
        output: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("compiler timed out after {}s producing {}", .timeout.as_secs(), .output.display())]
    TimedOut { output: PathBuf, timeout: Duration },

    #[error("failed to run compiler for {}: {error}", .output.display())]
    Io {
        output: PathBuf,
        error: std::io::Error,
    },
}

/// Import graph could not be resolved
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("entry module {} not found: {error}", .path.display())]
    EntryNotFound {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("unresolved import \"{import}\" in {}", .importer.display())]
    UnresolvedImport { importer: PathBuf, import: String },

    #[error("cyclic import: {}", format_cycle(.cycle))]
    CyclicImport { cycle: Vec<PathBuf> },

    #[error("import depth limit of {limit} exceeded at {}", .path.display())]
    DepthExceeded { path: PathBuf, limit: usize },

    #[error("failed to parse {}: {source}", .path.display())]
    FrontEnd {
        path: PathBuf,
        source: FrontEndError,
    },
}

impl ResolutionError {
    /// Path of the module the failure is attributed to
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::EntryNotFound { path, .. }
            | Self::DepthExceeded { path, .. }
            | Self::FrontEnd { path, .. } => path,
            Self::UnresolvedImport { importer, .. } => importer,
            Self::CyclicImport { cycle } => cycle
                .last()
                .map(PathBuf::as_path)
                .unwrap_or_else(|| std::path::Path::new("")),
        }
    }
}

/// A required external binary is missing or not executable
#[derive(Debug, Error)]
#[error("{tool} '{}' not found or not executable", .program.display())]
pub struct FatalEnvironmentError {
    /// Role of the tool ("front-end" or "compiler")
    pub tool: &'static str,
    /// Program as configured
    pub program: PathBuf,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Environment(#[from] FatalEnvironmentError),

    #[error("invalid build directory {}: {reason}", .path.display())]
    InvalidBuildDir { path: PathBuf, reason: String },

    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    #[error("code generation failed for {}: {source}", .module.display())]
    Generation {
        module: PathBuf,
        source: FrontEndError,
    },

    #[error("compilation failed for {}: {source}", .module.display())]
    Compile {
        module: PathBuf,
        source: ToolchainError,
    },

    #[error("linking '{name}' failed: {source}")]
    Link {
        name: String,
        source: ToolchainError,
    },

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("I/O error at {}: {error}", .path.display())]
    IoError {
        stage: BuildStage,
        path: PathBuf,
        error: std::io::Error,
    },
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(stage: BuildStage, path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            stage,
            path: path.into(),
            error,
        }
    }

    /// Pipeline stage the build was in when it failed
    pub fn stage(&self) -> BuildStage {
        match self {
            Self::Config(_) | Self::Environment(_) | Self::InvalidBuildDir { .. } => {
                BuildStage::Idle
            }
            Self::Resolution(_) => BuildStage::Resolving,
            Self::Generation { .. } => BuildStage::Generating,
            Self::Compile { .. } | Self::WorkerPool(_) => BuildStage::Compiling,
            Self::Link { .. } => BuildStage::Linking,
            Self::IoError { stage, .. } => *stage,
        }
    }
}

fn format_cycle(cycle: &[PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
