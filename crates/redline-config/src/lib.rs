//! Redline Configuration System
//!
//! Locates and decodes the optional project descriptor (`redline.toml`) and
//! resolves it into the settings a build needs:
//! - Entry point, project name and output directory
//! - Front-end and native toolchain settings
//! - Build directory and parallelism
//!
//! # Configuration Hierarchy
//!
//! Settings are layered in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Project descriptor (nearest `redline.toml` in an ancestor directory)
//! 3. Environment variables (REDLINE_*)
//! 4. CLI flags (applied by the caller)
//!
//! When no descriptor is found the loader falls back to single-file mode.
//!
//! # Example
//!
//! ```no_run
//! use redline_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let config = loader.load(Some(Path::new("main.rl")), Path::new(".")).unwrap();
//! println!("building {}", config.project.name);
//! ```

pub mod loader;
pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {}: {error}", .file.display())]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Missing required field '{field}' in {}", .file.display())]
    MissingField { field: String, file: PathBuf },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("No redline.toml found above {} and no source file was given", .searched.display())]
    NoEntryPoint { searched: PathBuf },

    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Not a redline source file (expected .rl): {}", .0.display())]
    InvalidSourceFile(PathBuf),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use loader::{
    BuildSettings, Config, ConfigLoader, DiscoveredConfig, ResolvedProject, ToolchainSettings,
    DEFAULT_BUILD_DIR, DEFAULT_PROJECT_NAME, DESCRIPTOR_FILE, SOURCE_EXTENSION,
};
pub use project::ProjectConfig;
