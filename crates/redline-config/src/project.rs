//! Project Descriptor (redline.toml)
//!
//! Decodes the descriptor stored next to a project's sources. Every section is
//! optional, but a present `[project]` section must name its `entry_point`.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project descriptor from redline.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Project metadata and layout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectSection>,

    /// External tool configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<ToolchainConfig>,

    /// Build directory and scheduling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildConfig>,
}

/// `[project]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    /// Project name, used for the linked executable (default: "main")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Entry module, relative to the descriptor's directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<PathBuf>,

    /// Artifact directory (default: the descriptor's directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

/// `[toolchain]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ToolchainConfig {
    /// Front-end binary (default: "redline-core")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend: Option<PathBuf>,

    /// Native C++ compiler driver (default: "g++")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<PathBuf>,

    /// Language standard passed as `-std=` (default: "c++11")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std: Option<String>,

    /// Extra include search directories
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_dirs: Vec<PathBuf>,

    /// Per-subprocess wall-clock limit in seconds (default: 120)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// `[build]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Transient build directory (default: "<output_dir>/.redline-build")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<PathBuf>,

    /// Parallel object compilation jobs for library builds (default: 1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

impl ProjectConfig {
    /// Load a descriptor from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        if let Some(project) = &config.project {
            if project.entry_point.is_none() {
                return Err(ConfigError::MissingField {
                    field: "project.entry_point".to_string(),
                    file: path.to_path_buf(),
                });
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate field values
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(project) = &self.project {
            if project.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
                return Err(invalid("project.name", "name cannot be empty"));
            }
            if project
                .entry_point
                .as_ref()
                .is_some_and(|p| p.as_os_str().is_empty())
            {
                return Err(invalid("project.entry_point", "path cannot be empty"));
            }
        }

        if let Some(toolchain) = &self.toolchain {
            if toolchain.std.as_deref().is_some_and(|s| s.trim().is_empty()) {
                return Err(invalid("toolchain.std", "standard cannot be empty"));
            }
            if toolchain.timeout_secs == Some(0) {
                return Err(invalid("toolchain.timeout_secs", "must be at least 1"));
            }
        }

        if let Some(build) = &self.build {
            if build.jobs == Some(0) {
                return Err(invalid("build.jobs", "must be at least 1"));
            }
        }

        Ok(())
    }

    /// Get the project name, if present
    pub fn project_name(&self) -> Option<&str> {
        self.project.as_ref().and_then(|p| p.name.as_deref())
    }

    /// Get the entry point, if present
    pub fn entry_point(&self) -> Option<&Path> {
        self.project.as_ref().and_then(|p| p.entry_point.as_deref())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
