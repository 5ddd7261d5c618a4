//! Configuration Loader
//!
//! Finds the nearest project descriptor and resolves the settings a build
//! runs with, applying precedence:
//! 1. Built-in defaults - lowest priority
//! 2. Project descriptor (redline.toml) - overrides defaults
//! 3. Environment variables (REDLINE_*) - overrides the descriptor
//! 4. CLI flags - highest priority (handled by caller)

use crate::project::{ProjectConfig, ToolchainConfig};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Descriptor file name searched for in ancestor directories
pub const DESCRIPTOR_FILE: &str = "redline.toml";
/// Project name used when the descriptor does not set one
pub const DEFAULT_PROJECT_NAME: &str = "main";
/// Extension of redline source modules
pub const SOURCE_EXTENSION: &str = "rl";

const DEFAULT_FRONTEND: &str = "redline-core";
const DEFAULT_COMPILER: &str = "g++";
const DEFAULT_CXX_STD: &str = "c++11";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Build directory name under the output directory
pub const DEFAULT_BUILD_DIR: &str = ".redline-build";

/// Configuration loader
pub struct ConfigLoader {
    /// Whether REDLINE_* environment variables are consulted
    read_env: bool,
}

/// A descriptor found during discovery
#[derive(Debug, Clone)]
pub struct DiscoveredConfig {
    /// Directory containing the descriptor
    pub root: PathBuf,
    /// Path of the descriptor file itself
    pub path: PathBuf,
    /// Decoded descriptor
    pub config: ProjectConfig,
}

/// Where a build starts and where its artifact goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProject {
    /// Entry module path (absolute when the loader was given an absolute cwd)
    pub entry: PathBuf,
    /// Project name; names the linked executable
    pub name: String,
    /// Directory receiving final artifacts
    pub output_dir: PathBuf,
    /// Project root: the descriptor's directory, or the entry's directory in
    /// single-file mode. Runtime headers are looked up here.
    pub root: PathBuf,
}

/// Fully resolved external tool settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainSettings {
    pub frontend: PathBuf,
    pub compiler: PathBuf,
    pub std: String,
    pub include_dirs: Vec<PathBuf>,
    pub timeout: Duration,
}

/// Fully resolved build directory and scheduling settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    pub build_dir: PathBuf,
    pub jobs: usize,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ResolvedProject,
    pub toolchain: ToolchainSettings,
    pub build: BuildSettings,
    /// Descriptor the configuration came from, if any
    pub descriptor: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader that honours REDLINE_* environment overrides
    pub fn new() -> Self {
        Self { read_env: true }
    }

    /// Create a loader that ignores the environment
    pub fn without_env() -> Self {
        Self { read_env: false }
    }

    /// Resolve the configuration for a build.
    ///
    /// `target` is the path given on the command line (a source file, a
    /// directory, or nothing); relative paths are taken against `cwd`.
    /// Discovery starts at the target directory (or the file's parent, or
    /// `cwd`). A descriptor with a `[project]` section decides the entry point;
    /// otherwise the target file is built in single-file mode.
    pub fn load(&self, target: Option<&Path>, cwd: &Path) -> ConfigResult<Config> {
        let target = target.map(|t| anchor(cwd, t));
        let start_dir = match &target {
            Some(t) if t.is_dir() => t.clone(),
            Some(t) => parent_dir(t),
            None => cwd.to_path_buf(),
        };

        let discovered = self.discover(&start_dir)?;

        let (project, file_config, descriptor) = match discovered {
            Some(found) if found.config.project.is_some() => {
                let project = Self::resolve_entry(&found.config, &found.root)?;
                if let Some(t) = target.as_ref().filter(|t| t.is_file()) {
                    if *t != project.entry {
                        debug!(
                            given = %t.display(),
                            entry = %project.entry.display(),
                            "descriptor entry point takes precedence over the given file"
                        );
                    }
                }
                (project, found.config, Some(found.path))
            }
            Some(found) => {
                let project = Self::single_file(target.as_deref(), &start_dir)?;
                (project, found.config, Some(found.path))
            }
            None => {
                let project = Self::single_file(target.as_deref(), &start_dir)?;
                (project, ProjectConfig::default(), None)
            }
        };

        let base = descriptor
            .as_deref()
            .map(parent_dir)
            .unwrap_or_else(|| project.root.clone());

        let toolchain = resolve_toolchain(
            file_config.toolchain.as_ref().unwrap_or(&ToolchainConfig::default()),
            &base,
        );
        let toolchain = if self.read_env {
            apply_env_overrides(toolchain, cwd)?
        } else {
            toolchain
        };

        let build_section = file_config.build.unwrap_or_default();
        let build = BuildSettings {
            build_dir: build_section
                .build_dir
                .map(|d| anchor(&base, &d))
                .unwrap_or_else(|| project.output_dir.join(DEFAULT_BUILD_DIR)),
            jobs: build_section.jobs.unwrap_or(1),
        };

        Ok(Config {
            project,
            toolchain,
            build,
            descriptor,
        })
    }

    /// Find the nearest descriptor by walking up from `start_dir`.
    ///
    /// Relative start directories are taken against the current directory.
    /// Returns `None` when the filesystem root is reached without a match.
    pub fn discover(&self, start_dir: &Path) -> ConfigResult<Option<DiscoveredConfig>> {
        let mut current = if start_dir.is_absolute() {
            start_dir.to_path_buf()
        } else {
            env::current_dir()?.join(start_dir)
        };

        loop {
            let config_path = current.join(DESCRIPTOR_FILE);

            if config_path.is_file() {
                debug!(path = %config_path.display(), "found project descriptor");
                let config = ProjectConfig::load_from_file(&config_path)?;
                return Ok(Some(DiscoveredConfig {
                    root: current,
                    path: config_path,
                    config,
                }));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok(None),
            }
        }
    }

    /// Turn a decoded descriptor into entry point, name and output directory.
    pub fn resolve_entry(config: &ProjectConfig, config_dir: &Path) -> ConfigResult<ResolvedProject> {
        let file = config_dir.join(DESCRIPTOR_FILE);
        let section = config.project.as_ref().ok_or_else(|| ConfigError::MissingField {
            field: "project".to_string(),
            file: file.clone(),
        })?;
        let entry = section
            .entry_point
            .as_ref()
            .ok_or(ConfigError::MissingField {
                field: "project.entry_point".to_string(),
                file,
            })?;

        Ok(ResolvedProject {
            entry: anchor(config_dir, entry),
            name: section
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string()),
            output_dir: section
                .output_dir
                .as_ref()
                .map(|d| anchor(config_dir, d))
                .unwrap_or_else(|| config_dir.to_path_buf()),
            root: config_dir.to_path_buf(),
        })
    }

    /// Single-file mode: the given file is the entry, named after its stem,
    /// with artifacts placed next to it.
    pub fn single_file(path: Option<&Path>, searched: &Path) -> ConfigResult<ResolvedProject> {
        let path = match path {
            Some(p) if !p.is_dir() => p,
            _ => {
                return Err(ConfigError::NoEntryPoint {
                    searched: searched.to_path_buf(),
                })
            }
        };

        if !path.is_file() {
            return Err(ConfigError::SourceNotFound(path.to_path_buf()));
        }
        if path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION) {
            return Err(ConfigError::InvalidSourceFile(path.to_path_buf()));
        }

        let dir = parent_dir(path);
        Ok(ResolvedProject {
            entry: path.to_path_buf(),
            name: path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
                .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string()),
            output_dir: dir.clone(),
            root: dir,
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Check if this configuration came from a descriptor
    pub fn is_project(&self) -> bool {
        self.descriptor.is_some()
    }

    /// Get the project name
    pub fn project_name(&self) -> &str {
        &self.project.name
    }
}

fn resolve_toolchain(config: &ToolchainConfig, base: &Path) -> ToolchainSettings {
    ToolchainSettings {
        frontend: config
            .frontend
            .as_ref()
            .map(|p| tool_path(base, p))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FRONTEND)),
        compiler: config
            .compiler
            .as_ref()
            .map(|p| tool_path(base, p))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPILER)),
        std: config
            .std
            .clone()
            .unwrap_or_else(|| DEFAULT_CXX_STD.to_string()),
        include_dirs: config
            .include_dirs
            .iter()
            .map(|d| anchor(base, d))
            .collect(),
        timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
    }
}

/// Apply environment variable overrides to toolchain settings
///
/// Recognised: REDLINE_FRONTEND, REDLINE_CXX, REDLINE_CXX_STD, REDLINE_TIMEOUT
fn apply_env_overrides(
    mut settings: ToolchainSettings,
    cwd: &Path,
) -> ConfigResult<ToolchainSettings> {
    if let Ok(frontend) = env::var("REDLINE_FRONTEND") {
        settings.frontend = tool_path(cwd, Path::new(&frontend));
    }

    if let Ok(compiler) = env::var("REDLINE_CXX") {
        settings.compiler = tool_path(cwd, Path::new(&compiler));
    }

    if let Ok(std) = env::var("REDLINE_CXX_STD") {
        if std.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "REDLINE_CXX_STD".to_string(),
                reason: "standard cannot be empty".to_string(),
            });
        }
        settings.std = std;
    }

    if let Ok(timeout) = env::var("REDLINE_TIMEOUT") {
        let secs = timeout
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "REDLINE_TIMEOUT".to_string(),
                reason: format!("expected a positive number of seconds, got '{}'", timeout),
            })?;
        settings.timeout = Duration::from_secs(secs);
    }

    Ok(settings)
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Bare tool names stay as-is for PATH lookup; anything with a directory
/// component is anchored.
fn tool_path(base: &Path, path: &Path) -> PathBuf {
    if path.components().count() > 1 {
        anchor(base, path)
    } else {
        path.to_path_buf()
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
