/// Build modes and artifact records
use serde::Serialize;
use std::path::PathBuf;

/// What a build produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
    /// Emit headers and implementations only
    GenerateOnly,
    /// Compile each module to a standalone object
    Library,
    /// Link every module into one executable
    Executable,
}

impl BuildMode {
    /// Whether this mode invokes the native toolchain
    pub fn requires_toolchain(&self) -> bool {
        !matches!(self, Self::GenerateOnly)
    }

    /// Whether a successful build leaves the build directory in place
    pub fn keeps_build_dir(&self) -> bool {
        matches!(self, Self::GenerateOnly)
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GenerateOnly => write!(f, "generate-only"),
            Self::Library => write!(f, "library"),
            Self::Executable => write!(f, "executable"),
        }
    }
}

/// Kind of published artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Object,
    Executable,
}

/// A file published into the output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildArtifact {
    pub kind: ArtifactKind,
    /// Final location
    pub path: PathBuf,
    /// Source module for objects; `None` for the linked executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<PathBuf>,
}

impl BuildArtifact {
    pub fn object(path: PathBuf, module: PathBuf) -> Self {
        Self {
            kind: ArtifactKind::Object,
            path,
            module: Some(module),
        }
    }

    pub fn executable(path: PathBuf) -> Self {
        Self {
            kind: ArtifactKind::Executable,
            path,
            module: None,
        }
    }
}
