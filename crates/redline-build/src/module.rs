//! Source modules discovered during resolution
use crate::ast::Ast;
use std::path::{Path, PathBuf};

/// Index of a module in a [`ModuleCache`](crate::cache::ModuleCache)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) usize);

impl ModuleId {
    /// Position in cache insertion order
    pub fn index(self) -> usize {
        self.0
    }
}

/// One project file and everything the build learns about it
#[derive(Debug, Clone, PartialEq)]
pub struct SourceModule {
    /// Canonical path; the deduplication key
    pub path: PathBuf,
    /// File stem
    pub name: String,
    pub ast: Ast,
    /// Raw import references, in statement order
    pub imports: Vec<String>,
    /// Generated files, filled in as the pipeline progresses
    pub outputs: ModuleOutputs,
}

/// Locations of a module's generated and compiled files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleOutputs {
    pub header: Option<PathBuf>,
    pub implementation: Option<PathBuf>,
    pub object: Option<PathBuf>,
}

impl SourceModule {
    /// Create a module record from its canonical path and AST
    pub fn new(path: PathBuf, ast: Ast) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let imports = ast.imports().map(str::to_string).collect();

        Self {
            path,
            name,
            ast,
            imports,
            outputs: ModuleOutputs::default(),
        }
    }

    /// Directory imports of this module are resolved against
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }
}
