//! Import graph resolution
//!
//! Walks import edges depth-first from an entry module, extracting each
//! distinct module's AST exactly once and recording it in the
//! [`ModuleCache`]. A module is inserted before its imports are walked, so a
//! module reached again while still on the traversal path is a cycle rather
//! than an endless re-parse.

use crate::cache::ModuleCache;
use crate::error::ResolutionError;
use crate::frontend::FrontEnd;
use crate::module::{ModuleId, SourceModule};
use redline_config::SOURCE_EXTENSION;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default bound on import chain length
pub const DEFAULT_MAX_DEPTH: usize = 256;

pub struct DependencyResolver<'a> {
    frontend: &'a dyn FrontEnd,
    max_depth: usize,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(frontend: &'a dyn FrontEnd) -> Self {
        Self {
            frontend,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Bound the import chain length
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Resolve `entry` and everything it transitively imports into `cache`.
    ///
    /// Returns the entry module's id. On error the cache may hold a partial
    /// graph, which must not be used for generation.
    pub fn resolve(&self, entry: &Path, cache: &mut ModuleCache) -> Result<ModuleId, ResolutionError> {
        let canonical = entry
            .canonicalize()
            .map_err(|error| ResolutionError::EntryNotFound {
                path: entry.to_path_buf(),
                error,
            })?;

        let mut stack = Vec::new();
        self.visit(canonical, cache, &mut stack)
    }

    fn visit(
        &self,
        path: PathBuf,
        cache: &mut ModuleCache,
        stack: &mut Vec<PathBuf>,
    ) -> Result<ModuleId, ResolutionError> {
        if let Some(id) = cache.id_of(&path) {
            if cache.is_in_progress(id) {
                let start = stack.iter().position(|p| *p == path).unwrap_or(0);
                let mut cycle = stack[start..].to_vec();
                cycle.push(path);
                return Err(ResolutionError::CyclicImport { cycle });
            }
            return Ok(id);
        }

        if stack.len() >= self.max_depth {
            return Err(ResolutionError::DepthExceeded {
                path,
                limit: self.max_depth,
            });
        }

        debug!(path = %path.display(), depth = stack.len(), "extracting AST");
        let ast = self
            .frontend
            .extract_ast(&path)
            .map_err(|source| ResolutionError::FrontEnd {
                path: path.clone(),
                source,
            })?;

        let module = SourceModule::new(path.clone(), ast);
        let imports = module.imports.clone();
        let dir = module.directory().to_path_buf();
        let id = cache.insert_in_progress(module);

        stack.push(path);
        for import in &imports {
            let target = resolve_import(&dir, import).ok_or_else(|| {
                ResolutionError::UnresolvedImport {
                    importer: cache[id].path.clone(),
                    import: import.clone(),
                }
            })?;
            self.visit(target, cache, stack)?;
        }
        stack.pop();

        cache.mark_resolved(id);
        Ok(id)
    }
}

/// Resolve an import reference against the importing module's directory.
///
/// References without an extension get `.rl` appended. Returns the canonical
/// path of an existing file, or `None`.
pub fn resolve_import(importer_dir: &Path, import: &str) -> Option<PathBuf> {
    if import.trim().is_empty() {
        return None;
    }
    let mut candidate = importer_dir.join(import);
    if candidate.extension().is_none() {
        candidate.set_extension(SOURCE_EXTENSION);
    }
    candidate.canonicalize().ok().filter(|p| p.is_file())
}
