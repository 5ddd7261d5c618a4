//! Module cache: arena of resolved modules keyed by canonical path
//!
//! One cache lives for exactly one build. A path is inserted at most once;
//! iteration follows insertion order, which is also generation order.

use crate::module::{ModuleId, SourceModule};
use std::collections::HashMap;
use std::ops::Index;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModuleState {
    /// Inserted, imports still being walked
    InProgress,
    Resolved,
}

#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: Vec<SourceModule>,
    states: Vec<ModuleState>,
    index: HashMap<PathBuf, ModuleId>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly parsed module in the in-progress state.
    ///
    /// If the path is already present the existing id is returned and the
    /// new record is discarded.
    pub fn insert_in_progress(&mut self, module: SourceModule) -> ModuleId {
        if let Some(&id) = self.index.get(&module.path) {
            return id;
        }
        let id = ModuleId(self.modules.len());
        self.index.insert(module.path.clone(), id);
        self.modules.push(module);
        self.states.push(ModuleState::InProgress);
        id
    }

    /// Mark a module's imports as fully walked
    pub fn mark_resolved(&mut self, id: ModuleId) {
        self.states[id.0] = ModuleState::Resolved;
    }

    /// Whether the module is on the active traversal path
    pub fn is_in_progress(&self, id: ModuleId) -> bool {
        self.states[id.0] == ModuleState::InProgress
    }

    pub fn id_of(&self, path: &Path) -> Option<ModuleId> {
        self.index.get(path).copied()
    }

    pub fn get(&self, path: &Path) -> Option<&SourceModule> {
        self.id_of(path).map(|id| &self.modules[id.0])
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.index.contains_key(path)
    }

    pub fn module(&self, id: ModuleId) -> &SourceModule {
        &self.modules[id.0]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut SourceModule {
        &mut self.modules[id.0]
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Module ids in insertion order
    pub fn ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.modules.len()).map(ModuleId)
    }

    /// Modules in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &SourceModule> {
        self.modules.iter()
    }

    /// Canonical paths in insertion order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.modules.iter().map(|m| m.path.clone()).collect()
    }
}

impl Index<ModuleId> for ModuleCache {
    type Output = SourceModule;

    fn index(&self, id: ModuleId) -> &SourceModule {
        self.module(id)
    }
}
