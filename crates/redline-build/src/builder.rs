//! Build orchestration and pipeline management
use crate::build_dir::BuildDirectory;
use crate::cache::ModuleCache;
use crate::error::{BuildError, BuildResult, ToolchainError};
use crate::frontend::{FrontEnd, GenerateTarget};
use crate::module::ModuleId;
use crate::resolver::{DependencyResolver, DEFAULT_MAX_DEPTH};
use crate::targets::{BuildArtifact, BuildMode};
use crate::toolchain::Toolchain;

use rayon::prelude::*;
use redline_config::{Config, ResolvedProject, DEFAULT_BUILD_DIR};
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Pipeline stage of a [`Builder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStage {
    Idle,
    Resolving,
    Generating,
    Compiling,
    Linking,
    Done,
    Failed,
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "setup",
            Self::Resolving => "resolving",
            Self::Generating => "generating",
            Self::Compiling => "compiling",
            Self::Linking => "linking",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Build configuration
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub mode: BuildMode,
    /// Transient build directory; defaults to `<output_dir>/.redline-build`
    pub build_dir: Option<PathBuf>,
    /// Extra include directories, searched after the build and project dirs
    pub include_dirs: Vec<PathBuf>,
    /// Parallel object compilations in library mode
    pub jobs: usize,
    /// Import chain bound
    pub max_depth: usize,
}

impl BuildConfig {
    pub fn new(mode: BuildMode) -> Self {
        Self {
            mode,
            build_dir: None,
            include_dirs: Vec::new(),
            jobs: 1,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Take build directory, include directories and jobs from loaded settings
    pub fn from_config(mode: BuildMode, config: &Config) -> Self {
        Self::new(mode)
            .with_build_dir(config.build.build_dir.clone())
            .with_include_dirs(config.toolchain.include_dirs.clone())
            .with_jobs(config.build.jobs)
    }

    pub fn with_build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.build_dir = Some(build_dir.into());
        self
    }

    pub fn with_include_dirs(mut self, include_dirs: Vec<PathBuf>) -> Self {
        self.include_dirs = include_dirs;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Build directory used for `project`
    pub fn build_dir_for(&self, project: &ResolvedProject) -> PathBuf {
        self.build_dir
            .clone()
            .unwrap_or_else(|| project.output_dir.join(DEFAULT_BUILD_DIR))
    }
}

/// Build statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildStats {
    /// Distinct modules resolved
    pub modules: usize,
    #[serde(rename = "resolve_ms", serialize_with = "as_millis")]
    pub resolve_time: Duration,
    #[serde(rename = "generate_ms", serialize_with = "as_millis")]
    pub generate_time: Duration,
    #[serde(rename = "compile_ms", serialize_with = "as_millis")]
    pub compile_time: Duration,
    #[serde(rename = "link_ms", serialize_with = "as_millis")]
    pub link_time: Duration,
    #[serde(rename = "total_ms", serialize_with = "as_millis")]
    pub total_time: Duration,
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Result of a successful build
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    /// Project name
    pub name: String,
    pub mode: BuildMode,
    /// Canonical module paths in resolution order
    pub modules: Vec<PathBuf>,
    /// Files published into the output directory
    pub artifacts: Vec<BuildArtifact>,
    /// Directory holding generated sources (generate-only builds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_dir: Option<PathBuf>,
    pub stats: BuildStats,
}

/// Main builder for orchestrating builds
///
/// Sequences resolution, generation and the toolchain for one build mode.
/// The transient build directory is removed on every exit path except a
/// successful generate-only build.
pub struct Builder<F, T> {
    frontend: F,
    toolchain: T,
    config: BuildConfig,
    stage: BuildStage,
}

impl<F: FrontEnd, T: Toolchain> Builder<F, T> {
    pub fn new(frontend: F, toolchain: T, config: BuildConfig) -> Self {
        Self {
            frontend,
            toolchain,
            config,
            stage: BuildStage::Idle,
        }
    }

    /// Stage reached by the last build; `Done` or `Failed` once it returns
    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// Execute the build
    pub fn build(&mut self, project: &ResolvedProject) -> BuildResult<BuildOutcome> {
        self.stage = BuildStage::Idle;
        let result = self.run(project);
        match &result {
            Ok(outcome) => {
                info!(
                    project = %outcome.name,
                    mode = %outcome.mode,
                    modules = outcome.stats.modules,
                    elapsed_ms = outcome.stats.total_time.as_millis() as u64,
                    "build finished"
                );
                self.stage = BuildStage::Done;
            }
            Err(e) => {
                debug!(stage = %e.stage(), error = %e, "build failed");
                self.stage = BuildStage::Failed;
            }
        }
        result
    }

    fn run(&mut self, project: &ResolvedProject) -> BuildResult<BuildOutcome> {
        let started = Instant::now();
        let mode = self.config.mode;

        self.check_environment()?;

        let dir_path = self.config.build_dir_for(project);
        validate_build_dir(&dir_path, project)?;
        let build_dir = BuildDirectory::create(&dir_path)
            .map_err(|e| BuildError::io(BuildStage::Idle, &dir_path, e))?;
        info!(
            project = %project.name,
            %mode,
            entry = %project.entry.display(),
            build_dir = %dir_path.display(),
            "starting build"
        );

        let mut stats = BuildStats::default();

        self.enter(BuildStage::Resolving);
        let timer = Instant::now();
        let mut cache = ModuleCache::new();
        DependencyResolver::new(&self.frontend)
            .with_max_depth(self.config.max_depth)
            .resolve(&project.entry, &mut cache)?;
        stats.modules = cache.len();
        stats.resolve_time = timer.elapsed();

        self.enter(BuildStage::Generating);
        let timer = Instant::now();
        generate_sources(&self.frontend, &mut cache, build_dir.path())?;
        stats.generate_time = timer.elapsed();

        let include_dirs = self.include_dirs(build_dir.path(), project);
        let artifacts = match mode {
            BuildMode::GenerateOnly => Vec::new(),
            BuildMode::Library => {
                self.enter(BuildStage::Compiling);
                let timer = Instant::now();
                self.compile_objects(&mut cache, &include_dirs)?;
                let artifacts = publish_objects(&cache, &project.output_dir)?;
                stats.compile_time = timer.elapsed();
                artifacts
            }
            BuildMode::Executable => {
                self.enter(BuildStage::Linking);
                let timer = Instant::now();
                let artifact =
                    self.link_executable(&cache, build_dir.path(), project, &include_dirs)?;
                stats.link_time = timer.elapsed();
                vec![artifact]
            }
        };
        let generated_dir = mode.keeps_build_dir().then(|| build_dir.keep());

        stats.total_time = started.elapsed();
        Ok(BuildOutcome {
            name: project.name.clone(),
            mode,
            modules: cache.paths(),
            artifacts,
            generated_dir,
            stats,
        })
    }

    fn enter(&mut self, stage: BuildStage) {
        info!(%stage, "entering stage");
        self.stage = stage;
    }

    /// Fail before any module work if a required tool is missing
    fn check_environment(&self) -> BuildResult<()> {
        self.frontend.check_available()?;
        if self.config.mode.requires_toolchain() {
            self.toolchain.check_available()?;
        }
        Ok(())
    }

    /// Build directory, then project root, then configured directories
    fn include_dirs(&self, build_dir: &Path, project: &ResolvedProject) -> Vec<PathBuf> {
        let mut dirs = vec![build_dir.to_path_buf(), project.root.clone()];
        dirs.extend(self.config.include_dirs.iter().cloned());
        dirs
    }

    /// Compile every implementation to `<stem>.o` next to it
    fn compile_objects(&self, cache: &mut ModuleCache, include_dirs: &[PathBuf]) -> BuildResult<()> {
        let units: Vec<(ModuleId, PathBuf, PathBuf)> = cache
            .ids()
            .filter_map(|id| {
                cache[id]
                    .outputs
                    .implementation
                    .as_ref()
                    .map(|source| (id, source.clone(), source.with_extension("o")))
            })
            .collect();

        if self.config.jobs > 1 && units.len() > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.jobs)
                .build()
                .map_err(|e| BuildError::WorkerPool(e.to_string()))?;
            let toolchain = &self.toolchain;
            let results: Vec<Result<(), ToolchainError>> = pool.install(|| {
                units
                    .par_iter()
                    .map(|(_, source, object)| toolchain.compile_object(source, object, include_dirs))
                    .collect()
            });

            for ((id, _, _), result) in units.iter().zip(results) {
                result.map_err(|source| BuildError::Compile {
                    module: cache[*id].path.clone(),
                    source,
                })?;
            }
        } else {
            for (id, source, object) in &units {
                self.toolchain
                    .compile_object(source, object, include_dirs)
                    .map_err(|source| BuildError::Compile {
                        module: cache[*id].path.clone(),
                        source,
                    })?;
            }
        }

        for (id, _, object) in units {
            cache.module_mut(id).outputs.object = Some(object);
        }
        Ok(())
    }

    /// Link all implementations inside the build directory, then publish
    fn link_executable(
        &self,
        cache: &ModuleCache,
        build_dir: &Path,
        project: &ResolvedProject,
        include_dirs: &[PathBuf],
    ) -> BuildResult<BuildArtifact> {
        let sources: Vec<PathBuf> = cache
            .iter()
            .filter_map(|m| m.outputs.implementation.clone())
            .collect();
        let file_name = format!("{}{}", project.name, std::env::consts::EXE_SUFFIX);
        let staged = build_dir.join(&file_name);

        self.toolchain
            .link(&sources, &staged, include_dirs)
            .map_err(|source| BuildError::Link {
                name: project.name.clone(),
                source,
            })?;

        ensure_dir(&project.output_dir, BuildStage::Linking)?;
        let dest = project.output_dir.join(&file_name);
        publish(&staged, &dest).map_err(|e| BuildError::io(BuildStage::Linking, &dest, e))?;
        debug!(artifact = %dest.display(), "published executable");

        Ok(BuildArtifact::executable(dest))
    }
}

/// Write `<stem>.hpp` and `<stem>.cpp` for every module in cache order
fn generate_sources(
    frontend: &dyn FrontEnd,
    cache: &mut ModuleCache,
    dir: &Path,
) -> BuildResult<()> {
    let stems = unique_stems(cache);
    let ids: Vec<ModuleId> = cache.ids().collect();

    for (id, stem) in ids.into_iter().zip(stems) {
        for target in [GenerateTarget::Header, GenerateTarget::Implementation] {
            let module = &cache[id];
            debug!(module = %module.path.display(), target = target.name(), "generating");
            let text = frontend
                .generate(module, target)
                .map_err(|source| BuildError::Generation {
                    module: module.path.clone(),
                    source,
                })?;

            let path = dir.join(format!("{}.{}", stem, target.extension()));
            fs::write(&path, text).map_err(|e| BuildError::io(BuildStage::Generating, &path, e))?;

            let outputs = &mut cache.module_mut(id).outputs;
            match target {
                GenerateTarget::Header => outputs.header = Some(path),
                GenerateTarget::Implementation => outputs.implementation = Some(path),
            }
        }
    }
    Ok(())
}

/// Output stems in cache order; a repeated stem gets a `_N` suffix
fn unique_stems(cache: &ModuleCache) -> Vec<String> {
    let mut used = HashSet::new();
    cache
        .iter()
        .map(|module| {
            let mut stem = module.name.clone();
            let mut n = 1;
            while !used.insert(stem.clone()) {
                stem = format!("{}_{}", module.name, n);
                n += 1;
            }
            if stem != module.name {
                warn!(
                    module = %module.path.display(),
                    stem = %stem,
                    "module name already taken, renaming generated files"
                );
            }
            stem
        })
        .collect()
}

/// Move every compiled object into the output directory
fn publish_objects(cache: &ModuleCache, output_dir: &Path) -> BuildResult<Vec<BuildArtifact>> {
    ensure_dir(output_dir, BuildStage::Compiling)?;

    let mut artifacts = Vec::new();
    for module in cache.iter() {
        if let Some(object) = &module.outputs.object {
            let dest = output_dir.join(object.file_name().unwrap_or_default());
            publish(object, &dest).map_err(|e| BuildError::io(BuildStage::Compiling, &dest, e))?;
            debug!(artifact = %dest.display(), "published object");
            artifacts.push(BuildArtifact::object(dest, module.path.clone()));
        }
    }
    Ok(artifacts)
}

fn ensure_dir(dir: &Path, stage: BuildStage) -> BuildResult<()> {
    fs::create_dir_all(dir).map_err(|e| BuildError::io(stage, dir, e))
}

/// Move `from` to `to`. Across filesystems the file is copied to a sibling
/// `.partial` name first so `to` only ever holds a complete file.
fn publish(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    let mut partial = to.as_os_str().to_os_string();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    fs::copy(from, &partial)?;
    fs::rename(&partial, to).map_err(|e| {
        let _ = fs::remove_file(&partial);
        e
    })
}

/// Reject build directories whose removal would take project files with them
fn validate_build_dir(dir: &Path, project: &ResolvedProject) -> BuildResult<()> {
    let invalid = |reason: String| BuildError::InvalidBuildDir {
        path: dir.to_path_buf(),
        reason,
    };

    if dir.exists() && !dir.is_dir() {
        return Err(invalid("exists and is not a directory".to_string()));
    }

    let resolved = normalize(dir);
    let protected = [
        ("entry module", &project.entry),
        ("output directory", &project.output_dir),
        ("project root", &project.root),
    ];
    for (what, path) in protected {
        if normalize(path).starts_with(&resolved) {
            return Err(invalid(format!("would remove the {} {}", what, path.display())));
        }
    }
    if !BuildDirectory::is_reusable(dir) {
        return Err(invalid("contains files not created by redline".to_string()));
    }
    Ok(())
}

/// Canonicalize the longest existing prefix of `path`
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => normalize(parent).join(name),
        _ => path.to_path_buf(),
    }
}
