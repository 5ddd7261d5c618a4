//! Redline build pipeline
//!
//! Turns a redline entry module into C++ sources, objects or an executable:
//! - Import graph resolution with at-most-once parsing per module
//! - Header and implementation generation through the external front-end
//! - Object compilation (optionally parallel) and linking through a C++ toolchain
//! - A transient build directory that is cleaned up on every failure path
//!
//! The front-end and toolchain are traits so the pipeline can be driven by
//! in-process fakes.

pub mod ast;
pub mod build_dir;
pub mod builder;
pub mod cache;
pub mod error;
pub mod frontend;
pub mod module;
pub mod process;
pub mod resolver;
pub mod targets;
pub mod toolchain;

// Re-export main types
pub use ast::{Ast, Statement};
pub use build_dir::{BuildDirectory, BUILD_STAMP};
pub use builder::{BuildConfig, BuildOutcome, BuildStage, BuildStats, Builder};
pub use cache::ModuleCache;
pub use error::{
    BuildError, BuildResult, FatalEnvironmentError, FrontEndError, ResolutionError,
    ToolchainError,
};
pub use frontend::{FrontEnd, GenerateTarget, ProcessFrontEnd};
pub use module::{ModuleId, ModuleOutputs, SourceModule};
pub use resolver::{resolve_import, DependencyResolver, DEFAULT_MAX_DEPTH};
pub use targets::{ArtifactKind, BuildArtifact, BuildMode};
pub use toolchain::{CxxToolchain, Toolchain};

// Re-export configuration types for convenience
pub use redline_config::{Config, ConfigLoader, ResolvedProject};
