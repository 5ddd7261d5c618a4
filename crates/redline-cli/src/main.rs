use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use redline_build::BuildMode;
use std::path::PathBuf;

mod commands;
mod logging;

use logging::{LogFormat, Verbosity};

/// Redline build orchestrator.
///
/// Resolves a redline program's imports, generates C++ through the redline
/// front-end and compiles it with a native C++ toolchain.
///
/// EXAMPLES:
///     redline build                 Build the project around the current directory
///     redline build app.rl          Build a single file into an executable
///     redline parse app.rl          Only generate C++ headers and sources
///     redline lib src/util.rl       Compile every module to an object file
///
/// ENVIRONMENT VARIABLES:
///     REDLINE_FRONTEND  Front-end binary (default: redline-core)
///     REDLINE_CXX       C++ compiler (default: g++)
///     REDLINE_CXX_STD   C++ language standard (default: c++11)
///     REDLINE_TIMEOUT   Per-tool timeout in seconds (default: 120)
///     REDLINE_JSON      Set to 'true' for JSON summaries
///     REDLINE_LOG       Log filter directives (e.g. 'redline_build=debug')
#[derive(Parser)]
#[command(name = "redline")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an executable
    ///
    /// Uses the nearest redline.toml when one exists above PATH (or the
    /// current directory); otherwise PATH is built as a single file. The
    /// executable is named after the project and placed in its output directory.
    ///
    /// EXAMPLES:
    ///     redline build
    ///     redline build src/main.rl --cxx clang++
    #[command(visible_alias = "b")]
    Build {
        /// Source file or project directory
        path: Option<PathBuf>,
        #[command(flatten)]
        options: BuildOptions,
    },

    /// Generate C++ headers and implementations without compiling
    ///
    /// The generated files are left in the build directory.
    ///
    /// EXAMPLES:
    ///     redline parse main.rl
    ///     redline parse main.rl --build-dir gen
    #[command(visible_alias = "p")]
    Parse {
        /// Entry source file
        path: PathBuf,
        #[command(flatten)]
        options: BuildOptions,
    },

    /// Compile every module to a standalone object file
    ///
    /// EXAMPLES:
    ///     redline lib util.rl
    ///     redline lib util.rl --jobs 4
    Lib {
        /// Entry source file
        path: PathBuf,
        #[command(flatten)]
        options: BuildOptions,
    },
}

/// Flags shared by every build mode
#[derive(Args, Debug, Clone, Default)]
pub struct BuildOptions {
    /// Front-end binary
    #[arg(long, value_name = "BIN")]
    pub frontend: Option<PathBuf>,
    /// C++ compiler driver
    #[arg(long, value_name = "BIN")]
    pub cxx: Option<PathBuf>,
    /// Transient build directory
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<PathBuf>,
    /// Per-invocation timeout for external tools, in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
    /// Parallel object compilations in library mode
    #[arg(long, short = 'j', value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub jobs: Option<u64>,
    /// Verbose output
    #[arg(long, short = 'v')]
    pub verbose: bool,
    /// Quiet output (errors only)
    #[arg(long, short = 'q')]
    pub quiet: bool,
    /// JSON output
    #[arg(long, env = "REDLINE_JSON")]
    pub json: bool,
    /// Log format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl Commands {
    fn into_parts(self) -> (BuildMode, Option<PathBuf>, BuildOptions) {
        match self {
            Self::Build { path, options } => (BuildMode::Executable, path, options),
            Self::Parse { path, options } => (BuildMode::GenerateOnly, Some(path), options),
            Self::Lib { path, options } => (BuildMode::Library, Some(path), options),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mode, path, options) = cli.command.into_parts();

    logging::init(
        options.log_format,
        Verbosity::from_flags(options.verbose, options.quiet),
    );

    commands::build::run(mode, path.as_deref(), &options)
}
