//! Build command - drive the pipeline in any of the three modes

use crate::BuildOptions;
use anyhow::{Context, Result};
use redline_build::{
    ArtifactKind, BuildConfig, BuildError, BuildMode, BuildOutcome, Builder, CxxToolchain,
    ProcessFrontEnd,
};
use redline_config::{Config, ConfigLoader};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Run a build of `path` in `mode`
pub fn run(mode: BuildMode, path: Option<&Path>, options: &BuildOptions) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let mut config = ConfigLoader::new()
        .load(path, &cwd)
        .context("Failed to load project configuration")?;
    apply_overrides(&mut config, options, &cwd);

    debug!(
        entry = %config.project.entry.display(),
        descriptor = ?config.descriptor,
        frontend = %config.toolchain.frontend.display(),
        compiler = %config.toolchain.compiler.display(),
        "resolved configuration"
    );

    let timeout = Some(config.toolchain.timeout);
    let frontend = ProcessFrontEnd::new(&config.toolchain.frontend).with_timeout(timeout);
    let toolchain = CxxToolchain::new(&config.toolchain.compiler, config.toolchain.std.clone())
        .with_timeout(timeout);
    let mut builder = Builder::new(frontend, toolchain, BuildConfig::from_config(mode, &config));

    match builder.build(&config.project) {
        Ok(outcome) => {
            if options.json {
                println!("{}", success_json(&outcome)?);
            } else if !options.quiet {
                print_summary(&outcome);
            }
            Ok(())
        }
        Err(err) => {
            if options.json {
                println!("{}", failure_json(mode, &err));
            }
            let stage = err.stage();
            Err(anyhow::Error::new(err).context(format!("{} build failed during {}", mode, stage)))
        }
    }
}

/// CLI flags override everything the loader resolved
fn apply_overrides(config: &mut Config, options: &BuildOptions, cwd: &Path) {
    if let Some(frontend) = &options.frontend {
        config.toolchain.frontend = frontend.clone();
    }
    if let Some(cxx) = &options.cxx {
        config.toolchain.compiler = cxx.clone();
    }
    if let Some(build_dir) = &options.build_dir {
        config.build.build_dir = cwd.join(build_dir);
    }
    if let Some(secs) = options.timeout {
        config.toolchain.timeout = Duration::from_secs(secs);
    }
    if let Some(jobs) = options.jobs {
        config.build.jobs = jobs as usize;
    }
}

fn success_json(outcome: &BuildOutcome) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(outcome).context("Failed to serialize build summary")?;
    value["success"] = serde_json::Value::Bool(true);
    Ok(value)
}

fn failure_json(mode: BuildMode, err: &BuildError) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "mode": mode,
        "stage": err.stage(),
        "error": err.to_string(),
    })
}

fn print_summary(outcome: &BuildOutcome) {
    let secs = outcome.stats.total_time.as_secs_f64();
    match outcome.mode {
        BuildMode::GenerateOnly => {
            println!(
                "Generated {} module(s) for '{}' in {:.2}s",
                outcome.stats.modules, outcome.name, secs
            );
            if let Some(dir) = &outcome.generated_dir {
                println!("  Output: {}", dir.display());
            }
        }
        BuildMode::Library | BuildMode::Executable => {
            println!(
                "Built '{}' ({}) from {} module(s) in {:.2}s",
                outcome.name, outcome.mode, outcome.stats.modules, secs
            );
            for artifact in &outcome.artifacts {
                let label = match artifact.kind {
                    ArtifactKind::Object => "Object",
                    ArtifactKind::Executable => "Executable",
                };
                println!("  {}: {}", label, artifact.path.display());
            }
        }
    }
}
