//! Integration tests for the build pipeline
//!
//! Drives the builder with in-process fakes over real project files. The fake
//! front-end treats every `import <path>` line of a source file as an import.

use pretty_assertions::assert_eq;
use redline_build::{
    Ast, BuildConfig, BuildError, BuildMode, BuildStage, Builder, FatalEnvironmentError,
    FrontEnd, FrontEndError, GenerateTarget, ResolutionError, ResolvedProject, SourceModule,
    Statement, Toolchain, ToolchainError, BUILD_STAMP,
};
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

#[derive(Default)]
struct FakeFrontEnd {
    unavailable: bool,
    /// (file name, mode) that exits nonzero
    fail_on: Option<(&'static str, &'static str)>,
    calls: Mutex<Vec<(String, &'static str)>>,
}

impl FakeFrontEnd {
    fn failing(file: &'static str, mode: &'static str) -> Self {
        Self {
            fail_on: Some((file, mode)),
            ..Self::default()
        }
    }

    fn record(&self, path: &Path, mode: &'static str) -> Result<(), FrontEndError> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        self.calls.lock().unwrap().push((name.clone(), mode));
        if self.fail_on == Some((name.as_str(), mode)) {
            return Err(FrontEndError::Failed {
                path: path.to_path_buf(),
                mode,
                status: "exit status: 1".to_string(),
                stderr: format!("Error: cannot {} {}", mode, name),
            });
        }
        Ok(())
    }

    fn extractions_of(&self, file: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, mode)| name == file && *mode == "ast")
            .count()
    }

    fn extraction_order(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, mode)| *mode == "ast")
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl FrontEnd for FakeFrontEnd {
    fn check_available(&self) -> Result<(), FatalEnvironmentError> {
        if self.unavailable {
            return Err(FatalEnvironmentError {
                tool: "front-end",
                program: PathBuf::from("redline-core"),
            });
        }
        Ok(())
    }

    fn extract_ast(&self, path: &Path) -> Result<Ast, FrontEndError> {
        self.record(path, "ast")?;
        let source = fs::read_to_string(path).unwrap();
        let statements = source
            .lines()
            .filter_map(|line| line.strip_prefix("import "))
            .map(|import| Statement::Import {
                path: import.trim().to_string(),
            })
            .collect();
        Ok(Ast { statements })
    }

    fn generate(&self, module: &SourceModule, target: GenerateTarget) -> Result<String, FrontEndError> {
        self.record(&module.path, target.name())?;
        Ok(format!("// {} of {}\n", target.name(), module.name))
    }
}

#[derive(Default)]
struct FakeToolchain {
    unavailable: bool,
    fail_compile: Option<&'static str>,
    fail_link: bool,
    compiles: Mutex<Vec<PathBuf>>,
    links: Mutex<Vec<Vec<PathBuf>>>,
}

impl FakeToolchain {
    fn compiled(&self) -> Vec<String> {
        self.compiles
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    fn link_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }
}

impl Toolchain for FakeToolchain {
    fn check_available(&self) -> Result<(), FatalEnvironmentError> {
        if self.unavailable {
            return Err(FatalEnvironmentError {
                tool: "compiler",
                program: PathBuf::from("g++"),
            });
        }
        Ok(())
    }

    fn compile_object(&self, source: &Path, output: &Path, _: &[PathBuf]) -> Result<(), ToolchainError> {
        self.compiles.lock().unwrap().push(source.to_path_buf());
        if self.fail_compile.is_some_and(|f| source.ends_with(f)) {
            return Err(ToolchainError::Failed {
                output: output.to_path_buf(),
                status: "exit status: 1".to_string(),
                stderr: "error: expected ';'".to_string(),
            });
        }
        fs::write(output, "object").unwrap();
        Ok(())
    }

    fn link(&self, sources: &[PathBuf], output: &Path, _: &[PathBuf]) -> Result<(), ToolchainError> {
        self.links.lock().unwrap().push(sources.to_vec());
        if self.fail_link {
            return Err(ToolchainError::Failed {
                output: output.to_path_buf(),
                status: "exit status: 1".to_string(),
                stderr: "undefined reference to `main'".to_string(),
            });
        }
        fs::write(output, "executable").unwrap();
        Ok(())
    }
}

struct Fixture {
    _temp: TempDir,
    root: PathBuf,
    project: ResolvedProject,
}

impl Fixture {
    /// Project with `main.rl` as entry and artifacts under `out/`
    fn new(files: &[(&str, &str)]) -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        for (name, content) in files {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let project = ResolvedProject {
            entry: root.join("main.rl"),
            name: "app".to_string(),
            output_dir: root.join("out"),
            root: root.clone(),
        };
        Self {
            _temp: temp,
            root,
            project,
        }
    }

    fn build_dir(&self) -> PathBuf {
        self.project.output_dir.join(".redline-build")
    }

    fn output_files(&self) -> Vec<String> {
        list(&self.project.output_dir)
            .into_iter()
            .filter(|n| n != ".redline-build")
            .collect()
    }
}

fn list(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .filter(|n| n != BUILD_STAMP)
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn builder(mode: BuildMode, frontend: FakeFrontEnd, toolchain: FakeToolchain) -> Builder<FakeFrontEnd, FakeToolchain> {
    Builder::new(frontend, toolchain, BuildConfig::new(mode))
}

fn diamond() -> Fixture {
    Fixture::new(&[
        ("main.rl", "import b.rl\nimport c.rl\n"),
        ("b.rl", "import d.rl\n"),
        ("c.rl", "import d.rl\n"),
        ("d.rl", ""),
    ])
}

#[test]
fn test_diamond_extracts_shared_module_once() {
    let fixture = diamond();
    let mut builder = builder(BuildMode::GenerateOnly, FakeFrontEnd::default(), FakeToolchain::default());

    let outcome = builder.build(&fixture.project).unwrap();

    assert_eq!(builder.frontend().extractions_of("d.rl"), 1);
    assert_eq!(outcome.stats.modules, 4);
    assert_eq!(
        outcome.modules,
        vec![
            fixture.root.join("main.rl"),
            fixture.root.join("b.rl"),
            fixture.root.join("d.rl"),
            fixture.root.join("c.rl"),
        ]
    );
}

#[test]
fn test_depth_first_insertion_order() {
    let fixture = Fixture::new(&[
        ("main.rl", "import b\nimport c\n"),
        ("b.rl", "import d\n"),
        ("c.rl", ""),
        ("d.rl", ""),
    ]);
    let mut builder = builder(BuildMode::GenerateOnly, FakeFrontEnd::default(), FakeToolchain::default());

    builder.build(&fixture.project).unwrap();

    assert_eq!(
        builder.frontend().extraction_order(),
        vec!["main.rl", "b.rl", "d.rl", "c.rl"]
    );
}

#[test]
fn test_unresolved_import_fails_closed() {
    let fixture = Fixture::new(&[("main.rl", "import b.rl\n"), ("b.rl", "import missing.rl\n")]);
    let mut builder = builder(BuildMode::Executable, FakeFrontEnd::default(), FakeToolchain::default());

    let err = builder.build(&fixture.project).unwrap_err();

    match &err {
        BuildError::Resolution(ResolutionError::UnresolvedImport { importer, import }) => {
            assert_eq!(importer, &fixture.root.join("b.rl"));
            assert_eq!(import, "missing.rl");
        }
        other => panic!("expected UnresolvedImport, got {:?}", other),
    }
    assert_eq!(err.stage(), BuildStage::Resolving);
    assert_eq!(builder.stage(), BuildStage::Failed);
    assert!(!fixture.build_dir().exists());
    assert!(fixture.output_files().is_empty());
    assert_eq!(builder.toolchain().link_count(), 0);
}

#[rstest]
#[case::self_import(&[("main.rl", "import main.rl\n")])]
#[case::mutual(&[("main.rl", "import b.rl\n"), ("b.rl", "import main.rl\n")])]
#[case::indirect(&[("main.rl", "import b.rl\n"), ("b.rl", "import c.rl\n"), ("c.rl", "import b.rl\n")])]
fn test_cycles_are_reported(#[case] files: &[(&str, &str)]) {
    let fixture = Fixture::new(files);
    let mut builder = builder(BuildMode::GenerateOnly, FakeFrontEnd::default(), FakeToolchain::default());

    let err = builder.build(&fixture.project).unwrap_err();

    assert!(
        matches!(err, BuildError::Resolution(ResolutionError::CyclicImport { .. })),
        "got {:?}",
        err
    );
    for (name, _) in files {
        assert!(builder.frontend().extractions_of(name) <= 1);
    }
    assert!(!fixture.build_dir().exists());
}

#[rstest]
#[case::parse_failure(FakeFrontEnd::failing("b.rl", "ast"), FakeToolchain::default(), BuildStage::Resolving)]
#[case::header_failure(FakeFrontEnd::failing("b.rl", "header"), FakeToolchain::default(), BuildStage::Generating)]
#[case::implementation_failure(
    FakeFrontEnd::failing("main.rl", "implementation"),
    FakeToolchain::default(),
    BuildStage::Generating
)]
#[case::link_failure(
    FakeFrontEnd::default(),
    FakeToolchain { fail_link: true, ..FakeToolchain::default() },
    BuildStage::Linking
)]
fn test_executable_failures_leave_no_trace(
    #[case] frontend: FakeFrontEnd,
    #[case] toolchain: FakeToolchain,
    #[case] stage: BuildStage,
) {
    let fixture = Fixture::new(&[("main.rl", "import b.rl\n"), ("b.rl", "")]);
    let mut builder = builder(BuildMode::Executable, frontend, toolchain);

    let err = builder.build(&fixture.project).unwrap_err();

    assert_eq!(err.stage(), stage);
    assert!(!fixture.build_dir().exists());
    assert!(fixture.output_files().is_empty());
}

#[test]
fn test_front_end_diagnostic_reaches_error() {
    let fixture = Fixture::new(&[("main.rl", "")]);
    let mut builder = builder(
        BuildMode::GenerateOnly,
        FakeFrontEnd::failing("main.rl", "header"),
        FakeToolchain::default(),
    );

    let err = builder.build(&fixture.project).unwrap_err();
    let message = err.to_string();

    assert!(message.contains("main.rl"));
    assert!(message.contains("Error: cannot header main.rl"));
    assert!(!fixture.build_dir().exists());
}

#[test]
fn test_generate_only_keeps_sources() {
    let fixture = diamond();
    let mut builder = builder(BuildMode::GenerateOnly, FakeFrontEnd::default(), FakeToolchain::default());

    let outcome = builder.build(&fixture.project).unwrap();

    assert_eq!(builder.stage(), BuildStage::Done);
    assert_eq!(outcome.generated_dir.as_deref(), Some(fixture.build_dir().as_path()));
    assert_eq!(
        list(&fixture.build_dir()),
        vec!["b.cpp", "b.hpp", "c.cpp", "c.hpp", "d.cpp", "d.hpp", "main.cpp", "main.hpp"]
    );
    assert_eq!(
        fs::read_to_string(fixture.build_dir().join("d.hpp")).unwrap(),
        "// header of d\n"
    );
    assert!(outcome.artifacts.is_empty());
    assert!(builder.toolchain().compiled().is_empty());
    assert_eq!(builder.toolchain().link_count(), 0);
}

#[test]
fn test_generate_only_does_not_need_toolchain() {
    let fixture = Fixture::new(&[("main.rl", "")]);
    let toolchain = FakeToolchain {
        unavailable: true,
        ..FakeToolchain::default()
    };
    let mut builder = builder(BuildMode::GenerateOnly, FakeFrontEnd::default(), toolchain);

    builder.build(&fixture.project).unwrap();
}

#[test]
fn test_colliding_stems_get_suffix() {
    let fixture = Fixture::new(&[("main.rl", "import lib/main.rl\n"), ("lib/main.rl", "")]);
    let mut builder = builder(BuildMode::GenerateOnly, FakeFrontEnd::default(), FakeToolchain::default());

    builder.build(&fixture.project).unwrap();

    assert_eq!(
        list(&fixture.build_dir()),
        vec!["main.cpp", "main.hpp", "main_1.cpp", "main_1.hpp"]
    );
}

#[test]
fn test_library_compiles_but_never_links() {
    let fixture = diamond();
    let mut builder = builder(BuildMode::Library, FakeFrontEnd::default(), FakeToolchain::default());

    let outcome = builder.build(&fixture.project).unwrap();

    assert_eq!(builder.toolchain().compiled(), vec!["main.cpp", "b.cpp", "d.cpp", "c.cpp"]);
    assert_eq!(builder.toolchain().link_count(), 0);
    assert_eq!(fixture.output_files(), vec!["b.o", "c.o", "d.o", "main.o"]);
    assert_eq!(outcome.artifacts.len(), 4);
    assert_eq!(outcome.artifacts[0].module.as_deref(), Some(fixture.root.join("main.rl").as_path()));
    assert!(!fixture.build_dir().exists());
}

#[test]
fn test_parallel_library_keeps_insertion_order() {
    let fixture = diamond();
    let mut builder = Builder::new(
        FakeFrontEnd::default(),
        FakeToolchain::default(),
        BuildConfig::new(BuildMode::Library).with_jobs(4),
    );

    let outcome = builder.build(&fixture.project).unwrap();

    let published: Vec<PathBuf> = outcome.artifacts.iter().map(|a| a.path.clone()).collect();
    assert_eq!(
        published,
        ["main.o", "b.o", "d.o", "c.o"]
            .iter()
            .map(|n| fixture.project.output_dir.join(n))
            .collect::<Vec<_>>()
    );
}

#[rstest]
#[case::sequential(1)]
#[case::parallel(3)]
fn test_library_failure_publishes_nothing(#[case] jobs: usize) {
    let fixture = diamond();
    let toolchain = FakeToolchain {
        fail_compile: Some("c.cpp"),
        ..FakeToolchain::default()
    };
    let mut builder = Builder::new(
        FakeFrontEnd::default(),
        toolchain,
        BuildConfig::new(BuildMode::Library).with_jobs(jobs),
    );

    let err = builder.build(&fixture.project).unwrap_err();

    match err {
        BuildError::Compile { module, .. } => assert_eq!(module, fixture.root.join("c.rl")),
        other => panic!("expected Compile, got {:?}", other),
    }
    assert!(fixture.output_files().is_empty());
    assert!(!fixture.build_dir().exists());
}

#[test]
fn test_executable_is_named_after_project() {
    let fixture = diamond();
    let mut builder = builder(BuildMode::Executable, FakeFrontEnd::default(), FakeToolchain::default());

    let outcome = builder.build(&fixture.project).unwrap();

    let exe = format!("app{}", std::env::consts::EXE_SUFFIX);
    assert_eq!(fixture.output_files(), vec![exe.clone()]);
    assert_eq!(outcome.artifacts.len(), 1);
    assert_eq!(outcome.artifacts[0].path, fixture.project.output_dir.join(&exe));
    assert!(builder.toolchain().compiled().is_empty());

    let links = builder.toolchain().links.lock().unwrap().clone();
    assert_eq!(links.len(), 1);
    let linked: Vec<String> = links[0]
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(linked, vec!["main.cpp", "b.cpp", "d.cpp", "c.cpp"]);
    assert!(!fixture.build_dir().exists());
}

#[rstest]
#[case::front_end(BuildMode::GenerateOnly, true, false)]
#[case::compiler(BuildMode::Executable, false, true)]
#[case::compiler_library(BuildMode::Library, false, true)]
fn test_missing_tool_fails_before_any_work(
    #[case] mode: BuildMode,
    #[case] frontend_missing: bool,
    #[case] compiler_missing: bool,
) {
    let fixture = Fixture::new(&[("main.rl", "")]);
    let frontend = FakeFrontEnd {
        unavailable: frontend_missing,
        ..FakeFrontEnd::default()
    };
    let toolchain = FakeToolchain {
        unavailable: compiler_missing,
        ..FakeToolchain::default()
    };
    let mut builder = builder(mode, frontend, toolchain);

    let err = builder.build(&fixture.project).unwrap_err();

    assert!(matches!(err, BuildError::Environment(_)));
    assert!(builder.frontend().calls.lock().unwrap().is_empty());
    assert!(!fixture.project.output_dir.exists());
}

#[test]
fn test_build_dir_over_sources_is_rejected() {
    let fixture = Fixture::new(&[("main.rl", "")]);
    let mut builder = Builder::new(
        FakeFrontEnd::default(),
        FakeToolchain::default(),
        BuildConfig::new(BuildMode::GenerateOnly).with_build_dir(&fixture.root),
    );

    let err = builder.build(&fixture.project).unwrap_err();

    assert!(matches!(err, BuildError::InvalidBuildDir { .. }));
    assert!(fixture.root.join("main.rl").exists());
}

#[test]
fn test_build_dir_over_imported_sources_is_rejected() {
    let fixture = Fixture::new(&[
        ("main.rl", "import lib/math.rl\n"),
        ("lib/math.rl", "square\n"),
    ]);
    let mut builder = Builder::new(
        FakeFrontEnd::default(),
        FakeToolchain::default(),
        BuildConfig::new(BuildMode::GenerateOnly).with_build_dir(fixture.root.join("lib")),
    );

    let err = builder.build(&fixture.project).unwrap_err();

    assert!(matches!(err, BuildError::InvalidBuildDir { .. }));
    assert_eq!(err.stage(), BuildStage::Idle);
    assert_eq!(
        fs::read_to_string(fixture.root.join("lib/math.rl")).unwrap(),
        "square\n"
    );
    assert!(builder.frontend().calls.lock().unwrap().is_empty());
}

#[test]
fn test_stale_build_dir_is_replaced() {
    let fixture = Fixture::new(&[("main.rl", "")]);
    fs::create_dir_all(fixture.build_dir()).unwrap();
    fs::write(fixture.build_dir().join(BUILD_STAMP), "").unwrap();
    fs::write(fixture.build_dir().join("old.hpp"), "").unwrap();
    let mut builder = builder(BuildMode::GenerateOnly, FakeFrontEnd::default(), FakeToolchain::default());

    builder.build(&fixture.project).unwrap();

    assert_eq!(list(&fixture.build_dir()), vec!["main.cpp", "main.hpp"]);
}

#[test]
fn test_outcome_serializes_for_summaries() {
    let fixture = Fixture::new(&[("main.rl", "")]);
    let mut builder = builder(BuildMode::Executable, FakeFrontEnd::default(), FakeToolchain::default());

    let outcome = builder.build(&fixture.project).unwrap();
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["mode"], "executable");
    assert_eq!(json["name"], "app");
    assert_eq!(json["stats"]["modules"], 1);
    assert_eq!(json["artifacts"][0]["kind"], "executable");
    assert!(json.get("generated_dir").is_none());
}
