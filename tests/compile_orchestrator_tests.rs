// Compilation orchestrator integration tests

mod common;

use std::fs;
use std::path::PathBuf;

use common::{source_and_output, touch, ScriptedRunner};
use dartbuild::build_system::{
    BuildSystemError, CommandTemplate, CompilationOrchestrator, CompileSettings,
};
use tempfile::TempDir;

struct Project {
    _temp_dir: TempDir,
    src: PathBuf,
    out: PathBuf,
}

fn project(files: &[&str]) -> Project {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("src");
    let out = temp_dir.path().join("out");
    for file in files {
        touch(src.join(file));
    }
    Project {
        _temp_dir: temp_dir,
        src,
        out,
    }
}

fn template() -> CommandTemplate {
    CommandTemplate::new("/sdk/bin/dart2js").arg("--minify")
}

#[test]
fn test_every_candidate_attempted_after_failure() {
    let project = project(&["a.dart", "b.dart", "c.dart"]);
    let runner = ScriptedRunner::new().exit_code("b.dart", 1);
    let orchestrator =
        CompilationOrchestrator::with_runner(CompileSettings::new(&project.src, &project.out), runner);

    let verdict = orchestrator.run(&template()).unwrap();

    assert_eq!(orchestrator.runner().candidates(), vec!["a.dart", "b.dart", "c.dart"]);
    assert_eq!(verdict.total, 3);
    assert_eq!(verdict.succeeded, 2);
    assert_eq!(verdict.failed, 1);
    assert!(!verdict.proceed);

    let err = verdict.into_result().unwrap_err();
    assert!(matches!(err, BuildSystemError::BatchFailed(_)));
}

#[test]
fn test_ignored_failures_proceed() {
    let project = project(&["a.dart", "b.dart"]);
    let mut settings = CompileSettings::new(&project.src, &project.out);
    settings.ignore_failures = true;
    let runner = ScriptedRunner::new().exit_code("a.dart", 254);

    let verdict = CompilationOrchestrator::with_runner(settings, runner)
        .run(&template())
        .unwrap();

    assert_eq!(verdict.failed, 1);
    assert!(verdict.proceed);
    assert!(verdict.into_result().is_ok());
}

#[test]
fn test_invocation_tail_and_parent_directories() {
    let project = project(&["web/app/main.dart"]);
    let orchestrator = CompilationOrchestrator::with_runner(
        CompileSettings::new(&project.src, &project.out),
        ScriptedRunner::new(),
    );

    let verdict = orchestrator.run(&template()).unwrap();

    let invocations = orchestrator.runner().invocations();
    assert_eq!(invocations.len(), 1);
    let expected_output = project.out.join("web/app/main.dart.js");
    assert_eq!(
        invocations[0].args_lossy(),
        vec![
            "--minify".to_string(),
            project.src.join("web/app/main.dart").display().to_string(),
            format!("-o{}", expected_output.display()),
        ]
    );
    assert!(project.out.join("web/app").is_dir());
    assert_eq!(verdict.outcomes[0].output_file, Some(expected_output));
    assert_eq!(verdict.outcomes[0].stdout_lossy(), "ran main.dart\n");
}

#[test]
fn test_up_to_date_sources_are_not_recompiled() {
    let project = project(&[]);
    source_and_output(&project.src.join("old.dart"), 1_000, &project.out.join("old.dart.js"), 2_000);
    source_and_output(&project.src.join("new.dart"), 3_000, &project.out.join("new.dart.js"), 2_000);

    let orchestrator = CompilationOrchestrator::with_runner(
        CompileSettings::new(&project.src, &project.out),
        ScriptedRunner::new(),
    );
    let verdict = orchestrator.run(&template()).unwrap();

    assert_eq!(orchestrator.runner().candidates(), vec!["new.dart"]);
    assert_eq!(verdict.total, 1);
}

#[test]
fn test_force_rebuild_treats_everything_as_stale() {
    let project = project(&[]);
    source_and_output(&project.src.join("a.dart"), 1_000, &project.out.join("a.dart.js"), 9_000);
    source_and_output(&project.src.join("lib/b.dart"), 1_000, &project.out.join("lib/b.dart.js"), 9_000);

    let mut settings = CompileSettings::new(&project.src, &project.out);
    settings.force = true;
    let orchestrator = CompilationOrchestrator::with_runner(settings, ScriptedRunner::new());

    let verdict = orchestrator.run(&template()).unwrap();

    assert_eq!(verdict.total, 2);
    assert_eq!(orchestrator.runner().candidates(), vec!["a.dart", "b.dart"]);
    assert!(project.out.is_dir());
}

#[test]
fn test_launch_error_stops_the_batch() {
    let project = project(&["a.dart", "b.dart", "c.dart"]);
    let runner = ScriptedRunner::new().launch_failure("b.dart");
    let orchestrator =
        CompilationOrchestrator::with_runner(CompileSettings::new(&project.src, &project.out), runner);

    let err = orchestrator.run(&template()).unwrap_err();

    assert!(err.is_launch_error());
    match err {
        BuildSystemError::Launch { candidate, .. } => {
            assert_eq!(candidate, project.src.join("b.dart"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(orchestrator.runner().candidates(), vec!["a.dart", "b.dart"]);
}

#[test]
fn test_launch_error_keeps_earlier_outcomes() {
    let project = project(&["a.dart", "b.dart", "c.dart"]);
    let runner = ScriptedRunner::new().exit_code("a.dart", 3).launch_failure("b.dart");
    let orchestrator =
        CompilationOrchestrator::with_runner(CompileSettings::new(&project.src, &project.out), runner);

    let err = orchestrator.run(&template()).unwrap_err();

    assert!(err.is_launch_error());
    let completed = err.completed_outcomes();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].candidate, project.src.join("a.dart"));
    assert_eq!(completed[0].exit_code, 3);
    assert_eq!(completed[0].output_file, Some(project.out.join("a.dart.js")));
    assert_eq!(completed[0].stdout_lossy(), "ran a.dart\n");
}

#[test]
fn test_source_outside_compile_roots_runs_nothing() {
    let project = project(&["a.dart", "b.dart"]);
    let mut settings = CompileSettings::new(&project.src, &project.out);
    settings.compile_roots = vec![project.src.join("web")];
    let orchestrator = CompilationOrchestrator::with_runner(settings, ScriptedRunner::new());

    let err = orchestrator.run(&template()).unwrap_err();

    assert!(matches!(err, BuildSystemError::SourceOutsideRoots { .. }));
    assert!(orchestrator.runner().invocations().is_empty());
}

#[test]
fn test_output_root_that_is_a_file_is_rejected() {
    let project = project(&["a.dart"]);
    fs::create_dir_all(project.out.parent().unwrap()).unwrap();
    fs::write(&project.out, "oops").unwrap();

    let orchestrator = CompilationOrchestrator::with_runner(
        CompileSettings::new(&project.src, &project.out),
        ScriptedRunner::new(),
    );
    let err = orchestrator.run(&template()).unwrap_err();

    assert!(matches!(err, BuildSystemError::OutputNotDirectory(_)));
    assert!(orchestrator.runner().invocations().is_empty());
}

#[test]
fn test_bundle_entry_ignores_timestamps() {
    let project = project(&["lib/helper.dart"]);
    source_and_output(&project.src.join("main.dart"), 1_000, &project.out.join("main.dart.js"), 9_000);

    let mut settings = CompileSettings::new(&project.src, &project.out);
    settings.bundle_entry = Some(project.src.join("main.dart"));
    let orchestrator = CompilationOrchestrator::with_runner(settings, ScriptedRunner::new());

    let verdict = orchestrator.run(&template()).unwrap();

    assert_eq!(verdict.total, 1);
    assert_eq!(orchestrator.runner().candidates(), vec!["main.dart"]);
}

#[test]
fn test_skip_runs_nothing() {
    let project = project(&["a.dart"]);
    let mut settings = CompileSettings::new(&project.src, &project.out);
    settings.skip = true;
    let orchestrator = CompilationOrchestrator::with_runner(settings, ScriptedRunner::new());

    let verdict = orchestrator.run(&template()).unwrap();

    assert!(verdict.skipped);
    assert!(orchestrator.runner().invocations().is_empty());
    assert!(!project.out.exists());
}

#[test]
fn test_nothing_stale_is_success() {
    let project = project(&[]);
    source_and_output(&project.src.join("a.dart"), 1_000, &project.out.join("a.dart.js"), 2_000);

    let verdict = CompilationOrchestrator::with_runner(
        CompileSettings::new(&project.src, &project.out),
        ScriptedRunner::new(),
    )
    .run(&template())
    .unwrap();

    assert_eq!(verdict.total, 0);
    assert!(verdict.proceed);
}

#[cfg(unix)]
#[test]
fn test_end_to_end_with_real_processes() {
    let project = project(&["web/main.dart", "lib/util.dart"]);

    // `sh -c 'cp "$0" "$1"' <source> <output>` stands in for the compiler.
    let template = CommandTemplate::new("/bin/sh").arg("-c").arg("cp \"$0\" \"$1\"");
    let mut settings = CompileSettings::new(&project.src, &project.out);
    settings.output_flag = String::new();

    let orchestrator = CompilationOrchestrator::new(settings.clone());
    let verdict = orchestrator.run(&template).unwrap();
    assert_eq!(verdict.total, 2);
    assert_eq!(verdict.succeeded, 2);
    assert!(project.out.join("web/main.dart.js").is_file());
    assert!(project.out.join("lib/util.dart.js").is_file());

    let verdict = CompilationOrchestrator::new(settings).run(&template).unwrap();
    assert_eq!(verdict.total, 0);
}
