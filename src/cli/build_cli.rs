// Command-line interface for dartbuild
// Loads the configuration, applies flag overrides and drives one goal per invocation

use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::*;

use crate::build_system::{
    dart2js_template, resolve_script, vm_template, AggregateVerdict, BatchReport, BuildConfig,
    CompilationOrchestrator, CompileSettings, DartSdk, PackageManager, PubSettings, RunOutcome,
    ScriptRunner, SdkTool, DEFAULT_CONFIG_FILE,
};
use crate::testing::{conclude, TestOrchestrator, TestSettings};

/// dartbuild command-line interface
#[derive(Parser, Debug)]
#[command(name = "dartbuild")]
#[command(about = "Incremental dart2js compilation and Dart test runner")]
#[command(version)]
pub struct BuildCli {
    /// Configuration file (defaults to ./dartbuild.toml when present)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: BuildCommand,
}

#[derive(Subcommand, Debug)]
pub enum BuildCommand {
    /// Compile stale Dart sources to JavaScript
    Compile {
        /// Empty the output directory and recompile everything
        #[arg(long)]
        force: bool,

        /// Skip compilation entirely
        #[arg(long)]
        skip: bool,

        /// Timestamp tolerance in milliseconds
        #[arg(long)]
        stale_millis: Option<u64>,

        /// Compile only this entry file, relative to the source directory
        #[arg(long)]
        bundle_entry: Option<PathBuf>,

        /// Write a JSON report of the pass
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run every Dart test script
    Test {
        #[arg(long)]
        skip_tests: bool,

        /// Succeed even when no test file is found
        #[arg(long)]
        allow_no_tests: bool,

        /// Log test failures without failing
        #[arg(long)]
        ignore_failures: bool,

        /// Write a JSON report of the pass
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run a Dart script with the VM
    Run {
        /// Script path, relative to the source directory
        script: Option<PathBuf>,
    },

    /// Install or update package dependencies
    Pub {
        /// Run `pub update` instead of `pub install`
        #[arg(long)]
        update: bool,
    },

    /// Show the Dart SDK in use
    Env,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Generate a default configuration file
    Init {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl BuildCli {
    /// Install the logger. `RUST_LOG` still takes precedence.
    pub fn init_logging(&self) {
        let level = if self.verbose {
            log::LevelFilter::Debug
        } else if self.quiet {
            log::LevelFilter::Warn
        } else {
            log::LevelFilter::Info
        };

        let _ = env_logger::Builder::new()
            .filter_level(level)
            .format_timestamp(None)
            .parse_default_env()
            .try_init();
    }

    pub fn execute(&self) -> Result<(), Box<dyn Error>> {
        match &self.command {
            BuildCommand::Config { action } => self.execute_config(action),
            _ => {
                let config = self.effective_config()?;
                config.validate()?;
                self.execute_goal(&config)
            }
        }
    }

    fn execute_goal(&self, config: &BuildConfig) -> Result<(), Box<dyn Error>> {
        match &self.command {
            BuildCommand::Compile { report, .. } => self.execute_compile(config, report.as_deref()),
            BuildCommand::Test { report, .. } => self.execute_test(config, report.as_deref()),
            BuildCommand::Run { .. } => self.execute_run(config),
            BuildCommand::Pub { .. } => self.execute_pub(config),
            BuildCommand::Env => self.execute_env(config),
            BuildCommand::Config { action } => self.execute_config(action),
        }
    }

    /// Configuration file values with the command-line flags applied on top
    pub fn effective_config(&self) -> Result<BuildConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => BuildConfig::load_from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                BuildConfig::load_from_file(DEFAULT_CONFIG_FILE)?
            }
            None => BuildConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut BuildConfig) {
        match &self.command {
            BuildCommand::Compile {
                force,
                skip,
                stale_millis,
                bundle_entry,
                ..
            } => {
                config.compile.force |= *force;
                config.compile.skip |= *skip;
                if let Some(millis) = stale_millis {
                    config.compile.stale_millis = *millis;
                }
                if let Some(entry) = bundle_entry {
                    config.compile.bundle_entry = Some(entry.clone());
                }
            }
            BuildCommand::Test {
                skip_tests,
                allow_no_tests,
                ignore_failures,
                ..
            } => {
                config.test.skip_tests |= *skip_tests;
                if *allow_no_tests {
                    config.test.fail_if_no_tests = false;
                }
                config.test.ignore_failures |= *ignore_failures;
            }
            BuildCommand::Run { script } => {
                if let Some(script) = script {
                    config.script.script = Some(script.clone());
                }
            }
            BuildCommand::Pub { update } => {
                config.package_manager.update |= *update;
            }
            BuildCommand::Env | BuildCommand::Config { .. } => {}
        }
    }

    fn locate_sdk(&self, config: &BuildConfig) -> Result<DartSdk, Box<dyn Error>> {
        let sdk_directory = config.sdk_directory();
        Ok(DartSdk::locate(sdk_directory.as_deref())?)
    }

    fn execute_compile(&self, config: &BuildConfig, report: Option<&Path>) -> Result<(), Box<dyn Error>> {
        if config.compile.skip {
            println!("{} dart2js skipped", "ℹ️".blue());
            return Ok(());
        }

        let sdk = self.locate_sdk(config)?;
        let template = dart2js_template(sdk.require(SdkTool::Dart2Js)?, config);
        let orchestrator = CompilationOrchestrator::new(CompileSettings::from_config(config));

        let verdict = match orchestrator.run(&template) {
            Ok(verdict) => verdict,
            Err(e) => {
                write_outcomes(&mut io::stdout(), e.completed_outcomes())?;
                return Err(e.into());
            }
        };
        write_verdict(&mut io::stdout(), "dart2js", &verdict)?;
        write_report(report, "compile", &verdict)?;
        verdict.into_result()?;
        Ok(())
    }

    fn execute_test(&self, config: &BuildConfig, report: Option<&Path>) -> Result<(), Box<dyn Error>> {
        let settings = TestSettings::from_config(config);
        if settings.skip_tests {
            println!("{} Tests are skipped", "ℹ️".blue());
            return Ok(());
        }

        let sdk = self.locate_sdk(config)?;
        let template = vm_template(sdk.require(SdkTool::Dart)?, config);
        let orchestrator = TestOrchestrator::new(settings);

        let verdict = match orchestrator.run(&template) {
            Ok(verdict) => verdict,
            Err(e) => {
                write_outcomes(&mut io::stdout(), e.completed_outcomes())?;
                return Err(e.into());
            }
        };
        write_verdict(&mut io::stdout(), "tests", &verdict)?;
        write_report(report, "test", &verdict)?;
        conclude(verdict)?;
        Ok(())
    }

    fn execute_run(&self, config: &BuildConfig) -> Result<(), Box<dyn Error>> {
        let script = config
            .script
            .script
            .as_deref()
            .ok_or("No script given: pass SCRIPT or set script.script")?;
        let script = resolve_script(config, script);

        let sdk = self.locate_sdk(config)?;
        let template = vm_template(sdk.require(SdkTool::Dart)?, config);

        let outcome = ScriptRunner::new().execute(&template, &script)?;
        print_streams(&outcome);
        outcome.ensure_success("Dart")?;
        Ok(())
    }

    fn execute_pub(&self, config: &BuildConfig) -> Result<(), Box<dyn Error>> {
        let settings = PubSettings::from_config(config);
        if settings.skip {
            println!("{} pub skipped", "ℹ️".blue());
            return Ok(());
        }

        let sdk = self.locate_sdk(config)?;
        let pub_executable = sdk.require(SdkTool::Pub)?;
        let command = settings.command;

        if let Some(outcome) = PackageManager::new(settings).run(pub_executable)? {
            print_streams(&outcome);
        }
        println!("{} pub {} completed", "✅".green(), command);
        Ok(())
    }

    fn execute_env(&self, config: &BuildConfig) -> Result<(), Box<dyn Error>> {
        let sdk = self.locate_sdk(config)?;
        println!("{} Dart SDK", "📊".blue());
        println!("   Location: {}", sdk.root().display());
        println!("   Version:  {}", sdk.version());

        for tool in [SdkTool::Dart, SdkTool::Dart2Js, SdkTool::Pub] {
            match sdk.require(tool) {
                Ok(path) => println!("   {} {}: {}", "✅".green(), tool, path.display()),
                Err(e) => println!("   {} {}", "❌".red(), e),
            }
        }
        Ok(())
    }

    fn execute_config(&self, action: &ConfigAction) -> Result<(), Box<dyn Error>> {
        match action {
            ConfigAction::Init { output, force } => {
                if output.exists() && !force {
                    return Err(format!(
                        "Configuration file {} already exists. Use --force to overwrite.",
                        output.display()
                    )
                    .into());
                }
                BuildConfig::default().save_to_file(output)?;
                println!("{} Generated configuration file: {}", "📝".green(), output.display());
                Ok(())
            }
            ConfigAction::Show => {
                let config = self.effective_config()?;
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
        }
    }
}

/// Per-candidate outcomes first, then the aggregate line
fn write_verdict<W: Write>(out: &mut W, goal: &str, verdict: &AggregateVerdict) -> io::Result<()> {
    write_outcomes(out, &verdict.outcomes)?;

    let summary = format!("{}: {}", goal, verdict.summary());
    if verdict.failed == 0 {
        writeln!(out, "{}", summary.green())
    } else if verdict.proceed {
        writeln!(out, "{}", summary.yellow())
    } else {
        writeln!(out, "{}", summary.red())
    }
}

/// One status line per outcome, followed by whatever the process printed
fn write_outcomes<W: Write>(out: &mut W, outcomes: &[RunOutcome]) -> io::Result<()> {
    for outcome in outcomes {
        if outcome.succeeded() {
            writeln!(out, "{} {}", "✅".green(), outcome.candidate.display())?;
        } else {
            writeln!(
                out,
                "{} {} (exit code {})",
                "❌".red(),
                outcome.candidate.display(),
                outcome.exit_code
            )?;
        }
        out.write_all(&outcome.stdout)?;
        out.write_all(&outcome.stderr)?;
    }
    Ok(())
}

fn print_streams(outcome: &RunOutcome) {
    if !outcome.stdout.is_empty() {
        print!("{}", outcome.stdout_lossy());
    }
    if !outcome.stderr.is_empty() {
        eprint!("{}", outcome.stderr_lossy());
    }
}

fn write_report(path: Option<&Path>, goal: &str, verdict: &AggregateVerdict) -> Result<(), Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(());
    };
    let json = BatchReport::new(goal, verdict.clone()).to_json()?;
    fs::write(path, json)?;
    log::info!("Report written to {}", path.display());
    Ok(())
}

/// Parse the command line, install logging and run the requested goal
pub fn run_build_cli() -> Result<(), Box<dyn Error>> {
    let cli = BuildCli::parse();
    cli.init_logging();
    cli.execute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_system::{BuildSystemError, LaunchError, ProcessOutput};
    use tempfile::TempDir;

    #[test]
    fn test_config_init_command() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("dartbuild.toml");
        let output = config_path.to_string_lossy().into_owned();

        let cli = BuildCli::try_parse_from(["dartbuild", "config", "init", "--output", output.as_str()]).unwrap();
        cli.execute().unwrap();

        let loaded = BuildConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded, BuildConfig::default());
    }

    #[test]
    fn test_config_init_refuses_overwrite_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("dartbuild.toml");
        fs::write(&config_path, "existing content").unwrap();
        let output = config_path.to_string_lossy().into_owned();

        let cli = BuildCli::try_parse_from(["dartbuild", "config", "init", "--output", output.as_str()]).unwrap();
        assert!(cli.execute().is_err());
        assert_eq!(fs::read_to_string(&config_path).unwrap(), "existing content");

        let cli =
            BuildCli::try_parse_from(["dartbuild", "config", "init", "--output", output.as_str(), "--force"]).unwrap();
        cli.execute().unwrap();
        assert!(BuildConfig::load_from_file(&config_path).is_ok());
    }

    #[test]
    fn test_compile_flags_override_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("dartbuild.toml");
        fs::write(&config_path, "[compile]\nstale_millis = 10\nforce = false\n").unwrap();
        let config_arg = config_path.to_string_lossy().into_owned();

        let cli = BuildCli::try_parse_from([
            "dartbuild",
            "--config",
            config_arg.as_str(),
            "compile",
            "--force",
            "--stale-millis",
            "2000",
            "--bundle-entry",
            "web/app.dart",
        ])
        .unwrap();
        let config = cli.effective_config().unwrap();

        assert!(config.compile.force);
        assert_eq!(config.compile.stale_millis, 2000);
        assert_eq!(config.compile.bundle_entry, Some(PathBuf::from("web/app.dart")));
    }

    #[test]
    fn test_test_flags_override_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("dartbuild.toml");
        fs::write(&config_path, "[test]\nignore_failures = true\n").unwrap();
        let config_arg = config_path.to_string_lossy().into_owned();

        let cli = BuildCli::try_parse_from([
            "dartbuild",
            "test",
            "--allow-no-tests",
            "--config",
            config_arg.as_str(),
        ])
        .unwrap();
        let config = cli.effective_config().unwrap();

        assert!(!config.test.fail_if_no_tests);
        assert!(config.test.ignore_failures);
        assert!(!config.test.skip_tests);
    }

    #[test]
    fn test_empty_test_set_fails_without_allow_flag() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("dartbuild.toml");
        fs::write(&config_path, "[test]\nignore_failures = true\n").unwrap();
        let config_arg = config_path.to_string_lossy().into_owned();

        let cli = BuildCli::try_parse_from(["dartbuild", "test", "--config", config_arg.as_str()]).unwrap();
        assert!(cli.effective_config().unwrap().test.fail_if_no_tests);
    }

    fn outcome(name: &str, exit_code: i32, stdout: &str) -> RunOutcome {
        RunOutcome::from_output(
            Path::new(name),
            None,
            ProcessOutput {
                exit_code,
                stdout: stdout.as_bytes().to_vec(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_outcomes_written_before_failed_summary() {
        let verdict = AggregateVerdict::fold(
            vec![outcome("web/a.dart", 0, "ran a\n"), outcome("web/b.dart", 3, "ran b\n")],
            false,
        );

        let mut out = Vec::new();
        write_verdict(&mut out, "dart2js", &verdict).unwrap();
        let text = String::from_utf8(out).unwrap();

        let summary = text.find("dart2js: 2 processed, 1 succeeded, 1 failed").unwrap();
        let a = text.find("web/a.dart").unwrap();
        let b = text.find("web/b.dart (exit code 3)").unwrap();
        let b_output = text.find("ran b").unwrap();
        assert!(a < b && b < b_output && b_output < summary);
    }

    #[test]
    fn test_launch_failure_keeps_earlier_outcomes() {
        let err = BuildSystemError::Launch {
            candidate: PathBuf::from("web/c.dart"),
            completed: vec![outcome("web/a.dart", 0, ""), outcome("web/b.dart", 3, "")],
            source: LaunchError::new(
                PathBuf::from("dart2js"),
                io::Error::new(io::ErrorKind::NotFound, "missing"),
            ),
        };

        let mut out = Vec::new();
        write_outcomes(&mut out, err.completed_outcomes()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("web/a.dart"));
        assert!(text.contains("web/b.dart (exit code 3)"));
        assert!(!text.contains("web/c.dart"));
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(BuildCli::try_parse_from(["dartbuild", "-v", "-q", "env"]).is_err());
    }
}
