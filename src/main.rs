use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mkproj::builder::{self, BuildError};
use mkproj::config::ScaffoldConfig;
use mkproj::doctor;
use mkproj::report;
use mkproj::spec::TreeSpec;
use tracing::info;

/// Build failed: conflict, unreachable destination, or zero artifacts.
const EXIT_BUILD_FAILED: i32 = 1;
/// The structure file failed parsing or validation.
const EXIT_MALFORMED_SPEC: i32 = 2;

#[derive(Parser)]
#[command(
    name = "mkproj",
    about = "Materialize a project directory tree from a YAML specification",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the YAML structure file (default: project_structure.yaml
    /// in the working directory)
    #[arg(long, env = "MKPROJ_STRUCTURE", global = true)]
    structure_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MKPROJ_LOG", global = true)]
    log: Option<String>,

    /// Log output format: "pretty" (default, human-readable) | "json"
    /// (structured for log aggregators)
    #[arg(long, env = "MKPROJ_LOG_FORMAT", global = true)]
    log_format: Option<String>,

    /// Suppress the per-path listing in the summary.
    ///
    /// Counts and warnings are still printed. Errors go to stderr.
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create the directory tree (default when no subcommand given).
    ///
    /// Reads the structure file, creates every declared directory and file
    /// under DEST, then applies permission rules. Safe to re-run: existing
    /// directories are kept and existing files are never overwritten.
    ///
    /// Examples:
    ///   mkproj
    ///   mkproj build /path/to/project
    ///   mkproj build --structure-file layout.yaml
    Build {
        /// Destination root to build into (default: current directory)
        dest: Option<PathBuf>,
    },
    /// Validate the structure file without touching the filesystem.
    ///
    /// Parses the YAML document and runs the full validation pass (required
    /// keys, node-name safety, sibling uniqueness, permission modes and
    /// patterns). Nothing is created.
    ///
    /// Examples:
    ///   mkproj check
    ///   mkproj check --structure-file layout.yaml
    Check,
    /// Run diagnostic checks on build prerequisites.
    ///
    /// Checks structure file presence and validity, destination
    /// writability, and disk space.
    ///
    /// Exit code 0 if all checks pass, 1 if any check fails.
    ///
    /// Examples:
    ///   mkproj doctor
    Doctor {
        /// Destination root the build would use (default: current directory)
        dest: Option<PathBuf>,
    },
}

fn main() {
    let args = Args::parse();

    let command = args.command.unwrap_or(Command::Build { dest: None });
    let dest = match &command {
        Command::Build { dest } | Command::Doctor { dest } => dest.clone(),
        Command::Check => None,
    };
    let config = ScaffoldConfig::new(args.structure_file, dest, args.log, args.log_format);

    // Init once — must happen before any tracing calls.
    setup_logging(&config.log, &config.log_format);

    let code = match command {
        Command::Build { .. } => run_build(&config, args.quiet),
        Command::Check => run_check(&config),
        Command::Doctor { .. } => run_doctor(&config),
    };
    std::process::exit(code);
}

fn run_build(config: &ScaffoldConfig, quiet: bool) -> i32 {
    info!(
        structure = %config.structure_file.display(),
        dest = %config.dest.display(),
        "build start"
    );
    let spec = match TreeSpec::load(&config.structure_file) {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("error: {:#}", anyhow::Error::new(e));
            return EXIT_MALFORMED_SPEC;
        }
    };
    match builder::build(&spec, &config.dest) {
        Ok(rep) => {
            report::print_summary(&rep, quiet);
            0
        }
        Err(BuildError::InvalidRules(e)) => {
            eprintln!("error: {:#}", anyhow::Error::new(e));
            EXIT_MALFORMED_SPEC
        }
        Err(e) => {
            eprintln!("error: {:#}", anyhow::Error::new(e));
            EXIT_BUILD_FAILED
        }
    }
}

fn run_check(config: &ScaffoldConfig) -> i32 {
    match TreeSpec::load(&config.structure_file) {
        Ok(spec) => {
            println!(
                "ok: {} directories, {} files, {} permission rules",
                spec.dir_count(),
                spec.file_count(),
                spec.project.permissions.len()
            );
            0
        }
        Err(e) => {
            eprintln!("error: {:#}", anyhow::Error::new(e));
            EXIT_MALFORMED_SPEC
        }
    }
}

fn run_doctor(config: &ScaffoldConfig) -> i32 {
    let results = doctor::run_doctor(config);
    doctor::print_doctor_results(&results);
    let failed = results.iter().filter(|r| !r.passed).count();
    if failed == 0 {
        0
    } else {
        1
    }
}

/// Initialize the tracing subscriber.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format)
/// or `"json"` (structured JSON for log aggregators).
fn setup_logging(log_level: &str, log_format: &str) {
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
    }
}
