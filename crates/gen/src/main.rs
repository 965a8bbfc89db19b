//! # tvx-gen CLI
//!
//! ## Commands
//!
//! - `generate`: run the built-in suites and write the corpus
//!   - `--config`: TOML file; flags below override it
//!   - `--output-dir`, `--parallelism`, `--fail-fast`, `--compact`
//!   - `--suite`: restrict to named suites (repeatable)
//! - `list`: print every suite, group and vector id
//! - `check <files...>`: replay vectors against the reference VM
//!
//! Exit status is non-zero when any vector fails to generate or replay.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tvx_gen::{suites, Driver, FsSink, Generator, GeneratorConfig, JobStatus, Verdict};
use tvx_schema::TestVector;

#[derive(Parser)]
#[command(version, about = "Conformance test-vector generator")]
struct Cli {
    /// Overrides the configured log level.
    #[arg(long, global = true)]
    log_level: Option<Level>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the corpus.
    Generate {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Worker threads; 0 uses every CPU.
        #[arg(long)]
        parallelism: Option<usize>,
        #[arg(long)]
        fail_fast: bool,
        /// Write single-line JSON.
        #[arg(long)]
        compact: bool,
        #[arg(long = "suite")]
        suites: Vec<String>,
    },

    /// List the vectors each suite defines.
    List,

    /// Replay vector files.
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn init_tracing(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Generate {
            config,
            output_dir,
            parallelism,
            fail_fast,
            compact,
            suites: names,
        } => {
            let mut cfg = match config {
                Some(path) => tvx_gen::load_from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => GeneratorConfig::default(),
            };
            if let Some(dir) = output_dir {
                cfg.output_dir = dir;
            }
            if let Some(n) = parallelism {
                cfg.parallelism = n;
            }
            cfg.fail_fast |= fail_fast;
            cfg.pretty &= !compact;

            let level = match cli.log_level {
                Some(level) => level,
                None => cfg
                    .log_level
                    .parse()
                    .with_context(|| format!("invalid log level {:?}", cfg.log_level))?,
            };
            init_tracing(level);
            generate(cfg, &names)
        }

        Commands::List => {
            for suite in suites::all() {
                for group in &suite.groups {
                    for item in &group.items {
                        println!("{}/{}/{}", suite.name, group.name, item.id());
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Check { files } => {
            init_tracing(cli.log_level.unwrap_or(Level::WARN));
            check(&files)
        }
    }
}

fn generate(cfg: GeneratorConfig, names: &[String]) -> Result<ExitCode> {
    let selected = suites::select(names);
    if selected.is_empty() {
        anyhow::bail!("no suite matches {names:?}");
    }
    info!(
        output_dir = %cfg.output_dir.display(),
        workers = cfg.workers(),
        suites = selected.len(),
        "generation starting"
    );

    let sink = Arc::new(FsSink::new(cfg.output_dir.clone(), cfg.pretty));
    let generator = Generator::new(cfg, sink);
    for suite in selected {
        suite.submit(&generator)?;
    }
    let report = generator.finish();

    for outcome in &report.outcomes {
        if let JobStatus::Failed(reason) = &outcome.status {
            eprintln!("FAIL {}/{}: {reason}", outcome.group, outcome.id);
        }
    }
    println!(
        "{} generated, {} failed, {} cancelled",
        report.succeeded, report.failed, report.cancelled
    );
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn check(files: &[PathBuf]) -> Result<ExitCode> {
    let driver = Driver::default();
    let mut failed = 0usize;

    for path in files {
        let raw =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let vector = TestVector::from_json(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        let report = driver.check(&vector)?;
        match &report.verdict {
            Verdict::Passed => println!("PASS    {}", report.id),
            Verdict::Skipped(reason) => println!("SKIP    {} ({reason})", report.id),
            Verdict::NegatedAsExpected(_) => println!("NEGATED {}", report.id),
            Verdict::Failed(failures) => {
                failed += 1;
                println!("FAIL    {}", report.id);
                for f in failures {
                    println!("        {f}");
                }
            }
        }
    }

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
