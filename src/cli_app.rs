//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::json;

use fim_harness::core::config::HarnessConfig;
use fim_harness::core::errors::Result;
use fim_harness::logger::jsonl::RunLog;
use fim_harness::scenario::ScenarioDriver;

/// FIM scenario harness: drives a file-integrity daemon through a mutation
/// scenario and verifies every report it publishes.
#[derive(Debug, Parser)]
#[command(
    name = "fimh",
    author,
    version,
    about = "FIM Scenario Harness - daemon contract verification",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the full end-to-end scenario against the daemon.
    Run(RunArgs),
    /// Print the effective configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    /// Daemon executable to launch.
    #[arg(long, value_name = "PATH")]
    daemon_bin: Option<PathBuf>,
    /// Directory the daemon monitors.
    #[arg(long, value_name = "PATH")]
    fixture_dir: Option<PathBuf>,
    /// Report artifact path handed to the daemon.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
    /// Daemon scan interval in seconds.
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,
    /// Number of baseline fixture files.
    #[arg(long, value_name = "N")]
    files: Option<usize>,
    /// Per-wait poll deadline in seconds (0 derives from the interval).
    #[arg(long, value_name = "SECONDS")]
    deadline: Option<u64>,
    /// Collect every mismatch in a phase instead of stopping at the first.
    #[arg(long)]
    keep_going: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    shell: CompletionShell,
}

/// Dispatch the parsed CLI.
pub fn run(cli: &Cli) -> Result<()> {
    if cli.no_color || !io::stdout().is_terminal() {
        control::set_override(false);
    }

    match &cli.command {
        Command::Run(args) => run_scenario(cli, args),
        Command::Config(_) => show_config(cli),
        Command::Completions(args) => {
            generate(args.shell, &mut Cli::command(), "fimh", &mut io::stdout());
            Ok(())
        }
    }
}

fn effective_config(cli: &Cli, args: Option<&RunArgs>) -> Result<HarnessConfig> {
    let mut config = HarnessConfig::load(cli.config.as_deref())?;

    if let Some(args) = args {
        if let Some(bin) = &args.daemon_bin {
            config.daemon.binary.clone_from(bin);
        }
        if let Some(dir) = &args.fixture_dir {
            config.fixture.dir.clone_from(dir);
        }
        if let Some(report) = &args.report {
            config.fixture.report_path.clone_from(report);
        }
        if let Some(interval) = args.interval {
            config.daemon.scan_interval_secs = interval;
        }
        if let Some(files) = args.files {
            config.fixture.file_count = files;
        }
        if let Some(deadline) = args.deadline {
            config.poll.deadline_secs = deadline;
        }
        if args.keep_going {
            config.validation.fail_fast = false;
        }
        config.validate()?;
    }
    Ok(config)
}

fn run_scenario(cli: &Cli, args: &RunArgs) -> Result<()> {
    let config = effective_config(cli, Some(args))?;
    if cli.verbose {
        println!("daemon: {}", config.daemon.binary.display());
        println!("fixture dir: {}", config.fixture.dir.display());
        println!("report artifact: {}", config.fixture.report_path.display());
        println!("poll deadline: {}s", config.poll_deadline().as_secs());
    }
    let log = if cli.quiet {
        RunLog::disabled()
    } else {
        RunLog::open(&config.log.jsonl_path)
    };

    let mut driver = ScenarioDriver::new(config, log);
    match driver.run() {
        Ok(summary) => {
            if cli.json {
                println!(
                    "{}",
                    json!({ "ok": true, "phases": summary.phases })
                );
            } else {
                println!();
                for phase in &summary.phases {
                    println!("  {} {phase}", "PASS".green().bold());
                }
                println!("\n{}", "Scenario passed.".green().bold());
            }
            Ok(())
        }
        Err(err) => {
            if cli.json {
                println!(
                    "{}",
                    json!({ "ok": false, "error_code": err.code(), "error": err.to_string() })
                );
            } else {
                eprintln!("\n{} {err}", "FAIL".red().bold());
            }
            Err(err)
        }
    }
}

fn show_config(cli: &Cli) -> Result<()> {
    let config = effective_config(cli, None)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        let rendered =
            toml::to_string_pretty(&config).map_err(|e| {
                fim_harness::core::errors::HarnessError::Serialization {
                    context: "toml",
                    details: e.to_string(),
                }
            })?;
        print!("{rendered}");
    }
    Ok(())
}
