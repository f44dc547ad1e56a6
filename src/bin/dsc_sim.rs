//! DSC engine simulator
//!
//! Replays JSON scenarios against an in-memory engine.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::{style, Term};

use dsc_engine::cli::{
    CliError, OutputFormat, OutputFormatter, Scenario, SimConfig, SimWorld, CONFIG_FILE,
    LOG_ENV, SCENARIO_FILE,
};

/// DSC engine simulator - replay deposit, mint, burn and liquidation scenarios
#[derive(Parser)]
#[command(name = "dsc-sim")]
#[command(version = dsc_engine::VERSION)]
#[command(about = "Scenario simulator for the DSC engine", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log filter, overrides the config file
    #[arg(long, env = LOG_ENV)]
    log: Option<String>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and an example scenario
    Init {
        /// Target directory
        dir: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Run a scenario
    Run {
        /// Simulator config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Scenario file
        scenario: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    let output = OutputFormatter::new(cli.format);

    if let Err(e) = run_command(&cli, &output) {
        output.error(&format!("{:#}", e));
        let code = e.downcast_ref::<CliError>().map(CliError::exit_code).unwrap_or(1);
        std::process::exit(code);
    }
}

fn init_logging(filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_command(cli: &Cli, output: &OutputFormatter) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init { dir, force } => {
            init_logging(cli.log.as_deref().unwrap_or("info"));
            cmd_init(dir, *force, output)
        }
        Commands::Run { config, scenario } => {
            let config = match config {
                Some(path) => SimConfig::load(path)?,
                None => SimConfig::default(),
            }
            .with_log_filter_override(cli.log.clone());
            init_logging(&config.log_filter);
            cmd_run(&config, scenario, output)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_init(dir: &Path, force: bool, output: &OutputFormatter) -> anyhow::Result<()> {
    let term = Term::stdout();
    let _ = term.write_line(&format!(
        "{} Initializing simulation in {}",
        style("→").cyan(),
        dir.display()
    ));

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let config_path = dir.join(CONFIG_FILE);
    let scenario_path = dir.join(SCENARIO_FILE);
    for path in [&config_path, &scenario_path] {
        if path.exists() && !force {
            anyhow::bail!("{} already exists, use --force to overwrite", path.display());
        }
    }

    SimConfig::default().save(&config_path)?;
    Scenario::example().save(&scenario_path)?;

    output.success(&format!("Wrote {}", config_path.display()));
    output.success(&format!("Wrote {}", scenario_path.display()));
    let _ = term.write_line(&format!(
        "\nRun it with: {}",
        style(format!(
            "dsc-sim run --config {} {}",
            config_path.display(),
            scenario_path.display()
        ))
        .bold()
    ));
    Ok(())
}

fn cmd_run(config: &SimConfig, scenario: &Path, output: &OutputFormatter) -> anyhow::Result<()> {
    let scenario = Scenario::load(scenario)?;
    let mut world = SimWorld::build(config)?;

    let report = world
        .run(&scenario)
        .with_context(|| format!("Scenario {:?} failed", scenario.name))?;

    output.report(&report);
    if output.format() == OutputFormat::Text {
        println!();
        output.success(&format!(
            "{} steps passed at block {}",
            report.steps.len(),
            world.height()
        ));
    }
    Ok(())
}
