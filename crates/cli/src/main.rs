//! `pi-selftest`: runs the hardware self-test catalogue and prints the
//! report.
//!
//! Progress and logs go to stderr; stdout carries only the rendered report,
//! so the output can be piped straight into a file or another tool.

mod config;
mod logging;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use crate::config::{AppConfig, OutputFormat};
use selftest_engine::doctor::{run_doctor, DoctorReport};
use selftest_engine::probes::default_registry;
use selftest_engine::{ProbeContext, ProbeOutcome, ProbeRegistry, RunObserver, Runner};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ===========================================================================
// CLI definition
// ===========================================================================

#[derive(Parser)]
#[command(
    name = "pi-selftest",
    version,
    about = "Hardware self-test for Raspberry Pi boards"
)]
struct Cli {
    /// Extra configuration file, applied after the built-in and system ones.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every registered probe once, in order, and print the report.
    Run {
        /// Report format. Asked for on a terminal when neither this nor the
        /// config sets one; JSON otherwise.
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
        /// Emit the JSON envelope with status, error code and timing per probe.
        #[arg(long)]
        detailed: bool,
        /// Write the report to this path instead of stdout.
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
        /// Run only the named probe. Repeatable.
        #[arg(long = "only", value_name = "NAME")]
        only: Vec<String>,
    },

    /// List registered probe names in run order.
    List,

    /// Report OS facts and which external tools are installed.
    Doctor {
        /// Output as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
}

// ===========================================================================
// Main
// ===========================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = crate::config::load_config(cli.config.as_deref())
        .context("failed to load configuration")?;
    logging::init_logging(&cfg.logging, cli.verbose);
    tracing::debug!(extra_config = ?cli.config, "configuration loaded");

    // reqwest is built without a default crypto provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    match cli.command {
        Commands::Run {
            format,
            detailed,
            out,
            only,
        } => cmd_run(&cfg, format, detailed, out.as_deref(), &only).await,
        Commands::List => cmd_list(&cfg),
        Commands::Doctor { json } => cmd_doctor(&cfg, json).await,
    }
}

// ===========================================================================
// Subcommand implementations
// ===========================================================================

async fn cmd_run(
    cfg: &AppConfig,
    format: Option<OutputFormat>,
    detailed: bool,
    out: Option<&Path>,
    only: &[String],
) -> anyhow::Result<()> {
    let registry = select_probes(default_registry(&cfg.probes)?, only)?;
    let format = if detailed {
        OutputFormat::Json
    } else {
        resolve_format(format, cfg.output.format)?
    };

    let ctx = Arc::new(ProbeContext::default_platform(cfg.probes.clone()));
    let mut runner = Runner::new(registry, ctx);
    let report = runner.run_all_with(&ConsoleProgress).await;

    let mut rendered = match (detailed, format) {
        (true, _) => report.render_detailed_json()?,
        (false, OutputFormat::Human) => report.render_human(),
        (false, OutputFormat::Json) => report.render_json()?,
        (false, OutputFormat::Yaml) => report.render_yaml()?,
    };
    if !rendered.is_empty() && !rendered.ends_with('\n') {
        rendered.push('\n');
    }

    match out {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            eprintln!("Report written to {}", path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

fn cmd_list(cfg: &AppConfig) -> anyhow::Result<()> {
    let registry = default_registry(&cfg.probes)?;
    for name in registry.names() {
        println!("{}", name);
    }
    Ok(())
}

async fn cmd_doctor(cfg: &AppConfig, json: bool) -> anyhow::Result<()> {
    let ctx = ProbeContext::default_platform(cfg.probes.clone());
    let report = run_doctor(&ctx).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_doctor(&report);
    }
    Ok(())
}

// ===========================================================================
// Helpers
// ===========================================================================

/// Narrow the registry to the names given with `--only`, keeping run order.
fn select_probes(registry: ProbeRegistry, only: &[String]) -> anyhow::Result<ProbeRegistry> {
    if only.is_empty() {
        return Ok(registry);
    }
    let unknown: Vec<&str> = only
        .iter()
        .filter(|n| !registry.contains(n))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        bail!(
            "unknown probe name(s): {}. Use `pi-selftest list` to see available names.",
            unknown.join(", ")
        );
    }
    Ok(registry.filtered(|name| only.iter().any(|o| o == name)))
}

const FORMATS: [OutputFormat; 3] = [OutputFormat::Human, OutputFormat::Json, OutputFormat::Yaml];

fn resolve_format(
    flag: Option<OutputFormat>,
    configured: Option<OutputFormat>,
) -> anyhow::Result<OutputFormat> {
    if let Some(f) = flag.or(configured) {
        return Ok(f);
    }
    if !std::io::stdin().is_terminal() {
        return Ok(OutputFormat::Json);
    }
    let choice = dialoguer::Select::new()
        .with_prompt("Report format")
        .items(&["human", "json", "yaml"])
        .default(0)
        .interact()?;
    Ok(FORMATS.get(choice).copied().unwrap_or(OutputFormat::Json))
}

/// Prints a line before and after each probe so a long pass shows where it
/// is.
struct ConsoleProgress;

impl RunObserver for ConsoleProgress {
    fn probe_started(&self, index: usize, total: usize, name: &str) {
        eprintln!("[{}/{}] Running {} test...", index + 1, total, name);
    }

    fn probe_finished(&self, _index: usize, _total: usize, name: &str, outcome: &ProbeOutcome) {
        eprintln!("Outcome for {}: {}", name, outcome.display_value());
        eprintln!("{}", "=".repeat(40));
    }
}

fn print_doctor(r: &DoctorReport) {
    println!("os:       {} {}", r.os_name, r.os_version);
    println!("kernel:   {}", r.kernel);
    println!("arch:     {}", r.arch);
    println!("board:    {}", r.board.as_deref().unwrap_or("unknown"));
    println!("root:     {}", r.is_root);
    println!("headless: {}", r.headless);
    println!("tools:");
    for t in &r.tools {
        let mark = if t.installed { "ok" } else { "MISSING" };
        println!("  {:<16} {:<8} ({})", t.name, mark, t.package);
    }

    println!();
    if r.all_tools_present() {
        println!("All external tools are installed.");
    } else {
        println!("Install the missing tools with:");
        println!("  sudo apt-get install {}", r.missing_packages().join(" "));
    }
    if !r.is_root {
        println!();
        println!("Some probes (GPIO, SD card, Wi-Fi scan) need root; run with sudo for full coverage.");
    }
}
