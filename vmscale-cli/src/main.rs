use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vmscale_config::{ConfigLoader, VmScaleConfig};
use vmscale_report::{read_documents, VarianceGate};

mod cli;
use cli::{Cli, Commands, ConfigCommands, ReportCommands};

const SAMPLE_HEADER: &str = "\
# vmscale configuration
#
# Every field is optional and falls back to the defaults shown below.
# Any value can also be overridden through VMSCALE_* environment
# variables, e.g. VMSCALE_MAX_WORKERS=16 or VMSCALE_RUN_KEY=quota-2k.
";

/// Initialize tracing with environment variable override support
fn init_tracing(log_level: Option<&String>) -> Result<()> {
    let env_filter = match log_level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| {
            eprintln!("Invalid log level '{}', falling back to 'info'", level);
            EnvFilter::new("info")
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    Ok(())
}

fn handle_config_validate(config_file: Option<&PathBuf>) -> Result<()> {
    match config_file {
        Some(path) => {
            info!("Validating configuration file: {:?}", path);
            if !path.exists() {
                return Err(anyhow::anyhow!("Configuration file not found: {:?}", path));
            }
        }
        None => info!("Validating environment-only configuration"),
    }

    match ConfigLoader::new().load(config_file) {
        Ok(_config) => {
            println!("✅ Configuration is valid");
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {}", e);
            error!("Configuration validation failed: {}", e);
            Err(e.into())
        }
    }
}

fn handle_config_generate(output: Option<&PathBuf>, force: bool) -> Result<()> {
    let sample = format!("{}{}", SAMPLE_HEADER, VmScaleConfig::generate_sample());

    match output {
        Some(path) => {
            info!("Generating sample configuration at: {:?}", path);
            if path.exists() && !force {
                return Err(anyhow::anyhow!(
                    "Output file already exists: {:?}. Use --force to overwrite.",
                    path
                ));
            }
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).context("Failed to create output directory")?;
                }
            }
            fs::write(path, sample).context("Failed to write configuration file")?;

            println!("✅ Sample configuration generated at: {:?}", path);
            println!(
                "🔧 Validate with: vmscale config validate --config-file {:?}",
                path
            );
        }
        None => print!("{}", sample),
    }

    Ok(())
}

async fn handle_report_show(file: &Path) -> Result<()> {
    let documents = read_documents(file)
        .await
        .with_context(|| format!("Failed to read report file {:?}", file))?;

    if documents.is_empty() {
        println!("No report documents in {:?}", file);
        return Ok(());
    }

    for (index, report) in documents.iter().enumerate() {
        let verdict = if report.pass { "pass" } else { "FAIL" };
        println!("Document {} [{}]", index + 1, verdict);
        for (phase, runs) in &report.operations {
            for (run_key, timing) in runs {
                match timing.elapsed {
                    Some(elapsed) => {
                        println!("  {:<12} {:<28} {:>10.3}s", phase, run_key, elapsed)
                    }
                    None => println!("  {:<12} {:<28} {:>11}", phase, run_key, "incomplete"),
                }
            }
        }
        for line in report.error_lines() {
            println!("  error: {}", line);
        }
    }

    Ok(())
}

async fn handle_report_gate(
    file: &Path,
    phase: &str,
    baseline_suffix: &str,
    allowed_overhead: f64,
) -> Result<()> {
    let mut documents = read_documents(file)
        .await
        .with_context(|| format!("Failed to read report file {:?}", file))?;
    info!(
        "Gating latest of {} report document(s) from {:?}",
        documents.len(),
        file
    );

    let mut report = documents
        .pop()
        .ok_or_else(|| anyhow::anyhow!("No report documents in {:?}", file))?;

    let gate = VarianceGate::new(phase, baseline_suffix, allowed_overhead);
    gate.apply(&mut report)
        .with_context(|| format!("Failed to gate report in {:?}", file))?;

    if report.pass {
        println!("✅ Variance gate passed for phase {:?}", phase);
        Ok(())
    } else {
        println!("❌ Variance gate failed for phase {:?}", phase);
        for line in report.error_lines() {
            println!("  {}", line);
        }
        Err(anyhow::anyhow!("variance gate failed"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_ref())?;

    match &cli.command {
        Some(Commands::Config { config_cmd }) => match config_cmd {
            ConfigCommands::Validate { config_file } => {
                handle_config_validate(config_file.as_ref())
            }
            ConfigCommands::Generate { output, force } => {
                handle_config_generate(output.as_ref(), *force)
            }
        },
        Some(Commands::Report { report_cmd }) => match report_cmd {
            ReportCommands::Show { file } => handle_report_show(file).await,
            ReportCommands::Gate {
                file,
                phase,
                baseline_suffix,
                allowed_overhead,
            } => handle_report_gate(file, phase, baseline_suffix, *allowed_overhead).await,
        },
        None => {
            // If no subcommand is provided, print help
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().context("Failed to print help")?;
            println!();
            Ok(())
        }
    }
}
