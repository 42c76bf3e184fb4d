//! stairload CLI entry point

use anyhow::{Context, Result};
use stairload::config::{cli::Cli, cli_convert, toml, validator, Config};
use stairload::driver::Driver;
use stairload::engine::http::HttpEngine;
use stairload::output::{json, text};
use stairload::schedule::compute_plan;
use stairload::stats::exporter::start_file_exporter;
use stairload::stats::MetricsAggregator;
use stairload::target::load_targets_file;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate()?;
    let config = build_config(&cli)?;
    init_logging(config.runtime.log_level());

    println!("stairload v{}", env!("CARGO_PKG_VERSION"));
    println!("Staircase ramp-up HTTP load generator");
    println!();

    validator::validate_config(&config).context("Configuration validation failed")?;

    text::print_configuration(&config);

    let ramp = &config.ramp;
    let plan = compute_plan(
        ramp.start_freq,
        ramp.slope_per_minute,
        ramp.duration_minutes,
        ramp.plateau_minutes,
    )?;
    text::print_plan(&plan);

    if config.runtime.dry_run {
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    run(&config, &plan)
}

/// Diagnostics go to stderr; stdout carries the report
fn init_logging(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Merge the config file (if any) with CLI arguments
fn build_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => {
            let file = toml::parse_toml_file(path)?;
            toml::merge_cli_with_config(cli, file)
        }
        None => cli_convert::cli_to_config(cli),
    }
}

fn run(config: &Config, plan: &stairload::RatePlan) -> Result<()> {
    // Validation guarantees the targets path is set
    let targets_path = config
        .attack
        .targets
        .as_deref()
        .context("A targets file is required")?;

    let defaults = cli_convert::build_target_defaults(&config.attack)?;
    let (catalog, target_errors) = load_targets_file(targets_path, &defaults)?;
    text::print_target_errors(&target_errors);
    if catalog.is_empty() {
        tracing::warn!(path = %targets_path.display(), "no valid targets loaded");
    } else {
        tracing::info!(targets = catalog.len(), "targets loaded");
    }

    let metrics = Arc::new(MetricsAggregator::new());
    let exporter = start_file_exporter(Arc::clone(&metrics), &config.output)?;

    let engine = HttpEngine::new(config.attack.engine_config())?;
    let mut driver = Driver::new(
        engine,
        Arc::new(catalog),
        Arc::clone(&metrics),
        config.attack.name.as_str(),
    );

    println!("Starting attack...");
    println!();
    let outcome = driver.run(plan);

    if let Some(exporter) = exporter {
        let export = exporter.stop();
        if export.failed > 0 {
            tracing::warn!(
                written = export.written,
                failed = export.failed,
                "some metrics snapshots could not be written"
            );
        }
    }

    metrics.close();
    let report = metrics.report();

    let summary = outcome?;
    text::print_results(&report, Some(&summary));

    if let Some(path) = &config.output.json_output {
        json::write_json_report(path, &json::build_report(config, &report))?;
        println!("JSON report written to {}", path.display());
    }

    Ok(())
}
