mod cli;
mod clients;
mod config;
mod engine;
mod probe;
mod reconcile;
mod schema;
mod service;
mod ui;

use anyhow::{Context as _, Result};
use clap::Parser;
use cli::Cli;
use clients::Clients;
use config::ResolvedConfig;
use declarative::RunSummary;
use engine::ExecutionPlan;
use restkit::UreqTransport;
use std::collections::HashMap;
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let env: HashMap<String, String> = std::env::vars().collect();
    let config = ResolvedConfig::load(&cli.config, &env)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    log::debug!(
        "Resolved config for {} at {} ({} instances)",
        config.username,
        config.base_url,
        config.instances.len()
    );

    let clients = Clients::new(Arc::new(UreqTransport::new()), cli.dry_run);
    if clients.is_dry_run() && !cli.quiet {
        ui::info("DRY-RUN MODE: no mutations will be applied");
    }

    let requested = engine::parse_services(&cli.services);
    if requested.is_empty() {
        if !cli.quiet {
            ui::warn("No known services requested, nothing to do");
        }
        return Ok(ExitCode::SUCCESS);
    }
    log::info!("Requested services: {}", join(&requested));

    let reachable = probe::probe(&config, &clients, &requested);
    log::info!("Reachable services: {}", join(&reachable));

    let plan = ExecutionPlan::build(&requested, &reachable);
    log::debug!("Reconciling {} of {} services", plan.reconcile_count(), plan.steps().len());

    let mut summary = RunSummary::new();
    engine::execute(&plan, &mut summary, |service, applied| {
        reconcile::reconcile(service, &config, &clients, applied)
    });

    print!("{}", summary.render());

    if let Some(path) = &cli.summary_file {
        fs::write(path, summary.to_json()?)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        if !cli.quiet {
            ui::dim(&format!("Summary written to {}", path.display()));
        }
    }

    if summary.has_failures() {
        ui::error(&format!("{} service(s) failed", summary.failed_services().len()));
        Ok(ExitCode::FAILURE)
    } else {
        if !cli.quiet {
            ui::success("Stack configured");
        }
        Ok(ExitCode::SUCCESS)
    }
}

fn join(services: &[service::ServiceName]) -> String {
    services
        .iter()
        .map(service::ServiceName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
