use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use globalstore::cli::{Cli, Command, OutputFormat};
use globalstore::config::Config;
use globalstore::scenario::Scenario;
use globalstore::{Coordinator, CoordinatorConfig, JsonlLogger};

/// Source name the CLI uses for its own subscriptions
const CLI_SOURCE: &str = "gs";

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > INFO; stdout is reserved for output
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    debug!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn build_coordinator(config: &Config, debug_mode: bool) -> Result<Coordinator> {
    let coordinator = Coordinator::new(CoordinatorConfig {
        debug_mode: debug_mode || config.coordinator.debug_mode,
    });

    if let Some(path) = &config.event_log {
        let sink = JsonlLogger::open(path)?;
        coordinator
            .add_logger(Arc::new(sink))
            .context("Failed to attach event log")?;
        info!(path = %path.display(), "Event log attached");
    }

    Ok(coordinator)
}

fn cmd_run(config: &Config, path: &Path, format: OutputFormat, watch: bool, debug_mode: bool) -> Result<()> {
    debug!(?path, ?format, watch, debug_mode, "cmd_run: called");
    let scenario = Scenario::load(path)?;
    scenario.validate()?;

    let coordinator = build_coordinator(config, debug_mode)?;
    scenario.register_tenants(&coordinator)?;

    let watcher = watch.then(|| {
        coordinator.subscribe_to_global_state(CLI_SOURCE, move |state| match format.render(state, true) {
            Ok(line) => println!("{} {}", "●".dimmed(), line.trim_end()),
            Err(e) => eprintln!("{} {}", "✗".red(), e),
        })
    });

    let outcome = scenario.run_steps(&coordinator);
    if let Some(watcher) = watcher {
        watcher.unsubscribe();
    }
    outcome?;

    println!("{}", format.render(&coordinator.global_state(), false)?.trim_end());
    eprintln!(
        "{} Ran {} step(s) across {} tenant(s)",
        "✓".green(),
        scenario.steps.len(),
        scenario.tenants.len()
    );
    Ok(())
}

fn cmd_check(path: &Path) -> Result<()> {
    debug!(?path, "cmd_check: called");
    let scenario = Scenario::load(path)?;
    let issues = scenario.issues();
    if issues.is_empty() {
        println!(
            "{} {} is valid ({} tenant(s), {} step(s))",
            "✓".green(),
            path.display().to_string().cyan(),
            scenario.tenants.len(),
            scenario.steps.len()
        );
        return Ok(());
    }

    for issue in &issues {
        println!("{} {}", "✗".red(), issue);
    }
    eyre::bail!("{} issue(s) found in {}", issues.len(), path.display())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run {
            scenario,
            format,
            watch,
            debug,
        } => cmd_run(&config, &scenario, format, watch, debug),
        Command::Check { scenario } => cmd_check(&scenario),
    }
}
