use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use topdog::health::{ProbeRunner, ProbeSet, ResultSet, RunnerConfig, ScheduledProbeRunner};
use topdog::probes::{DownstreamProbe, StaticFilesProbe};
use topdog::query::DownstreamClient;
use topdog::server::{AppState, HealthSource, create_router};

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

const APP_NAME: &str = "topdog";

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

/// Probes registered for every tier
fn build_probes(config: &Config) -> Result<ProbeSet> {
    let mut probes = ProbeSet::new();
    probes.add(
        "staticFiles",
        StaticFilesProbe::new(config.static_files.path.clone(), config.static_files.required()),
    )?;

    if config.backend.probe {
        let client = DownstreamClient::new().context("Failed to build HTTP client")?;
        probes.add("backend", DownstreamProbe::new(client, config.backend.endpoint()))?;
    }
    Ok(probes)
}

fn build_runner(config: &Config, shutdown: &CancellationToken) -> Result<ProbeRunner> {
    let probes = build_probes(config)?;
    info!("Registered health probes: {:?}", probes);

    let runner_config = RunnerConfig::new(probes)
        .with_timeout(config.health.timeout())
        .with_parent(shutdown.clone())
        .with_failure_logger(|name, message, diagnostic| {
            log::warn!("{}: {}: {}", name, message, diagnostic);
        });
    Ok(ProbeRunner::new(runner_config))
}

async fn run_application(cli: &Cli, config: Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None => handle_serve_command(config, false).await,
        Some(Commands::Serve { port, scheduled }) => {
            let mut config = config;
            config::apply_overrides(&mut config, None, None, *port);
            config.validate()?;
            handle_serve_command(config, *scheduled).await
        }
        Some(Commands::Check { json }) => handle_check_command(config, *json).await,
    }
}

async fn handle_serve_command(config: Config, scheduled: bool) -> Result<()> {
    let shutdown = CancellationToken::new();
    let runner = build_runner(&config, &shutdown)?;

    let mut background = None;
    let health = if scheduled || config.health.scheduled {
        let cached = Arc::new(ScheduledProbeRunner::new(runner, config.health.frequency()));
        cached.start();
        background = Some(Arc::clone(&cached));
        HealthSource::Scheduled(cached)
    } else {
        HealthSource::OnDemand(runner)
    };

    let app = create_router(AppState { health });
    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("{} starting on port {}", APP_NAME, config.server.port);
    println!("{} {}", "Listening on".green(), addr);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();
    let mut server = tokio::spawn(server);

    tokio::select! {
        result = &mut server => {
            result.context("Server task failed")?.context("Server error")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Received shutdown signal");
            if let Some(cached) = &background {
                cached.stop();
            }
            shutdown.cancel();

            let grace = config.server.shutdown_grace();
            match tokio::time::timeout(grace, server).await {
                Ok(result) => result.context("Server task failed")?.context("Server error")?,
                Err(_) => log::warn!("Shutdown grace period of {:?} elapsed", grace),
            }
        }
    }

    info!("{} shutting down", APP_NAME);
    Ok(())
}

fn print_results(results: &ResultSet) {
    for (name, outcome) in results {
        if outcome.healthy {
            println!("{} {}", "ok  ".green(), name);
        } else {
            println!("{} {}: {}", "FAIL".red(), name, outcome.message());
            if !outcome.diagnostic().is_empty() {
                println!("{}", outcome.diagnostic().dimmed());
            }
        }
    }
}

async fn handle_check_command(config: Config, json: bool) -> Result<()> {
    info!("Running health probes once");
    let shutdown = CancellationToken::new();
    let runner = build_runner(&config, &shutdown)?;
    let results = runner.run().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(&results);
    }

    if results.failed() {
        eyre::bail!("{} of {} probes unhealthy", results.failures().count(), results.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.is_verbose());

    // Load configuration
    let mut config = config::load_config(cli.config.as_ref()).context("Failed to load configuration")?;
    config::apply_overrides(&mut config, cli.static_path.as_ref(), cli.backend.as_deref(), None);
    config.validate().context("Invalid configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, config).await.context("Application failed")?;

    Ok(())
}
