use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::RwLock;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Args;
use pathmon::config::{Config, ConfigFile};
use pathmon::export::{export_json, generate_report, write_hop_rows};
use pathmon::probe::check_permissions;
use pathmon::state::Session;
use pathmon::trace::{ChannelSink, RunEvent, RunHandle, RunSummary, SessionSink, spawn_run};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    init_tracing(args.verbose);

    let config = load_config(&args)?;
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    tracing::debug!("Effective config: {:?}", config);

    // Check permissions early
    if let Err(e) = check_permissions() {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    if args.is_batch_mode() {
        run_batch_mode(args, config).await
    } else {
        run_streaming_mode(args, config).await
    }
}

/// Diagnostics go to stderr so stdout stays clean for reports
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Defaults, then the config file, then CLI flags
fn load_config(args: &Args) -> Result<Config> {
    let file = match &args.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };
    let mut config = Config::from_file(&file);
    args.apply_to(&mut config);
    Ok(config)
}

/// Stop the run when Ctrl+C arrives
fn spawn_ctrl_c_handler(run: &RunHandle) {
    let cancel = run.cancel_token();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::debug!("Ctrl+C received, stopping");
        cancel.cancel();
    });
}

/// Join the worker without blocking the runtime
async fn join_run(run: RunHandle) -> Result<pathmon::error::Result<RunSummary>> {
    tokio::task::spawn_blocking(move || run.join())
        .await
        .context("Failed to join probe worker")
}

/// Print events as they arrive until the worker finishes
async fn run_streaming_mode(args: Args, config: Config) -> Result<()> {
    let (sink, mut events) = ChannelSink::channel();
    let run = spawn_run(args.target.clone(), config.clone(), sink)
        .context("Failed to start probe worker")?;
    spawn_ctrl_c_handler(&run);
    let cancel = run.cancel_token();

    let mut session = Session::new(args.target.clone(), config.clone());
    let stdout = std::io::stdout();

    // Channel closes when the worker drops its sink
    while let Some(event) = events.recv().await {
        let mut out = stdout.lock();
        match &event {
            RunEvent::Status(message) => writeln!(out, "{}", message)?,
            RunEvent::RouteUpdate(route) => {
                if let Some(hop) = route.last() {
                    writeln!(out, "{}", hop)?;
                }
            }
            RunEvent::TargetResolved(_) | RunEvent::FinalLatency(_) => {}
            RunEvent::StatsSnapshot(snapshot) => {
                writeln!(out)?;
                writeln!(out, "Round {}", snapshot.round)?;
            }
        }

        let is_snapshot = matches!(event, RunEvent::StatsSnapshot(_));
        event.apply(&mut session);

        if is_snapshot {
            write_hop_rows(&session, &mut out)?;
            if config.count.is_some_and(|count| session.rounds() >= count) {
                cancel.cancel();
            }
        }
        out.flush()?;
    }

    match join_run(run).await? {
        Ok(summary) => {
            tracing::debug!(
                "Run finished: {} rounds, {} probes",
                summary.rounds,
                summary.probes_sent
            );
            Ok(())
        }
        // Already reported through the status line
        Err(e) if e.is_resolution() => std::process::exit(1),
        Err(e) => Err(e).context("Probe run failed"),
    }
}

/// Collect `count` rounds silently, then print a report or JSON
async fn run_batch_mode(args: Args, config: Config) -> Result<()> {
    let count = config.count.unwrap_or(1);
    let state = Arc::new(RwLock::new(Session::new(args.target.clone(), config.clone())));

    let run = spawn_run(args.target.clone(), config, SessionSink::new(state.clone()))
        .context("Failed to start probe worker")?;
    spawn_ctrl_c_handler(&run);

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        ticker.tick().await;
        if run.is_finished() || state.read().rounds() >= count {
            break;
        }
    }
    run.stop();

    match join_run(run).await? {
        Ok(_) => {}
        Err(e) if e.is_resolution() => {
            let status = state.read().status.clone();
            eprintln!("{}", status.unwrap_or_else(|| e.to_string()));
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Probe run failed"),
    }

    let session = state.read().clone();
    let stdout = std::io::stdout();
    if args.json {
        export_json(&session, stdout.lock())?;
    } else {
        generate_report(&session, stdout.lock()).context("Failed to write report")?;
    }

    Ok(())
}
