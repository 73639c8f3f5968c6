//! Fixwise CLI and REST API entry point.
//!
//! Binary name: `fixwise`
//!
//! Parses CLI arguments, loads config and opens the session store, then
//! dispatches to the appropriate command handler or starts the REST API
//! server.

mod cli;
mod http;
mod state;

use std::time::Duration;

use clap::Parser;
use clap_complete::generate;

use cli::session::Output;
use cli::{Cli, Commands};
use state::AppState;

/// How often `serve` purges idle sessions.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,fixwise_core=debug,fixwise_infra=debug",
        _ => "trace",
    };
    if let Err(e) = fixwise_observe::init_tracing(filter, cli.otel) {
        eprintln!("Warning: tracing setup failed: {e}");
    }

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "fixwise", &mut std::io::stdout());
        return Ok(());
    }

    let out = Output {
        json: cli.json,
        quiet: cli.quiet,
    };

    let in_memory = matches!(cli.command, Commands::Serve { memory: true, .. });
    let state = AppState::init(in_memory).await?;

    let result = match cli.command {
        Commands::Ask {
            session,
            text,
            image,
        } => cli::session::ask(&state, &session, text.as_deref(), image.as_deref(), out).await,

        Commands::History { session } => cli::session::history(&state, &session, out).await,

        Commands::Sessions { limit } => cli::session::list_sessions(&state, limit, out).await,

        Commands::Delete { session } => cli::session::delete(&state, &session, out).await,

        Commands::Serve { port, host, .. } => serve(state, &host, port, out).await,

        Commands::Completions { .. } => unreachable!("handled above"),
    };

    fixwise_observe::shutdown_tracing();
    result
}

async fn serve(state: AppState, host: &str, port: u16, out: Output) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if !out.quiet {
        println!(
            "  {} Fixwise API listening on {} ({} sessions)",
            console::style("⚡").bold(),
            console::style(format!("http://{addr}")).cyan(),
            state.manager.store().name()
        );
        println!(
            "  {}",
            console::style(format!("Data directory: {}", state.data_dir.display())).dim()
        );
        println!("  {}", console::style("Press Ctrl+C to stop").dim());
    }

    let sweeper = tokio::spawn(sweep_idle_sessions(state.clone()));
    let router = http::router::build_router(state);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    sweeper.abort();
    served?;

    if !out.quiet {
        println!("\n  Server stopped.");
    }
    Ok(())
}

/// Purge sessions idle past the configured TTL, once a minute.
async fn sweep_idle_sessions(state: AppState) {
    let ttl = state.config.session_ttl();
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match state.manager.purge_idle(ttl).await {
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "idle sweep removed sessions"),
            Err(e) => tracing::warn!(error = %e, "idle sweep failed"),
        }
    }
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
