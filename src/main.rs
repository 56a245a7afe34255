//! quakemap - Interactive earthquake map from USGS feeds.
//!
//! Fetches a time-window feed, filters by magnitude, summarizes, and draws
//! colored, sized circle markers with popups, either in a browser (`serve`)
//! or on the terminal (`show`).

use std::io;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

mod cli;
mod client;
mod controller;
mod errors;
mod filters;
mod models;
mod output;
mod presenter;
mod server;
mod stats;
mod surface;

use cli::{Cli, Command};
use client::UsgsClient;
use controller::{Action, Controller, Phase, ViewState};
use presenter::MarkerPresenter;
use surface::SceneLayer;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    let presenter = if cli.utc {
        MarkerPresenter::utc()
    } else {
        MarkerPresenter::local()
    };
    let timeout = Duration::from_secs(cli.timeout_secs);

    match cli.command {
        Command::Serve(args) => cmd_serve(args, &cli.feed_url, timeout, cli.utc),
        Command::Show(args) => cmd_show(args, &cli.feed_url, timeout, presenter),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the `show` command - one fetch, rendered to the terminal.
fn cmd_show(
    args: cli::ShowArgs,
    feed_url: &str,
    timeout: Duration,
    presenter: MarkerPresenter,
) -> Result<()> {
    let client =
        UsgsClient::with_base_url(feed_url, timeout).context("failed to create feed client")?;

    let mut controller = Controller::new(
        SceneLayer::new(),
        presenter,
        ViewState::new(args.window, args.min_magnitude),
    );
    controller.run(&client, Action::Mount);

    let view = controller.snapshot();
    controller.shutdown();

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_view(&mut handle, &view, args.format)?;

    if let Phase::Failed { message } = &controller.state().phase {
        anyhow::bail!("could not load the {} feed: {}", args.window, message);
    }
    Ok(())
}

/// Execute the `serve` command - start the web map.
fn cmd_serve(args: cli::ServeArgs, feed_url: &str, timeout: Duration, utc: bool) -> Result<()> {
    let config = server::ServerConfig {
        port: args.port,
        host: args.host.clone(),
        window: args.window,
        threshold: args.min_magnitude,
        utc,
    };

    // Built before the runtime starts; it is only ever used from blocking
    // worker threads.
    let client =
        UsgsClient::with_base_url(feed_url, timeout).context("failed to create feed client")?;
    tracing::debug!("feed host {}", client.base_url());

    // Print startup message
    let url = format!("http://{}:{}", args.host, args.port);
    println!("\x1b[1m🌍 quakemap\x1b[0m");
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("  Local:     \x1b[96m{url}\x1b[0m");
    println!("  Window:    {}", args.window.label());
    println!("  Min mag:   {}", args.min_magnitude);
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("\x1b[2mPress Ctrl+C to stop\x1b[0m\n");

    // Open browser if requested (using xdg-open/open command)
    if args.open {
        #[cfg(target_os = "linux")]
        let _ = std::process::Command::new("xdg-open").arg(&url).spawn();
        #[cfg(target_os = "macos")]
        let _ = std::process::Command::new("open").arg(&url).spawn();
        #[cfg(target_os = "windows")]
        let _ = std::process::Command::new("cmd").args(["/c", "start", &url]).spawn();
    }

    // Run the async server on tokio runtime
    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(server::run_server(config, Arc::new(client)))
}
