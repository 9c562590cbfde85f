//! Echo Server - mailbox server that sends every request straight back.
//!
//! This example demonstrates:
//! - Building a server from a `ServerConfig`
//! - Logging through `tracing` with an `EnvFilter`
//! - Stopping the event loop from a Ctrl-C handler
//!
//! # Running
//!
//! ```text
//! cargo run --example echo_server -- --path /tmp/echo.sock --verbose
//! cargo run --example send_request -- --path /tmp/echo.sock This is a test
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use unix_mailbox::{
    HandlerResult, MailboxServer, Payload, ServerConfig, DEFAULT_MAX_BACKLOG,
};

/// Echo every request back to its sender
#[derive(Parser, Debug)]
#[command(name = "echo_server")]
#[command(about = "Unix socket mailbox that echoes requests")]
struct Args {
    /// Socket path to listen on
    #[arg(short, long, default_value = "/tmp/unix-mailbox-echo.sock")]
    path: PathBuf,

    /// Pending connection backlog
    #[arg(short, long, default_value_t = DEFAULT_MAX_BACKLOG)]
    backlog: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = if args.verbose {
        "unix_mailbox=debug,echo_server=debug,warn"
    } else {
        "unix_mailbox=info,echo_server=info,warn"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let config = ServerConfig::new(args.path).max_backlog(args.backlog);
    let handler = |sender: &str, request: Payload| -> HandlerResult {
        info!(sender, frames = request.len(), "Echoing request");
        Ok(request)
    };
    let mut server = MailboxServer::bind(config, handler)?;

    let stop = server.stop_handle();
    ctrlc::set_handler(move || stop.request_stop())?;

    info!("Press Ctrl-C to stop");
    server.run()?;

    Ok(())
}
