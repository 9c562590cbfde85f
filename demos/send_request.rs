//! Send Request - one-shot client for any mailbox server.
//!
//! Each positional argument becomes one frame of the request; each frame of
//! the reply is printed on its own line.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use unix_mailbox::{Payload, SyncClient};

/// Send one request and print the reply
#[derive(Parser, Debug)]
#[command(name = "send_request")]
struct Args {
    /// Socket path of the server
    #[arg(short, long, default_value = "/tmp/unix-mailbox-echo.sock")]
    path: PathBuf,

    /// Seconds to wait for the reply (0 waits forever)
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,

    /// Request frames
    #[arg(required = true)]
    frames: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let client = SyncClient::new(args.path).read_timeout(Duration::from_secs(args.timeout));
    let reply = client.send_request(&Payload::from(args.frames))?;

    for frame in &reply {
        println!("{}", String::from_utf8_lossy(frame));
    }

    Ok(())
}
