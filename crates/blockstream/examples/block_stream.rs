//! Example: stream blocks from a prioritized provider list, one JSON line per block on stdout.
//!
//! Usage:
//!
//!   cargo run -p blockstream --example block_stream -- --provider primary=https://... --provider backup=https://...
//!
//! Options (each falls back to the matching BLOCKSTREAM_* environment variable):
//!   --provider [name[:priority]=]url   Repeatable. Priority defaults to the position in the list.
//!   --poll-interval <secs>             Sleep between polls. Default: 5.
//!   --failure-threshold <n>            Consecutive failed polls before a provider is failed. Default: 3.
//!   --head-lag <secs>                  Head age after which each poll counts as a failure. Default: 60.
//!   --timeout <secs>                   Bound on each RPC call. Default: 10.
//!
//! Diagnostics go to stderr (RUST_LOG, default `blockstream=info`). Exits non-zero when every
//! provider has failed.

use anyhow::Context;
use blockstream::config::{
    ENV_FAILURE_THRESHOLD, ENV_HEAD_LAG_SECS, ENV_POLL_INTERVAL_SECS, ENV_PROVIDERS,
    ENV_REQUEST_TIMEOUT_SECS,
};
use blockstream::{JsonLinesSink, StreamConfig, StreamLoop};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: block_stream --provider [name[:priority]=]url [--provider ...] \
                     [--poll-interval SECS] [--failure-threshold N] [--head-lag SECS] [--timeout SECS]";

/// Command-line values override the environment, keyed by the same variable names.
fn parse_args() -> HashMap<&'static str, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut overrides = HashMap::new();
    let mut providers: Vec<String> = Vec::new();
    let mut i = 1;
    while i < args.len() {
        let key = match args[i].as_str() {
            "--provider" => {
                i += 1;
                if let Some(p) = args.get(i) {
                    providers.push(p.clone());
                }
                i += 1;
                continue;
            }
            "--poll-interval" => ENV_POLL_INTERVAL_SECS,
            "--failure-threshold" => ENV_FAILURE_THRESHOLD,
            "--head-lag" => ENV_HEAD_LAG_SECS,
            "--timeout" => ENV_REQUEST_TIMEOUT_SECS,
            "--help" | "-h" => {
                eprintln!("{}", USAGE);
                std::process::exit(0);
            }
            other => {
                eprintln!("unknown argument {}\n{}", other, USAGE);
                std::process::exit(2);
            }
        };
        i += 1;
        if let Some(v) = args.get(i) {
            overrides.insert(key, v.clone());
        }
        i += 1;
    }
    if !providers.is_empty() {
        overrides.insert(ENV_PROVIDERS, providers.join(","));
    }
    overrides
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("blockstream=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let overrides = parse_args();
    let config = StreamConfig::from_lookup(|key| {
        overrides
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    })
    .context("invalid configuration")?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let mut stream = StreamLoop::connect(&config, JsonLinesSink::stdout())?;
        tokio::select! {
            result = stream.run() => result.context("block stream stopped"),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                Ok(())
            }
        }
    })
}
