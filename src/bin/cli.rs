//! Gibson CLI Client
//!
//! Command-line interface for talking to a Gibson server.

use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use gibson_client::{Client, Config, GibsonError, Opcode, PendingReply};
use tracing_subscriber::{fmt, EnvFilter};

/// Gibson CLI
#[derive(Parser, Debug)]
#[command(name = "gibson-cli")]
#[command(about = "CLI for the Gibson cache server")]
#[command(version)]
struct Args {
    /// Server address (tcp://host:port, host:port or unix:///path)
    #[arg(short, long, default_value = "unix:///var/run/gibson.sock")]
    address: String,

    /// Reply timeout in milliseconds (0 waits forever)
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single command, e.g. `exec set 0 foo bar`
    Exec {
        /// Command name (case-insensitive)
        name: String,

        /// Command arguments
        args: Vec<String>,
    },

    /// Pipeline GET requests against one key and report throughput
    Bench {
        /// Number of GET requests
        #[arg(short, long, default_value = "100000")]
        count: usize,

        /// Key to read
        #[arg(short, long, default_value = "foo")]
        key: String,

        /// Value stored under the key before the run
        #[arg(short, long, default_value = "bar")]
        value: String,
    },
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gibson_client=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), GibsonError> {
    let config = Config::builder()
        .connection_string(&args.address)?
        .reply_timeout_ms(args.timeout_ms)
        .build();

    tracing::info!("Gibson CLI v{}", gibson_client::VERSION);
    tracing::info!("Connecting to {}", config.address);

    let client = Client::connect(config)?;

    let result = match args.command {
        Commands::Exec { name, args } => exec(&client, &name, &args),
        Commands::Bench { count, key, value } => bench(&client, count, &key, &value),
    };

    client.close();
    result
}

fn exec(client: &Client, name: &str, args: &[String]) -> Result<(), GibsonError> {
    match client.command(name, args) {
        Ok(value) => {
            println!("{}", value);
            Ok(())
        }
        // Server-side errors are an answer, not a CLI failure
        Err(GibsonError::Server(e)) => {
            println!("(error) {}", e);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn bench(client: &Client, count: usize, key: &str, value: &str) -> Result<(), GibsonError> {
    client.set(0, key, value)?;
    client.ping()?;

    tracing::info!("Starting benchmark: {} pipelined GETs", count);
    let start = Instant::now();

    // Keep the pipeline within the configured depth by draining as we go
    let window = client.config().max_pipeline_depth.unwrap_or(count).max(1);
    let mut in_flight: std::collections::VecDeque<PendingReply> =
        std::collections::VecDeque::with_capacity(window);
    let mut unexpected = 0usize;

    for _ in 0..count {
        if in_flight.len() == window {
            if let Some(pending) = in_flight.pop_front() {
                unexpected += check_reply(pending, value)?;
            }
        }
        in_flight.push_back(client.send(Opcode::Get, &[key])?);
    }
    for pending in in_flight {
        unexpected += check_reply(pending, value)?;
    }

    let elapsed = start.elapsed().as_secs_f64();
    println!(
        "Benchmark finished: {:.2} requests/second ( time: {:.2} s, unexpected replies: {} )",
        count as f64 / elapsed.max(f64::EPSILON),
        elapsed,
        unexpected
    );

    let stats = client.stats()?;
    println!();
    println!("{}", stats);
    println!();

    client.del(key)?;
    Ok(())
}

fn check_reply(pending: PendingReply, expected: &str) -> Result<usize, GibsonError> {
    match pending.wait() {
        Ok(v) if v.as_str() == Some(expected) => Ok(0),
        Ok(v) => {
            tracing::warn!("Unexpected data \"{}\"", v);
            Ok(1)
        }
        Err(e) if !e.is_fatal() => {
            tracing::warn!("Unexpected error \"{}\"", e);
            Ok(1)
        }
        Err(e) => Err(e),
    }
}
