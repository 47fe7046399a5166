use core::time::Duration;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use lib::Pinger;

use pingtrace::ping_loop::{self, PingOptions};
use pingtrace::{cli, resolve, shutdown};

#[derive(Parser)]
#[clap(about = "Send ICMP echo requests to a host")]
struct Opts {
    /// Path to load configuration files from.
    #[clap(long, default_value = cli::DEFAULT_CONFIG)]
    config: Vec<PathBuf>,
    /// Number of echo requests to send. Negative values ping until
    /// interrupted.
    #[clap(short = 'c', allow_negative_numbers = true)]
    count: Option<i64>,
    /// Seconds to wait between echo requests.
    #[clap(short = 'i', value_parser = cli::seconds)]
    wait: Option<Duration>,
    /// Number of data bytes to send.
    #[clap(short = 's')]
    size: Option<usize>,
    /// Seconds to wait for each reply.
    #[clap(short = 't', value_parser = cli::seconds)]
    timeout: Option<Duration>,
    /// Host name or IPv4 address to ping.
    dest: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    cli::init_tracing();
    let opts = Opts::parse();
    cli::report(inner(opts).await)
}

async fn inner(opts: Opts) -> Result<()> {
    let config = cli::load_config(&opts.config)?.ping;

    let count = opts
        .count
        .or(config.count)
        .unwrap_or(ping_loop::DEFAULT_COUNT);

    let options = PingOptions {
        dest: resolve::destination(&opts.dest).await?,
        identifier: cli::identifier(),
        count: PingOptions::count_from(count),
        wait: opts
            .wait
            .or(config.wait)
            .unwrap_or(ping_loop::DEFAULT_WAIT),
        payload: opts
            .size
            .or(config.size)
            .unwrap_or(ping_loop::DEFAULT_PAYLOAD),
        timeout: opts
            .timeout
            .or(config.timeout)
            .unwrap_or(ping_loop::DEFAULT_TIMEOUT),
    };

    tracing::debug!(?options, "pinging");

    let mut pinger = Pinger::v4().context("opening raw ICMP socket")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(
        out,
        "PING {} ({}): {} data bytes",
        opts.dest, options.dest, options.payload
    )?;

    let stats = ping_loop::run(&mut pinger, &options, &shutdown::ctrl_c(), &mut out).await?;

    writeln!(out)?;
    writeln!(out, "{stats}")?;
    out.flush()?;
    Ok(())
}
