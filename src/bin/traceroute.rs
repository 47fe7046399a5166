use core::time::Duration;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use lib::Pinger;
use lib::icmp::v4::Header;

use pingtrace::names::NameCache;
use pingtrace::traceroute::{self, TraceOptions};
use pingtrace::{cli, resolve, shutdown};

#[derive(Parser)]
#[clap(about = "Print the route ICMP echo requests take to a host")]
struct Opts {
    /// Path to load configuration files from.
    #[clap(long, default_value = cli::DEFAULT_CONFIG)]
    config: Vec<PathBuf>,
    /// Print hop addresses numerically instead of looking up their names.
    #[clap(short = 'n')]
    numeric: bool,
    /// Number of probes to send for each hop.
    #[clap(short = 'q', value_parser = clap::value_parser!(u16).range(1..))]
    queries: Option<u16>,
    /// Print a loss summary for each hop.
    #[clap(short = 'S')]
    stats: bool,
    /// Maximum time to live to probe with.
    #[clap(short = 'm', value_parser = clap::value_parser!(u8).range(1..))]
    max_hops: Option<u8>,
    /// Seconds to wait for each reply.
    #[clap(short = 'w', value_parser = cli::seconds)]
    timeout: Option<Duration>,
    /// Number of data bytes to send.
    #[clap(short = 's')]
    size: Option<usize>,
    /// Host name or IPv4 address to trace.
    dest: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    cli::init_tracing();
    let opts = Opts::parse();
    cli::report(inner(opts).await)
}

async fn inner(opts: Opts) -> Result<()> {
    let config = cli::load_config(&opts.config)?.traceroute;

    let options = TraceOptions {
        dest: resolve::destination(&opts.dest).await?,
        identifier: cli::identifier(),
        max_hops: opts
            .max_hops
            .or(config.max_hops)
            .unwrap_or(traceroute::DEFAULT_MAX_HOPS),
        queries: opts
            .queries
            .or(config.queries)
            .unwrap_or(traceroute::DEFAULT_QUERIES),
        numeric: opts.numeric || config.numeric.unwrap_or(false),
        stats: opts.stats || config.stats.unwrap_or(false),
        payload: opts
            .size
            .or(config.size)
            .unwrap_or(traceroute::DEFAULT_PAYLOAD),
        timeout: opts
            .timeout
            .or(config.timeout)
            .unwrap_or(traceroute::DEFAULT_TIMEOUT),
    };

    tracing::debug!(?options, "tracing");

    let mut pinger = Pinger::v4().context("opening raw ICMP socket")?;
    let mut names = NameCache::new();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(
        out,
        "traceroute to {} ({}), {} hops max, {} byte packets",
        opts.dest,
        options.dest,
        options.max_hops,
        Header::SIZE + options.payload
    )?;

    let trace = traceroute::run(
        &mut pinger,
        &mut names,
        &options,
        &shutdown::ctrl_c(),
        &mut out,
    )
    .await?;

    tracing::debug!(hops = trace.hops, reached = trace.reached, "trace finished");
    out.flush()?;
    Ok(())
}
