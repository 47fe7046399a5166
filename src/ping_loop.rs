use core::net::Ipv4Addr;
use core::time::Duration;

use std::io::Write;

use anyhow::{Context, Result};
use lib::Buffer;
use tokio::time;

use crate::probe::{self, Probe, Request, Transport};
use crate::shutdown::Shutdown;
use crate::stats::{Rtt, Statistics};

/// Ping until interrupted.
pub const DEFAULT_COUNT: i64 = -1;
/// Time between the end of one probe and the start of the next.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(1);
/// Payload bytes, giving 64 byte ICMP messages.
pub const DEFAULT_PAYLOAD: usize = 56;
/// How long to wait for each reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Options for a ping run.
#[derive(Debug, Clone)]
pub struct PingOptions {
    pub dest: Ipv4Addr,
    pub identifier: u16,
    /// Number of probes to issue, or `None` to continue until shut down.
    pub count: Option<u64>,
    pub wait: Duration,
    pub payload: usize,
    pub timeout: Duration,
}

impl PingOptions {
    /// Interpret a count where negative values mean unbounded.
    pub fn count_from(count: i64) -> Option<u64> {
        u64::try_from(count).ok()
    }
}

/// Repeatedly probe the destination, printing one line per probe to `out`.
///
/// Stops after the configured count or when `shutdown` is triggered, and
/// returns the accumulated statistics. Failed probes never end the run.
pub async fn run<T, O>(
    transport: &mut T,
    options: &PingOptions,
    shutdown: &Shutdown,
    out: &mut O,
) -> Result<Statistics>
where
    T: Transport,
    O: ?Sized + Write,
{
    let ttl = transport.ttl().context("reading default time to live")?;

    let mut request = Request {
        dest: options.dest,
        identifier: options.identifier,
        sequence: 0,
        payload: options.payload,
    };

    let mut stats = Statistics::new(request.size(), ttl);
    let mut buf = Buffer::new();

    loop {
        if options.count.is_some_and(|count| stats.issued() >= count) || shutdown.is_triggered() {
            break;
        }

        let probe = tokio::select! {
            probe = probe::probe(transport, &mut buf, &request, options.timeout) => {
                probe.context("encoding echo request")?
            }
            _ = shutdown.wait() => break,
        };

        stats.record(&probe);
        write_probe(out, options, &stats, &probe)?;
        request.sequence = request.sequence.wrapping_add(1);

        if options.count.is_some_and(|count| stats.issued() >= count) {
            break;
        }

        tokio::select! {
            _ = time::sleep(options.wait) => {}
            _ = shutdown.wait() => break,
        }
    }

    tracing::debug!(
        issued = stats.issued(),
        successes = stats.successes(),
        "ping finished"
    );

    Ok(stats)
}

fn write_probe<O>(
    out: &mut O,
    options: &PingOptions,
    stats: &Statistics,
    probe: &Probe,
) -> Result<()>
where
    O: ?Sized + Write,
{
    match &probe.outcome {
        Ok(reply) => {
            write!(
                out,
                "{} bytes from {} ttl={} seq={} time={}",
                stats.size,
                reply.source,
                stats.ttl,
                probe.sequence,
                Rtt(probe.elapsed)
            )?;

            if !reply.is_echo_reply() {
                write!(out, " ({})", reply.ty)?;
            }

            writeln!(out)?;
        }
        Err(error) => {
            writeln!(
                out,
                "{} ttl={} seq={}: {error}",
                options.dest, stats.ttl, probe.sequence
            )?;
        }
    }

    Ok(())
}
