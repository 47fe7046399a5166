use core::fmt::Write as _;
use core::net::Ipv4Addr;
use core::time::Duration;

use std::io::Write;

use anyhow::{Context, Result};
use lib::Buffer;

use crate::names::ReverseLookup;
use crate::probe::{self, Probe, Request, Transport};
use crate::shutdown::Shutdown;
use crate::stats::Rtt;

/// Highest time to live probed.
pub const DEFAULT_MAX_HOPS: u8 = 30;
/// Probes sent for each time to live.
pub const DEFAULT_QUERIES: u16 = 3;
/// Payload bytes, giving 64 byte ICMP messages.
pub const DEFAULT_PAYLOAD: usize = 56;
/// How long to wait for each reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Options for a traceroute run.
#[derive(Debug, Clone)]
pub struct TraceOptions {
    pub dest: Ipv4Addr,
    pub identifier: u16,
    pub max_hops: u8,
    pub queries: u16,
    /// Print addresses without looking up their names.
    pub numeric: bool,
    /// Print a loss summary for every hop.
    pub stats: bool,
    pub payload: usize,
    pub timeout: Duration,
}

/// The probes sent with one time to live.
#[derive(Debug)]
pub struct Hop {
    pub ttl: u8,
    pub probes: Vec<Probe>,
    successes: usize,
}

impl Hop {
    /// Construct an empty hop.
    pub fn new(ttl: u8) -> Self {
        Self {
            ttl,
            probes: Vec::new(),
            successes: 0,
        }
    }

    /// Add the outcome of a probe.
    pub fn push(&mut self, probe: Probe) {
        if probe.is_success() {
            self.successes += 1;
        }

        self.probes.push(probe);
    }

    /// Number of answered probes.
    pub fn successes(&self) -> usize {
        self.successes
    }

    /// Percentage of probes at this hop which were not answered.
    pub fn loss(&self) -> f64 {
        let queries = self.probes.len();

        if queries == 0 {
            return 0.0;
        }

        (queries - self.successes) as f64 / queries as f64 * 100.0
    }

    /// Test if the destination itself answered any probe at this hop.
    pub fn reached(&self, dest: Ipv4Addr) -> bool {
        self.probes.iter().any(|p| p.responder() == Some(dest))
    }
}

/// Summary of a finished traceroute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trace {
    /// Number of hops printed.
    pub hops: u8,
    /// Whether the destination answered.
    pub reached: bool,
}

/// Probe each time to live from 1 up to the maximum, printing one line per
/// hop to `out`.
///
/// Stops after the hop at which the destination answers, after the last hop,
/// or when `shutdown` is triggered. Sequence numbers increase across the
/// whole run.
pub async fn run<T, N, O>(
    transport: &mut T,
    names: &mut N,
    options: &TraceOptions,
    shutdown: &Shutdown,
    out: &mut O,
) -> Result<Trace>
where
    T: Transport,
    N: ReverseLookup,
    O: ?Sized + Write,
{
    let mut buf = Buffer::new();

    let mut request = Request {
        dest: options.dest,
        identifier: options.identifier,
        sequence: 0,
        payload: options.payload,
    };

    let mut trace = Trace {
        hops: 0,
        reached: false,
    };

    'hops: for ttl in 1..=options.max_hops {
        if shutdown.is_triggered() {
            break;
        }

        transport
            .set_ttl(ttl)
            .with_context(|| format!("setting time to live to {ttl}"))?;

        let mut hop = Hop::new(ttl);

        for _ in 0..options.queries {
            let probe = tokio::select! {
                probe = probe::probe(transport, &mut buf, &request, options.timeout) => {
                    probe.context("encoding echo request")?
                }
                _ = shutdown.wait() => break 'hops,
            };

            request.sequence = request.sequence.wrapping_add(1);
            hop.push(probe);
        }

        let line = render(&hop, names, options).await;
        writeln!(out, "{line}")?;
        trace.hops += 1;

        tracing::debug!(ttl, successes = hop.successes(), "hop finished");

        if hop.reached(options.dest) {
            trace.reached = true;
            break;
        }
    }

    Ok(trace)
}

/// Render a hop line.
///
/// A responder is printed once for a run of consecutive probes it answered,
/// followed by the round-trip time of each probe.
async fn render<N>(hop: &Hop, names: &mut N, options: &TraceOptions) -> String
where
    N: ReverseLookup,
{
    let mut line = format!("{:<3}", hop.ttl);
    let mut previous = None;

    for probe in &hop.probes {
        match &probe.outcome {
            Ok(reply) => {
                if previous != Some(reply.source) {
                    if options.numeric {
                        _ = write!(line, " {}", reply.source);
                    } else {
                        let name = names.lookup(reply.source).await;
                        let name = name.unwrap_or_else(|| reply.source.to_string());
                        _ = write!(line, " {name} ({})", reply.source);
                    }
                }

                _ = write!(line, "  {}", Rtt(probe.elapsed));

                if let Some(annotation) = reply.annotation() {
                    _ = write!(line, " {annotation}");
                }
            }
            Err(..) => {
                line.push_str(" *");
            }
        }

        previous = probe.responder();
    }

    if options.stats {
        let queries = hop.probes.len();

        _ = write!(
            line,
            " -- Successes {} Losses {} Loss Rate {:.2}%",
            hop.successes,
            queries - hop.successes,
            hop.loss()
        );
    }

    line
}
