use core::net::{IpAddr, Ipv4Addr};
use std::net::ToSocketAddrs;

use anyhow::{Context, Result};
use clap::Parser;
use lib::Pinger;
use lib::icmp::v4::encode_echo_request;

#[derive(Parser)]
struct Opts {
    /// Time to live to send echo requests with.
    #[clap(long)]
    ttl: Option<u8>,
    /// Destination to ping.
    dest: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let opts = Opts::try_parse()?;

    let dest: Ipv4Addr = (opts.dest.as_str(), 0)
        .to_socket_addrs()?
        .find_map(|a| match a.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(..) => None,
        })
        .context("resolving destination address")?;

    let pinger = Pinger::v4()?;

    if let Some(ttl) = opts.ttl {
        pinger.set_ttl(ttl)?;
    }

    let identifier = std::process::id() as u16;
    let mut buf = lib::Buffer::new();

    let mut sequence = 0u16;

    loop {
        encode_echo_request(&mut buf, identifier, sequence, 56)?;
        pinger.send_to(buf.as_bytes(), dest).await?;

        let reply = loop {
            let reply = pinger.recv(&mut buf).await?;

            if !reply.is_echo_request() {
                break reply;
            }
        };

        dbg!(reply);
        sequence = sequence.wrapping_add(1);
        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
    }
}
