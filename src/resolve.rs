use core::net::Ipv4Addr;
use std::net::SocketAddr;

use anyhow::{Context, Result, anyhow};
use tokio::net;

/// Resolve a host name or IPv4 literal to the address probes are sent to.
pub async fn destination(host: &str) -> Result<Ipv4Addr> {
    let mut addrs = net::lookup_host((host, 0))
        .await
        .with_context(|| anyhow!("resolving destination address `{host}`"))?;

    addrs
        .find_map(|addr| match addr {
            SocketAddr::V4(addr) => Some(*addr.ip()),
            SocketAddr::V6(..) => None,
        })
        .with_context(|| anyhow!("no IPv4 address found for `{host}`"))
}
