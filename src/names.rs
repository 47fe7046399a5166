use core::net::{IpAddr, Ipv4Addr};

use std::collections::HashMap;

use tokio::task;

/// Look up the host name of an address.
#[allow(async_fn_in_trait)]
pub trait ReverseLookup {
    /// Get the name of the given address, or `None` if it has none or the
    /// lookup failed.
    async fn lookup(&mut self, addr: Ipv4Addr) -> Option<String>;
}

/// A cache of reverse name lookups performed through the system resolver.
///
/// Each address is only looked up once. Failed lookups are cached as having
/// no name.
pub struct NameCache {
    map: HashMap<Ipv4Addr, Option<String>>,
}

impl NameCache {
    /// Construct a new empty name cache.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }
}

impl ReverseLookup for NameCache {
    async fn lookup(&mut self, addr: Ipv4Addr) -> Option<String> {
        if let Some(name) = self.map.get(&addr) {
            return name.clone();
        }

        let result = task::spawn_blocking(move || dns_lookup::lookup_addr(&IpAddr::V4(addr))).await;

        let name = match result {
            Ok(Ok(name)) if name.parse::<Ipv4Addr>() != Ok(addr) => Some(name),
            Ok(Ok(..)) => None,
            Ok(Err(error)) => {
                tracing::debug!(%addr, %error, "reverse lookup failed");
                None
            }
            Err(error) => {
                tracing::warn!(%addr, %error, "reverse lookup task failed");
                None
            }
        };

        self.map.insert(addr, name.clone());
        name
    }
}
