//! Raw ICMPv4 sockets and the wire formats needed to ping through them.

#![allow(clippy::new_without_default)]

mod error;
pub use self::error::Error;

mod pinger;
pub use self::pinger::{Echo, Pinger, Reply};

mod buf;
pub use self::buf::Buffer;

pub mod icmp;
mod ip;
