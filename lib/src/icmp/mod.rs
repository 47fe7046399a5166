//! ICMP message layouts.

mod macros;

pub mod v4;
