//! ICMP echo based `ping` and `traceroute`.
//!
//! Both tools drive a [`probe::Transport`], which is implemented for the raw
//! socket in [`lib::Pinger`].

#![allow(clippy::new_without_default)]

pub mod cli;
pub mod config;
pub mod names;
pub mod ping_loop;
pub mod probe;
pub mod resolve;
pub mod shutdown;
pub mod stats;
pub mod traceroute;

#[cfg(test)]
mod testing;
