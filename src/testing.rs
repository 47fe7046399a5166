//! A scripted transport for exercising the probing loops without a socket.

use core::future;
use core::net::Ipv4Addr;
use core::time::Duration;

use std::collections::VecDeque;

use anyhow::{Result, anyhow};
use lib::icmp::v4::Type;
use lib::{Buffer, Echo, Reply};
use tokio::time;

use crate::probe::Transport;

/// An echo request as observed by the fake transport.
#[derive(Debug, Clone)]
pub(crate) struct Sent {
    pub(crate) dest: Ipv4Addr,
    pub(crate) ttl: u8,
    pub(crate) identifier: u16,
    pub(crate) sequence: u16,
    pub(crate) len: usize,
}

/// How the network answers a request.
pub(crate) enum Response {
    /// Deliver a message after the given delay.
    After(Duration, Reply),
    /// Never deliver anything.
    Silence,
    /// Fail to send the request.
    SendError,
    /// Fail while receiving.
    RecvError,
}

pub(crate) struct FakeTransport<F> {
    ttl: u8,
    send_delay: Duration,
    script: F,
    pending: VecDeque<Response>,
    pub(crate) sent: Vec<Sent>,
}

impl<F> FakeTransport<F>
where
    F: FnMut(&Sent) -> Vec<Response>,
{
    pub(crate) fn new(script: F) -> Self {
        Self {
            ttl: 64,
            send_delay: Duration::ZERO,
            script,
            pending: VecDeque::new(),
            sent: Vec::new(),
        }
    }

    pub(crate) fn with_send_delay(mut self, send_delay: Duration) -> Self {
        self.send_delay = send_delay;
        self
    }
}

impl<F> Transport for FakeTransport<F>
where
    F: FnMut(&Sent) -> Vec<Response>,
{
    async fn send(&mut self, packet: &[u8], dest: Ipv4Addr) -> Result<()> {
        let field = |at: usize| u16::from_be_bytes([packet[at], packet[at + 1]]);

        let sent = Sent {
            dest,
            ttl: self.ttl,
            identifier: field(4),
            sequence: field(6),
            len: packet.len(),
        };

        if !self.send_delay.is_zero() {
            time::sleep(self.send_delay).await;
        }

        let responses = (self.script)(&sent);
        self.sent.push(sent);

        if responses.iter().any(|r| matches!(r, Response::SendError)) {
            return Err(anyhow!("Network is unreachable"));
        }

        self.pending = responses.into();
        Ok(())
    }

    async fn recv(&mut self, _: &mut Buffer) -> Result<Reply> {
        match self.pending.pop_front() {
            Some(Response::After(delay, reply)) => {
                time::sleep(delay).await;
                Ok(reply)
            }
            Some(Response::RecvError) => Err(anyhow!("Connection refused")),
            Some(Response::Silence | Response::SendError) | None => future::pending().await,
        }
    }

    fn ttl(&self) -> Result<u8> {
        Ok(self.ttl)
    }

    fn set_ttl(&mut self, ttl: u8) -> Result<()> {
        self.ttl = ttl;
        Ok(())
    }
}

fn message(source: Ipv4Addr, ty: Type, identifier: u16, sequence: u16) -> Reply {
    Reply {
        source,
        ttl: 60,
        ty,
        code: 0,
        checksum: 0,
        expected_checksum: 0,
        echo: Some(Echo {
            identifier,
            sequence,
        }),
    }
}

pub(crate) fn echo_reply(source: Ipv4Addr, identifier: u16, sequence: u16) -> Reply {
    message(source, Type::ECHO_REPLY, identifier, sequence)
}

pub(crate) fn echo_request(source: Ipv4Addr, identifier: u16, sequence: u16) -> Reply {
    message(source, Type::ECHO_REQUEST, identifier, sequence)
}

pub(crate) fn time_exceeded(source: Ipv4Addr, identifier: u16, sequence: u16) -> Reply {
    message(source, Type::TIME_EXCEEDED, identifier, sequence)
}

pub(crate) fn unreachable(source: Ipv4Addr, code: u8) -> Reply {
    Reply {
        code,
        echo: None,
        ..message(source, Type::UNREACHABLE, 0, 0)
    }
}
