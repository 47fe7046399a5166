//! A single echo request and the wait for whatever answers it.

use core::error;
use core::fmt;
use core::net::Ipv4Addr;
use core::time::Duration;

use anyhow::{Error, Result};
use lib::icmp::v4::{Header, encode_echo_request};
use lib::{Buffer, Pinger, Reply};
use tokio::time::{self, Instant};

/// The socket operations a probe needs.
///
/// Implemented for the raw [`Pinger`] socket.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Send an encoded ICMP message.
    async fn send(&mut self, packet: &[u8], dest: Ipv4Addr) -> Result<()>;

    /// Receive the next ICMP message into `buf`.
    async fn recv(&mut self, buf: &mut Buffer) -> Result<Reply>;

    /// The time to live outgoing messages are sent with.
    fn ttl(&self) -> Result<u8>;

    /// Change the time to live outgoing messages are sent with.
    fn set_ttl(&mut self, ttl: u8) -> Result<()>;
}

impl Transport for Pinger {
    async fn send(&mut self, packet: &[u8], dest: Ipv4Addr) -> Result<()> {
        Pinger::send_to(self, packet, dest).await?;
        Ok(())
    }

    async fn recv(&mut self, buf: &mut Buffer) -> Result<Reply> {
        Ok(Pinger::recv(self, buf).await?)
    }

    fn ttl(&self) -> Result<u8> {
        Ok(Pinger::ttl(self)?)
    }

    fn set_ttl(&mut self, ttl: u8) -> Result<()> {
        Ok(Pinger::set_ttl(self, ttl)?)
    }
}

/// The echo request to send.
#[derive(Debug, Clone, Copy)]
pub struct Request {
    pub dest: Ipv4Addr,
    pub identifier: u16,
    pub sequence: u16,
    /// Number of payload bytes following the ICMP header.
    pub payload: usize,
}

impl Request {
    /// The size of the encoded ICMP message.
    pub fn size(&self) -> usize {
        Header::SIZE + self.payload
    }
}

/// Why a probe did not get an answer.
#[derive(Debug)]
pub enum ProbeError {
    /// Nothing arrived before the deadline.
    Timeout(Duration),
    /// The request could not be sent.
    Transmit(Error),
    /// Receiving failed.
    Receive(Error),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Timeout(timeout) => write!(f, "request timed out after {timeout:?}"),
            ProbeError::Transmit(error) => write!(f, "{error:#}"),
            ProbeError::Receive(error) => write!(f, "{error:#}"),
        }
    }
}

impl error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ProbeError::Timeout(..) => None,
            ProbeError::Transmit(error) | ProbeError::Receive(error) => Some(&**error),
        }
    }
}

/// The outcome of one probe.
#[derive(Debug)]
pub struct Probe {
    pub sequence: u16,
    /// Time from just before transmit until the reply or the error. Only
    /// meaningful when the probe succeeded.
    pub elapsed: Duration,
    pub outcome: Result<Reply, ProbeError>,
}

impl Probe {
    /// Test if something answered the probe.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The message that answered the probe.
    pub fn reply(&self) -> Option<&Reply> {
        self.outcome.as_ref().ok()
    }

    /// The address that answered the probe.
    pub fn responder(&self) -> Option<Ipv4Addr> {
        self.reply().map(|reply| reply.source)
    }

    /// The round-trip time, if the probe succeeded.
    pub fn rtt(&self) -> Option<Duration> {
        self.reply().map(|_| self.elapsed)
    }
}

/// Send one echo request and wait for the first ICMP message answering it.
///
/// The deadline is fixed before the request is sent, so `timeout` bounds
/// both transmit and wait. Transport failures and timeouts are returned as a
/// failed [`Probe`]. Only a request which cannot be encoded is an error.
///
/// Replies are not required to carry the identifier and sequence number of
/// the request. A mismatch is logged and the reply is accepted anyway.
pub async fn probe<T>(
    transport: &mut T,
    buf: &mut Buffer,
    request: &Request,
    timeout: Duration,
) -> Result<Probe, lib::Error>
where
    T: Transport,
{
    encode_echo_request(buf, request.identifier, request.sequence, request.payload)?;

    let started = Instant::now();
    let deadline = started.checked_add(timeout).unwrap_or_else(far_future);

    let sent = time::timeout_at(deadline, transport.send(buf.as_bytes(), request.dest)).await;

    let error = match sent {
        Ok(Ok(())) => None,
        Ok(Err(error)) => Some(ProbeError::Transmit(error)),
        Err(..) => Some(ProbeError::Timeout(timeout)),
    };

    if let Some(error) = error {
        tracing::debug!(sequence = request.sequence, %error, "failed to send echo request");

        return Ok(Probe {
            sequence: request.sequence,
            elapsed: Duration::ZERO,
            outcome: Err(error),
        });
    }

    let received = time::timeout_at(deadline, receive(transport, buf, request)).await;
    let elapsed = started.elapsed();

    let outcome = match received {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(error)) => Err(ProbeError::Receive(error)),
        Err(..) => Err(ProbeError::Timeout(timeout)),
    };

    tracing::trace!(sequence = request.sequence, ?elapsed, ?outcome, "probe completed");

    Ok(Probe {
        sequence: request.sequence,
        elapsed,
        outcome,
    })
}

/// Roughly 30 years from now, standing in for deadlines too far away to
/// represent.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}

async fn receive<T>(transport: &mut T, buf: &mut Buffer, request: &Request) -> Result<Reply>
where
    T: Transport,
{
    loop {
        let reply = transport.recv(buf).await?;

        if reply.is_echo_request() {
            tracing::trace!(source = %reply.source, "skipping echo request");
            continue;
        }

        if !reply.answers(request.identifier, request.sequence) {
            tracing::debug!(
                source = %reply.source,
                ty = %reply.ty,
                echo = ?reply.echo,
                identifier = request.identifier,
                sequence = request.sequence,
                "reply does not match request"
            );
        }

        if !reply.is_checksum_valid() {
            tracing::debug!(
                source = %reply.source,
                checksum = reply.checksum,
                expected = reply.expected_checksum,
                "reply checksum mismatch"
            );
        }

        return Ok(reply);
    }
}
