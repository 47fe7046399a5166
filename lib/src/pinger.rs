use core::ffi::{c_int, c_void};
use core::mem::{size_of, zeroed};
use core::net::Ipv4Addr;

use std::io;
use std::net::SocketAddrV4;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use tokio::io::Interest;
use tokio::io::unix::AsyncFd;

use crate::Buffer;
use crate::error::{Error, ErrorKind, Op};
use crate::icmp;
use crate::ip;

macro_rules! rt {
    ($e:expr) => {{
        let n = $e;

        if n != 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }};
}

/// The identifier and sequence number of an echo message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Echo {
    pub identifier: u16,
    pub sequence: u16,
}

/// A decoded ICMP message received on the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    /// The address that sent the message.
    pub source: Ipv4Addr,
    /// The time to live the message arrived with.
    pub ttl: u8,
    /// The type of the message.
    pub ty: icmp::v4::Type,
    /// The code of the message.
    pub code: u8,
    /// The checksum stored in the message.
    pub checksum: u16,
    /// The checksum computed over the message as received.
    pub expected_checksum: u16,
    /// For echo messages the echo fields, for error messages the echo fields
    /// of the quoted echo request which caused the error.
    pub echo: Option<Echo>,
}

impl Reply {
    /// Returns true if the message is an echo reply.
    pub fn is_echo_reply(&self) -> bool {
        self.ty == icmp::v4::Type::ECHO_REPLY
    }

    /// Returns true if the message is an echo request, such as our own
    /// request looped back on a raw socket.
    pub fn is_echo_request(&self) -> bool {
        self.ty == icmp::v4::Type::ECHO_REQUEST
    }

    /// Test if the message answers the echo request with the given fields.
    pub fn answers(&self, identifier: u16, sequence: u16) -> bool {
        self.echo == Some(Echo {
            identifier,
            sequence,
        })
    }

    /// Returns true if the stored checksum matches the message contents.
    pub fn is_checksum_valid(&self) -> bool {
        self.checksum == self.expected_checksum
    }

    /// The traceroute marker for unreachable messages, if any.
    pub fn annotation(&self) -> Option<&'static str> {
        if self.ty != icmp::v4::Type::UNREACHABLE {
            return None;
        }

        icmp::v4::UnreachableCode::new(self.code).annotation()
    }
}

/// A raw ICMPv4 socket used for sending echo requests and receiving
/// whatever ICMP messages arrive in response.
///
/// Creating one usually requires elevated privileges or the `CAP_NET_RAW`
/// capability. The socket is closed when the pinger is dropped.
pub struct Pinger {
    socket: AsyncFd<OwnedFd>,
}

impl Pinger {
    /// Construct a raw ICMPv4 pinger.
    pub fn v4() -> Result<Self, Error> {
        let socket = unsafe {
            let fd = libc::socket(libc::AF_INET, libc::SOCK_RAW, libc::IPPROTO_ICMP);

            if fd < 0 {
                return Err(Error::new(ErrorKind::io(Op::Socket)(
                    io::Error::last_os_error(),
                )));
            }

            OwnedFd::from_raw_fd(fd)
        };

        unsafe {
            let (addr, addr_len) = to_sockaddr(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));

            rt!(libc::bind(
                socket.as_raw_fd(),
                &addr as *const _ as *const libc::sockaddr,
                addr_len,
            ))
            .map_err(ErrorKind::io(Op::Bind))?;
        }

        set_nonblocking(&socket).map_err(ErrorKind::io(Op::Nonblocking))?;

        Ok(Self {
            socket: AsyncFd::new(socket).map_err(ErrorKind::io(Op::Register))?,
        })
    }

    /// Get the time to live outgoing datagrams are sent with.
    pub fn ttl(&self) -> Result<u8, Error> {
        let mut value: c_int = 0;
        let mut len = size_of::<c_int>() as libc::socklen_t;

        unsafe {
            rt!(libc::getsockopt(
                self.socket.get_ref().as_raw_fd(),
                libc::IPPROTO_IP,
                libc::IP_TTL,
                (&mut value as *mut c_int).cast(),
                &mut len,
            ))
            .map_err(ErrorKind::io(Op::GetTtl))?;
        }

        Ok(value.clamp(0, u8::MAX as c_int) as u8)
    }

    /// Set the time to live outgoing datagrams are sent with.
    pub fn set_ttl(&self, ttl: u8) -> Result<(), Error> {
        let value = c_int::from(ttl);

        unsafe {
            rt!(libc::setsockopt(
                self.socket.get_ref().as_raw_fd(),
                libc::IPPROTO_IP,
                libc::IP_TTL,
                (&value as *const c_int).cast(),
                size_of::<c_int>() as libc::socklen_t,
            ))
            .map_err(ErrorKind::io(Op::SetTtl))?;
        }

        Ok(())
    }

    /// Send an encoded ICMP message to the given destination.
    pub async fn send_to(&self, buf: &[u8], dest: Ipv4Addr) -> Result<usize, Error> {
        let (addr, addr_len) = to_sockaddr(SocketAddrV4::new(dest, 0));

        let n = self
            .socket
            .async_io(Interest::WRITABLE, |socket| unsafe {
                let n = libc::sendto(
                    socket.as_raw_fd(),
                    buf.as_ptr().cast::<c_void>(),
                    buf.len(),
                    0,
                    &addr as *const _ as *const libc::sockaddr,
                    addr_len,
                );

                if n < 0 {
                    return Err(io::Error::last_os_error());
                }

                Ok(n as usize)
            })
            .await
            .map_err(ErrorKind::io(Op::Send))?;

        Ok(n)
    }

    /// Receive the next ICMP message.
    ///
    /// Datagrams which cannot be decoded are discarded. On return the read
    /// position of `buf` is at the payload following the ICMP header.
    pub async fn recv(&self, buf: &mut Buffer) -> Result<Reply, Error> {
        loop {
            let source = self
                .socket
                .async_io(Interest::READABLE, |socket| unsafe {
                    recv_from(socket.as_raw_fd(), buf)
                })
                .await
                .map_err(ErrorKind::io(Op::Recv))?;

            match decode(buf, source) {
                Ok(reply) => return Ok(reply),
                Err(error) => {
                    tracing::trace!(%source, %error, "discarding malformed datagram");
                }
            }
        }
    }
}

unsafe fn recv_from(fd: RawFd, buf: &mut Buffer) -> io::Result<Ipv4Addr> {
    buf.clear();

    unsafe {
        let mut addr = zeroed::<libc::sockaddr_in>();
        let mut addr_len = size_of::<libc::sockaddr_in>() as libc::socklen_t;

        let len = buf.remaining_mut();
        let dst = buf.as_uninit_mut();

        let n = libc::recvfrom(
            fd,
            dst.as_mut_ptr().cast::<c_void>(),
            len,
            0,
            (&mut addr as *mut libc::sockaddr_in).cast::<libc::sockaddr>(),
            &mut addr_len,
        );

        if n < 0 {
            return Err(io::Error::last_os_error());
        }

        buf.advance(n as usize);
        Ok(Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr)))
    }
}

/// Read an IPv4 header and skip past any options.
fn read_ip_header(buf: &Buffer) -> Result<ip::v4::Header, Error> {
    let ip = *buf.read::<ip::v4::Header>()?;

    if ip.version() != 4 {
        return Err(Error::new(ErrorKind::IpVersionMismatch {
            actual: ip.version(),
            expected: 4,
        }));
    }

    let header_len = ip.header_len();

    if header_len < ip::v4::Header::SIZE {
        return Err(Error::new(ErrorKind::HeaderLength { actual: header_len }));
    }

    buf.skip(header_len - ip::v4::Header::SIZE)?;
    Ok(ip)
}

/// Decode a raw datagram, starting with its IPv4 header.
pub(crate) fn decode(buf: &Buffer, source: Ipv4Addr) -> Result<Reply, Error> {
    let ip = read_ip_header(buf)?;

    if ip.protocol() != libc::IPPROTO_ICMP {
        return Err(Error::new(ErrorKind::ProtocolMismatch {
            actual: ip.protocol(),
            expected: libc::IPPROTO_ICMP,
        }));
    }

    let expected_checksum = icmp::v4::checksum(buf.as_bytes());
    let header = *buf.read::<icmp::v4::Header>()?;

    let echo = if header.ty.is_error() {
        // A truncated quote only loses the correlation, not the message.
        quoted_echo(buf).ok().flatten()
    } else {
        Some(Echo {
            identifier: header.identifier(),
            sequence: header.sequence(),
        })
    };

    Ok(Reply {
        source,
        ttl: ip.ttl(),
        ty: header.ty,
        code: header.code,
        checksum: header.checksum(),
        expected_checksum,
        echo,
    })
}

/// Decode the echo request quoted by an ICMP error message.
fn quoted_echo(buf: &Buffer) -> Result<Option<Echo>, Error> {
    let ip = read_ip_header(buf)?;

    if ip.protocol() != libc::IPPROTO_ICMP {
        return Ok(None);
    }

    let header = buf.read::<icmp::v4::Header>()?;

    if header.ty != icmp::v4::Type::ECHO_REQUEST {
        return Ok(None);
    }

    Ok(Some(Echo {
        identifier: header.identifier(),
        sequence: header.sequence(),
    }))
}

fn to_sockaddr(addr: SocketAddrV4) -> (libc::sockaddr_in, libc::socklen_t) {
    // SAFETY: All zeroes is a valid sockaddr_in.
    let mut base = unsafe { zeroed::<libc::sockaddr_in>() };

    base.sin_family = libc::AF_INET as libc::sa_family_t;
    base.sin_port = addr.port().to_be();
    base.sin_addr = libc::in_addr {
        s_addr: addr.ip().to_bits().to_be(),
    };

    (base, size_of::<libc::sockaddr_in>() as libc::socklen_t)
}

fn set_nonblocking(socket: &OwnedFd) -> io::Result<()> {
    unsafe {
        let flags = libc::fcntl(socket.as_raw_fd(), libc::F_GETFL, 0);

        if flags < 0 {
            return Err(io::Error::last_os_error());
        }

        rt!(libc::fcntl(
            socket.as_raw_fd(),
            libc::F_SETFL,
            flags | libc::O_NONBLOCK
        ))
    }
}
