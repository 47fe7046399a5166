use core::ffi::c_int;
use core::fmt;

use std::io;

/// An error raised by a raw ICMP socket or while decoding what it received.
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub(super) fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }

    /// Test if the error was raised because a message did not fit in its
    /// buffer while being encoded.
    pub fn is_overflow(&self) -> bool {
        matches!(self.kind, ErrorKind::BufferOverflow { .. })
    }
}

impl fmt::Debug for Error {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl fmt::Display for Error {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl core::error::Error for Error {
    #[inline]
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// The socket operation an I/O error came from.
#[derive(Debug, Clone, Copy)]
pub(super) enum Op {
    Socket,
    Nonblocking,
    Bind,
    Register,
    GetTtl,
    SetTtl,
    Send,
    Recv,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Socket => write!(f, "Creating raw ICMP socket failed"),
            Op::Nonblocking => write!(f, "Failed to set socket nonblocking"),
            Op::Bind => write!(f, "Failed to bind socket"),
            Op::Register => write!(f, "Failed to register socket with the runtime"),
            Op::GetTtl => write!(f, "Failed to get socket time to live"),
            Op::SetTtl => write!(f, "Failed to set socket time to live"),
            Op::Send => write!(f, "Failed to send to socket"),
            Op::Recv => write!(f, "Failed to receive from socket"),
        }
    }
}

#[derive(Debug)]
pub(super) enum ErrorKind {
    Io { op: Op, error: io::Error },
    BufferTooSmall { actual: usize, needed: usize },
    BufferOverflow { capacity: usize, needed: usize },
    IpVersionMismatch { actual: u8, expected: u8 },
    ProtocolMismatch { actual: c_int, expected: c_int },
    HeaderLength { actual: usize },
}

impl ErrorKind {
    /// Wrap an I/O error raised by the given operation.
    pub(super) fn io(op: Op) -> impl FnOnce(io::Error) -> Self {
        move |error| Self::Io { op, error }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { op, .. } => op.fmt(f),
            Self::BufferTooSmall { actual, needed } => {
                write!(f, "Buffer of {actual} bytes too short to read up to byte {needed}")
            }
            Self::BufferOverflow { capacity, needed } => {
                write!(
                    f,
                    "Message of {needed} bytes does not fit in buffer of {capacity} bytes"
                )
            }
            Self::IpVersionMismatch { actual, expected } => {
                write!(f, "Expected IP version {expected}, got {actual}")
            }
            Self::ProtocolMismatch { actual, expected } => {
                write!(f, "Expected IP protocol {expected}, got {actual}")
            }
            Self::HeaderLength { actual } => {
                write!(f, "Invalid IPv4 header length {actual}")
            }
        }
    }
}
