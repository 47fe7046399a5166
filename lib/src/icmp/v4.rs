use core::fmt;
use core::mem::{MaybeUninit, size_of};
use core::slice;

use crate::Buffer;
use crate::buf::Aligned;
use crate::error::Error;

super::macros::wire_enum! {
    /// The type of an ICMP message.
    pub struct Type {
        /// echo reply
        ECHO_REPLY = 0;
        /// destination unreachable
        UNREACHABLE = 3;
        /// echo request
        ECHO_REQUEST = 8;
        /// time exceeded
        TIME_EXCEEDED = 11;
    }
}

impl Type {
    /// Test if messages of this type quote the datagram that caused them.
    pub fn is_error(self) -> bool {
        matches!(self, Self::UNREACHABLE | Self::TIME_EXCEEDED)
    }
}

super::macros::wire_enum! {
    /// The code of a destination unreachable message.
    pub struct UnreachableCode {
        /// net unreachable
        NET_UNREACHABLE = 0;
        /// host unreachable
        HOST_UNREACHABLE = 1;
        /// protocol unreachable
        PROTOCOL_UNREACHABLE = 2;
        /// port unreachable
        PORT_UNREACHABLE = 3;
        /// fragmentation needed and don't fragment was set
        FRAGMENTATION_NEEDED = 4;
        /// source route failed
        SOURCE_ROUTE_FAILED = 5;
        /// destination network unknown
        DESTINATION_NETWORK_UNKNOWN = 6;
        /// destination host unknown
        DESTINATION_HOST_UNKNOWN = 7;
        /// source host isolated
        SOURCE_HOST_ISOLATED = 8;
        /// communication with destination network is administratively prohibited
        NETWORK_ADMINISTRATIVELY_PROHIBITED = 9;
        /// communication with destination host is administratively prohibited
        HOST_ADMINISTRATIVELY_PROHIBITED = 10;
        /// destination network unreachable for type of service
        NETWORK_UNREACHABLE_SERVICE = 11;
        /// destination host unreachable for type of service
        HOST_UNREACHABLE_SERVICE = 12;
        /// communication administratively prohibited
        ADMINISTRATIVELY_PROHIBITED = 13;
        /// host precedence violation
        HOST_PRECEDENCE_VIOLATION = 14;
        /// precedence cutoff in effect
        PRECEDENCE_CUTOFF_IN_EFFECT = 15;
    }
}

impl UnreachableCode {
    /// The short marker traceroute prints next to a hop that answered with
    /// this code.
    pub fn annotation(self) -> Option<&'static str> {
        match self {
            Self::NET_UNREACHABLE | Self::DESTINATION_NETWORK_UNKNOWN => Some("!N"),
            Self::HOST_UNREACHABLE | Self::DESTINATION_HOST_UNKNOWN => Some("!H"),
            Self::PROTOCOL_UNREACHABLE => Some("!P"),
            Self::FRAGMENTATION_NEEDED => Some("!F"),
            Self::SOURCE_ROUTE_FAILED => Some("!S"),
            Self::NETWORK_ADMINISTRATIVELY_PROHIBITED
            | Self::HOST_ADMINISTRATIVELY_PROHIBITED
            | Self::ADMINISTRATIVELY_PROHIBITED => Some("!X"),
            Self::HOST_PRECEDENCE_VIOLATION => Some("!V"),
            Self::PRECEDENCE_CUTOFF_IN_EFFECT => Some("!C"),
            _ => None,
        }
    }
}

unsafe impl Aligned for Header {}

/// The ICMP header structure.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Header {
    pub ty: Type,
    pub code: u8,
    checksum: u16,
    identifier: u16,
    sequence: u16,
}

impl Header {
    /// A header with all fields set to zero.
    pub const ZEROED: Self = Self::from_array([0u8; Self::SIZE]);
    /// The size of the header in bytes.
    pub const SIZE: usize = size_of::<Self>();

    /// Read the given array as a Header.
    pub const fn from_array(buffer: [u8; Self::SIZE]) -> Self {
        let mut header = MaybeUninit::<Self>::uninit();

        unsafe {
            header
                .as_mut_ptr()
                .cast::<u8>()
                .copy_from_nonoverlapping(buffer.as_ptr(), size_of::<Self>());

            header.assume_init()
        }
    }

    /// Get the checksum from the header.
    #[inline]
    pub fn checksum(&self) -> u16 {
        u16::from_be(self.checksum)
    }

    /// Set the checksum in the header.
    #[inline]
    pub fn set_checksum(&mut self, checksum: u16) {
        self.checksum = checksum.to_be();
    }

    /// Get the identifier from the header.
    #[inline]
    pub fn identifier(&self) -> u16 {
        u16::from_be(self.identifier)
    }

    /// Set the identifier in the header.
    #[inline]
    pub fn set_identifier(&mut self, identifier: u16) {
        self.identifier = identifier.to_be();
    }

    /// Get the sequence number from the header.
    #[inline]
    pub fn sequence(&self) -> u16 {
        u16::from_be(self.sequence)
    }

    /// Set the sequence number in the header.
    #[inline]
    pub fn set_sequence(&mut self, sequence: u16) {
        self.sequence = sequence.to_be();
    }

    /// Get the header as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: The layout for Header is compatible with a byte slice of its
        // size.
        unsafe { slice::from_raw_parts((self as *const Self).cast::<u8>(), size_of::<Self>()) }
    }
}

/// Encode an echo request into `buf`, replacing its contents.
///
/// The payload is `payload` bytes long and filled with an incrementing byte
/// pattern. The checksum is computed and stored, since raw sockets send the
/// message as-is.
pub fn encode_echo_request(
    buf: &mut Buffer,
    identifier: u16,
    sequence: u16,
    payload: usize,
) -> Result<(), Error> {
    let mut header = Header::ZEROED;
    header.ty = Type::ECHO_REQUEST;
    header.set_identifier(identifier);
    header.set_sequence(sequence);

    buf.clear();
    buf.extend_from_slice(header.as_bytes())?;
    buf.extend_with(payload, |i| i as u8)?;

    let checksum = checksum(buf.as_bytes());
    buf.as_bytes_mut()[2..4].copy_from_slice(&checksum.to_be_bytes());
    Ok(())
}

/// Sum a byte slice as 16-bit big-endian words, padding if needed.
fn sum_be16(data: &[u8]) -> u64 {
    let mut sum: u64 = 0;

    let mut chunks = data.chunks_exact(2);

    for c in chunks.by_ref() {
        let &[a, b] = c else {
            continue;
        };

        let word = u16::from_be_bytes([a, b]);
        sum += word as u64;
    }

    if let &[last] = chunks.remainder() {
        let word = u16::from_be_bytes([last, 0]);
        sum += word as u64;
    }

    sum
}

/// Compute the internet checksum of an ICMP message.
///
/// The checksum field itself (bytes 2 and 3) is treated as zero, so the
/// result can be compared directly against the checksum stored in a received
/// message.
pub fn checksum(icmp: &[u8]) -> u16 {
    let mut sum: u64 = 0;

    sum += sum_be16(icmp.get(0..2).unwrap_or_default());
    sum += sum_be16(icmp.get(4..).unwrap_or_default());

    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::{Header, Type, UnreachableCode, checksum, encode_echo_request};
    use crate::Buffer;

    #[test]
    fn echo_request_wire_format() {
        let mut buf = Buffer::new();
        encode_echo_request(&mut buf, 0x1234, 1, 0).unwrap();

        // 0x0800 + 0x1234 + 0x0001 = 0x1a35, complemented.
        assert_eq!(
            buf.as_bytes(),
            &[0x08, 0x00, 0xe5, 0xca, 0x12, 0x34, 0x00, 0x01]
        );
    }

    #[test]
    fn echo_request_payload_and_checksum() {
        let mut buf = Buffer::new();
        encode_echo_request(&mut buf, 0xbeef, 513, 57).unwrap();

        let bytes = buf.as_bytes();
        assert_eq!(bytes.len(), Header::SIZE + 57);
        assert_eq!(bytes[Header::SIZE], 0);
        assert_eq!(bytes[Header::SIZE + 56], 56);

        let header = buf.read::<Header>().unwrap();
        assert_eq!(header.ty, Type::ECHO_REQUEST);
        assert_eq!(header.code, 0);
        assert_eq!(header.identifier(), 0xbeef);
        assert_eq!(header.sequence(), 513);
        assert_eq!(header.checksum(), checksum(bytes));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let mut buf = Buffer::new();
        let payload = buf.capacity() - Header::SIZE;

        assert!(encode_echo_request(&mut buf, 1, 1, payload).is_ok());

        let error = encode_echo_request(&mut buf, 1, 1, payload + 1).unwrap_err();
        assert!(error.is_overflow());
    }

    #[test]
    fn type_display() {
        assert_eq!(Type::TIME_EXCEEDED.to_string(), "time exceeded");
        assert_eq!(format!("{:?}", Type::ECHO_REPLY), "ECHO_REPLY");
        assert_eq!(Type::new(42).to_string(), "unknown (42)");
        assert!(Type::UNREACHABLE.is_error());
        assert!(!Type::ECHO_REPLY.is_error());
    }

    #[test]
    fn unreachable_annotations() {
        assert_eq!(UnreachableCode::HOST_UNREACHABLE.annotation(), Some("!H"));
        assert_eq!(UnreachableCode::ADMINISTRATIVELY_PROHIBITED.annotation(), Some("!X"));
        assert_eq!(UnreachableCode::PORT_UNREACHABLE.annotation(), None);
    }
}
