pub(crate) mod v4 {
    use core::ffi::c_int;

    use crate::buf::Aligned;

    unsafe impl Aligned for Header {}

    /// The fixed part of the IPv4 header structure.
    #[derive(Debug, Clone, Copy)]
    #[repr(C)]
    pub struct Header {
        version: u8,
        _r0: [u8; 7],
        ttl: u8,
        protocol: u8,
        _r1: [u8; 2],
        _addrs: [u8; 8],
    }

    impl Header {
        /// The size of the header without options.
        pub const SIZE: usize = core::mem::size_of::<Self>();

        /// Get the version from the header.
        pub fn version(&self) -> u8 {
            self.version >> 4
        }

        /// Get the header length in bytes, including options.
        pub fn header_len(&self) -> usize {
            usize::from(self.version & 0x0f) * 4
        }

        /// Get the time to live the datagram arrived with.
        pub fn ttl(&self) -> u8 {
            self.ttl
        }

        /// Get the protocol from the header.
        pub fn protocol(&self) -> c_int {
            self.protocol as c_int
        }
    }
}
