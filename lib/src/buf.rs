use core::cell::Cell;
use core::fmt;
use core::mem::{MaybeUninit, size_of};
use core::slice;

use crate::error::{Error, ErrorKind};

const MTU: usize = 1500;

/// Implement a type that can be accessed directly out of a buffer.
///
/// # Safety
///
/// Implementers guarantee that:
/// * The type is aligned to 2 bytes.
/// * The type implementing it is `repr(C)`.
/// * The type can inhabit any bit patterns.
pub unsafe trait Aligned {}

unsafe impl<const N: usize> Aligned for [u8; N] {}

/// A buffer sized to the maximum transmission unit (MTU), aligned to allow
/// header operations to be performed directly on the buffer.
///
/// The same buffer is used to encode outgoing echo requests and to receive
/// the datagram that answers them.
#[repr(align(16))]
pub struct Buffer<const N: usize = MTU> {
    /// Source buffer.
    buf: [MaybeUninit<u8>; N],
    /// Position being read.
    at: Cell<usize>,
    /// Length that has been initialized by a read or a write.
    init: usize,
}

impl Buffer {
    /// Create a new MTU-sized buffer.
    pub fn new() -> Self {
        Self::with_capacity()
    }
}

impl<const N: usize> Buffer<N> {
    /// Create a buffer with a capacity of `N` bytes.
    pub fn with_capacity() -> Self {
        const {
            assert!(N > 0, "Buffer must be able to hold data");
        }

        Self {
            buf: [MaybeUninit::uninit(); N],
            at: Cell::new(0),
            init: 0,
        }
    }

    /// The total number of bytes the buffer can hold.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.at.set(0);
        self.init = 0;
    }

    /// Advance the initialized length of the buffer by the given amount.
    #[inline]
    pub fn advance(&mut self, len: usize) {
        self.init = self.init.saturating_add(len).min(N);
    }

    /// Get remaining number of initialized bytes in the buffer.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            slice::from_raw_parts(
                self.buf.as_ptr().cast::<u8>().wrapping_add(self.at.get()),
                self.init.saturating_sub(self.at.get()),
            )
        }
    }

    /// Get remaining initialized bytes in the buffer mutably.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe {
            slice::from_raw_parts_mut(
                self.buf.as_mut_ptr().cast::<u8>().wrapping_add(self.at.get()),
                self.init.saturating_sub(self.at.get()),
            )
        }
    }

    /// Get remaining number of uninitialized bytes in the buffer.
    pub fn remaining_mut(&self) -> usize {
        N.saturating_sub(self.init)
    }

    /// Get a mutable uninitialized slice of the buffer.
    #[inline]
    pub fn as_uninit_mut(&mut self) -> &mut [MaybeUninit<u8>] {
        let remaining = self.remaining_mut();

        unsafe {
            slice::from_raw_parts_mut(self.buf.as_mut_ptr().wrapping_add(self.init), remaining)
        }
    }

    /// Read a value of type T from the current read position.
    #[inline]
    pub fn read<T>(&self) -> Result<&T, Error>
    where
        T: Aligned,
    {
        const {
            assert!(align_of::<T>() <= 2, "Header must be aligned to 2 bytes");
            assert!(
                size_of::<T>().is_multiple_of(2),
                "Header size must be a multiple of 2 bytes"
            );
        }

        let end = self.reserve_read(size_of::<T>())?;
        let ptr = self.buf.as_ptr().wrapping_add(self.at.get()).cast::<T>();
        self.at.set(end);
        unsafe { Ok(&*ptr) }
    }

    /// Skip over the given number of initialized bytes.
    ///
    /// The number of bytes skipped must be a multiple of 2 so that
    /// subsequent reads stay aligned.
    #[inline]
    pub fn skip(&self, len: usize) -> Result<(), Error> {
        debug_assert!(len.is_multiple_of(2), "Skipped length must keep alignment");
        let end = self.reserve_read(len)?;
        self.at.set(end);
        Ok(())
    }

    fn reserve_read(&self, len: usize) -> Result<usize, Error> {
        let end = self.at.get().wrapping_add(len);

        if self.init < end {
            return Err(Error::new(ErrorKind::BufferTooSmall {
                actual: self.init,
                needed: end,
            }));
        }

        Ok(end)
    }

    fn reserve_write(&self, len: usize) -> Result<(), Error> {
        if len > self.remaining_mut() {
            return Err(Error::new(ErrorKind::BufferOverflow {
                capacity: N,
                needed: self.init.saturating_add(len),
            }));
        }

        Ok(())
    }

    /// Extend the buffer by copying data from the given slice.
    ///
    /// Errors if the data does not fit, in which case the buffer is left
    /// unmodified.
    pub fn extend_from_slice(&mut self, data: &[u8]) -> Result<(), Error> {
        self.reserve_write(data.len())?;

        unsafe {
            self.buf
                .as_mut_ptr()
                .cast::<u8>()
                .wrapping_add(self.init)
                .copy_from_nonoverlapping(data.as_ptr(), data.len());
        }

        self.init += data.len();
        Ok(())
    }

    /// Extend the buffer by `len` bytes produced by calling `f` with the
    /// index of each byte.
    pub fn extend_with(&mut self, len: usize, mut f: impl FnMut(usize) -> u8) -> Result<(), Error> {
        self.reserve_write(len)?;

        for (index, slot) in self.as_uninit_mut()[..len].iter_mut().enumerate() {
            slot.write(f(index));
        }

        self.init += len;
        Ok(())
    }
}

impl<const N: usize> fmt::Debug for Buffer<N> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_bytes().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::Buffer;

    #[test]
    fn read_past_initialized_fails() {
        let mut buf = Buffer::new();
        buf.extend_from_slice(&[1, 2, 3, 4]).unwrap();

        assert_eq!(*buf.read::<[u8; 2]>().unwrap(), [1, 2]);
        assert!(buf.read::<[u8; 4]>().is_err());
        assert_eq!(buf.as_bytes(), &[3, 4]);
    }

    #[test]
    fn skip_moves_read_position() {
        let mut buf = Buffer::new();
        buf.extend_with(8, |i| i as u8).unwrap();

        buf.skip(6).unwrap();
        assert_eq!(buf.as_bytes(), &[6, 7]);
        assert!(buf.skip(4).is_err());
        assert_eq!(buf.as_bytes(), &[6, 7]);
    }

    #[test]
    fn overflow_leaves_buffer_untouched() {
        let mut buf = Buffer::<8>::with_capacity();
        buf.extend_from_slice(&[0xaa; 6]).unwrap();

        let error = buf.extend_from_slice(&[0xbb; 4]).unwrap_err();
        assert!(error.is_overflow());
        assert_eq!(buf.as_bytes(), &[0xaa; 6]);

        buf.extend_with(2, |_| 0xcc).unwrap();
        assert_eq!(buf.remaining_mut(), 0);
        assert!(buf.extend_with(1, |_| 0).is_err());
    }

    #[test]
    fn clear_resets_positions() {
        let mut buf = Buffer::new();
        buf.extend_from_slice(&[1, 2]).unwrap();
        _ = buf.read::<[u8; 2]>().unwrap();

        buf.clear();
        assert!(buf.as_bytes().is_empty());
        assert_eq!(buf.remaining_mut(), buf.capacity());
    }
}
