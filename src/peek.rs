//! Memory inspection capability for the `l32` word.
//!
//! Reading arbitrary addresses is only meaningful (and only sound) on a
//! trusted target, so the VM never does it on its own. An interpreter only
//! gets `l32` when it is constructed with a [`MemoryPeek`] implementation
//! through [`Forth::new_privileged`](crate::Forth::new_privileged).
//!
//! * [`SliceMemory`] serves reads from a fixed table, which is handy for
//!   tests and for exposing a known register snapshot.
//! * `RawMemory` performs real reads of process memory. It is only built
//!   with the `raw-memory` feature, and can only be created with an
//!   `unsafe` constructor.

#[derive(Debug, PartialEq)]
pub enum PeekError {
    Unaligned,
    OutOfRange,
}

/// Loads 32-bit words on behalf of the VM.
pub trait MemoryPeek {
    fn load_u32(&self, addr: usize) -> Result<u32, PeekError>;
}

/// A read-only window of 32-bit words, visible at `base..base + 4 * len`.
pub struct SliceMemory {
    base: usize,
    words: &'static [u32],
}

impl SliceMemory {
    pub const fn new(base: usize, words: &'static [u32]) -> Self {
        Self { base, words }
    }
}

impl MemoryPeek for SliceMemory {
    fn load_u32(&self, addr: usize) -> Result<u32, PeekError> {
        let offset = addr.checked_sub(self.base).ok_or(PeekError::OutOfRange)?;
        if offset % 4 != 0 {
            return Err(PeekError::Unaligned);
        }
        self.words
            .get(offset / 4)
            .copied()
            .ok_or(PeekError::OutOfRange)
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "raw-memory")] {
        /// Reads whatever lives at the requested address.
        pub struct RawMemory {
            _priv: (),
        }

        impl RawMemory {
            /// # Safety
            ///
            /// Every address a user can type will be dereferenced. Only
            /// create this on a target where any 32-bit read the user asks
            /// for is valid (for example a microcontroller with a flat,
            /// fully mapped address space), and only expose the resulting
            /// interpreter to trusted users.
            pub const unsafe fn new() -> Self {
                Self { _priv: () }
            }
        }

        impl MemoryPeek for RawMemory {
            fn load_u32(&self, addr: usize) -> Result<u32, PeekError> {
                if addr == 0 {
                    return Err(PeekError::OutOfRange);
                }
                let ptr = addr as *const u32;
                // Safety: upheld by the caller of `RawMemory::new`.
                let val = unsafe {
                    if addr % core::mem::align_of::<u32>() == 0 {
                        ptr.read_volatile()
                    } else {
                        ptr.read_unaligned()
                    }
                };
                Ok(val)
            }
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::{MemoryPeek, PeekError, SliceMemory};

    static REGS: [u32; 3] = [0xDEAD_BEEF, 0x0000_0001, 0x4002_1000];

    #[test]
    fn slice_memory() {
        let mem = SliceMemory::new(0x4000_0000, &REGS);
        assert_eq!(mem.load_u32(0x4000_0000), Ok(0xDEAD_BEEF));
        assert_eq!(mem.load_u32(0x4000_0008), Ok(0x4002_1000));
        assert_eq!(mem.load_u32(0x4000_0002), Err(PeekError::Unaligned));
        assert_eq!(mem.load_u32(0x4000_000C), Err(PeekError::OutOfRange));
        assert_eq!(mem.load_u32(0x3FFF_FFFC), Err(PeekError::OutOfRange));
    }

    #[cfg(feature = "raw-memory")]
    #[test]
    fn raw_memory() {
        use super::RawMemory;

        let val: u32 = 0x1234_5678;
        let mem = unsafe { RawMemory::new() };
        let addr = &val as *const u32 as usize;
        assert_eq!(mem.load_u32(addr), Ok(0x1234_5678));
        assert_eq!(mem.load_u32(0), Err(PeekError::OutOfRange));
    }
}
