use core::hash::Hasher as _;
use core::{marker::PhantomData, ops::Deref};
use hash32::{FnvHasher, Hasher};

/// The longest name a [`FaStr`] can describe.
pub const MAX_LEN: usize = 255;

/// A [`FaStr`] borrowing a token for the duration of a lookup.
pub struct TmpFaStr<'a> {
    stir: PhantomData<&'a [u8]>,
    fastr: FaStr,
}

impl<'a> Deref for TmpFaStr<'a> {
    type Target = FaStr;

    fn deref(&self) -> &Self::Target {
        &self.fastr
    }
}

impl<'a> TmpFaStr<'a> {
    /// Returns `None` if `bstr` is longer than [`MAX_LEN`], as no name in a
    /// dictionary could ever match it.
    pub fn new_from(bstr: &'a [u8]) -> Option<Self> {
        if bstr.len() > MAX_LEN {
            return None;
        }
        let fastr = unsafe { FaStr::new(bstr.as_ptr(), bstr.len()) };
        Some(Self {
            fastr,
            stir: PhantomData,
        })
    }
}

/// A "fast" string: a pointer plus a packed length and hash, so that most
/// mismatching names are rejected without touching their bytes.
pub struct FaStr {
    ptr: *const u8,
    len_hash: LenHash,
}

impl FaStr {
    /// # Safety
    ///
    /// `addr` must point to `len` initialized bytes that outlive the `FaStr`,
    /// and `len` must be at most [`MAX_LEN`].
    pub unsafe fn new(addr: *const u8, len: usize) -> Self {
        debug_assert!(len <= MAX_LEN);
        let u8_sli = core::slice::from_raw_parts(addr, len);
        let len_hash = LenHash::from_bstr(u8_sli);
        Self {
            ptr: addr,
            len_hash,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        let len = self.len_hash.len();
        unsafe { core::slice::from_raw_parts(self.ptr, len) }
    }
}

impl PartialEq for FaStr {
    fn eq(&self, other: &Self) -> bool {
        // First, check the hash
        if self.len_hash == other.len_hash {
            // The hash matches, but there might be collisions. Do the strcmp
            // to make sure
            self.as_bytes().eq(other.as_bytes())
        } else {
            // If the hash doesn't match, it's definitely not equal.
            false
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LenHash {
    // 24..32: 8-bit len (0..=255)
    // 00..24: 24-bit FnvHash
    inner: u32,
}

impl LenHash {
    const HASH_MASK: u32 = 0x00FF_FFFF;
    const LEN_MASK: u32 = 0xFF00_0000;

    /// Creates a new LenHash, considering UP TO 255 bytes.
    pub fn from_bstr(s: &[u8]) -> Self {
        let mut hasher = FnvHasher::default();
        let len = s.len().min(MAX_LEN);
        hasher.write(&s[..len]);
        let hash = hasher.finish32();
        let inner = ((len as u32) << 24) | (hash & Self::HASH_MASK);
        Self { inner }
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        let len_u32 = (self.inner & Self::LEN_MASK) >> 24;
        len_u32 as usize
    }
}
