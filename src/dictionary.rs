use crate::fastr::{FaStr, TmpFaStr, MAX_LEN};
use crate::Execute;
use core::alloc::Layout;
use core::marker::PhantomData;
use core::ptr::NonNull;

#[derive(Debug, PartialEq)]
pub enum BumpError {
    OutOfMemory,
    EmptyName,
    NameTooLong,
}

/// What a word does when it is looked up.
pub enum EntryBody<O: 'static> {
    /// A builtin implemented in Rust.
    Native(&'static dyn Execute<O>),
    /// Forth source text. Stored and listed, but never executed.
    Source { ptr: *const u8, len: usize },
}

impl<O: 'static> Clone for EntryBody<O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O: 'static> Copy for EntryBody<O> {}

/// The header of one record in the dictionary arena.
///
/// The name bytes (and source bytes, for source words) follow the header
/// directly. `size` spans all of it, so the next record starts at the next
/// properly aligned address after `size` bytes.
#[repr(C)]
pub struct DictionaryEntry<O: 'static> {
    pub name: FaStr,
    pub body: EntryBody<O>,
    size: usize,
}

impl<O: 'static> DictionaryEntry<O> {
    pub fn name(&self) -> &[u8] {
        self.name.as_bytes()
    }

    /// The stored source text, if this is a source word.
    pub fn source(&self) -> Option<&str> {
        match self.body {
            EntryBody::Native(_) => None,
            // Copied out of a `&str` in `Dictionary::add_source`.
            EntryBody::Source { ptr, len } => Some(unsafe {
                core::str::from_utf8_unchecked(core::slice::from_raw_parts(ptr, len))
            }),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self.body, EntryBody::Native(_))
    }
}

pub struct DictionaryBump {
    pub(crate) start: *mut u8,
    pub(crate) cur: *mut u8,
    pub(crate) end: *mut u8,
}

impl DictionaryBump {
    pub fn new(bottom: *mut u8, size: usize) -> Self {
        let end = bottom.wrapping_add(size);
        debug_assert!(end >= bottom);
        Self {
            end,
            start: bottom,
            cur: bottom,
        }
    }

    /// Copies `bytes` into the arena, returning where they landed.
    pub fn bump_bytes(&mut self, bytes: &[u8]) -> Result<NonNull<u8>, BumpError> {
        let ptr = NonNull::new(self.cur).ok_or(BumpError::OutOfMemory)?;
        let req = self.cur.wrapping_add(bytes.len());
        if req > self.end {
            return Err(BumpError::OutOfMemory);
        }
        unsafe {
            ptr.as_ptr()
                .copy_from_nonoverlapping(bytes.as_ptr(), bytes.len());
        }
        self.cur = req;
        Ok(ptr)
    }

    pub fn bump<T: Sized>(&mut self) -> Result<NonNull<T>, BumpError> {
        let offset = self.cur.align_offset(Layout::new::<T>().align());
        if offset == usize::MAX {
            return Err(BumpError::OutOfMemory);
        }

        let align_cur = self.cur.wrapping_add(offset);
        let new_cur = align_cur.wrapping_add(Layout::new::<T>().size());

        if new_cur > self.end {
            Err(BumpError::OutOfMemory)
        } else {
            // Zero out any padding bytes!
            unsafe {
                self.cur.write_bytes(0x00, offset);
            }
            self.cur = new_cur;
            Ok(unsafe { NonNull::new_unchecked(align_cur.cast()) })
        }
    }

    pub fn capacity(&self) -> usize {
        (self.end as usize) - (self.start as usize)
    }

    pub fn used(&self) -> usize {
        (self.cur as usize) - (self.start as usize)
    }

    /// Forgets everything bumped since `mark` was taken from `self.cur`.
    fn rewind(&mut self, mark: *mut u8) {
        debug_assert!(mark >= self.start && mark <= self.cur);
        self.cur = mark;
    }
}

/// An append-only, fixed capacity store of words.
///
/// Lookups scan front to back, so when two words share a name, the one
/// added first wins.
pub struct Dictionary<O: 'static> {
    bump: DictionaryBump,
    entries: usize,
    _pd: PhantomData<DictionaryEntry<O>>,
}

impl<O: 'static> Dictionary<O> {
    /// # Safety
    ///
    /// `bottom` must be valid for reads and writes of `size` bytes for as
    /// long as the dictionary is in use.
    pub unsafe fn new(bottom: *mut u8, size: usize) -> Self {
        Self {
            bump: DictionaryBump::new(bottom, size),
            entries: 0,
            _pd: PhantomData,
        }
    }

    pub fn add_native(&mut self, name: &str, func: &'static dyn Execute<O>) -> Result<(), BumpError> {
        self.insert(name, None, |_| Ok(EntryBody::Native(func)))
    }

    pub fn add_source(&mut self, name: &str, source: &str) -> Result<(), BumpError> {
        self.insert(name, Some(source), |bump| {
            let ptr = bump.bump_bytes(source.as_bytes())?;
            Ok(EntryBody::Source {
                ptr: ptr.as_ptr(),
                len: source.len(),
            })
        })
    }

    fn insert<F>(&mut self, name: &str, source: Option<&str>, body: F) -> Result<(), BumpError>
    where
        F: FnOnce(&mut DictionaryBump) -> Result<EntryBody<O>, BumpError>,
    {
        if name.is_empty() {
            return Err(BumpError::EmptyName);
        }
        if name.len() > MAX_LEN {
            return Err(BumpError::NameTooLong);
        }

        // Don't leave half a record behind if we run out of room.
        let mark = self.bump.cur;
        let res = (|| -> Result<(), BumpError> {
            let dict_base = self.bump.bump::<DictionaryEntry<O>>()?;
            let name_ptr = self.bump.bump_bytes(name.as_bytes())?;
            let body = body(&mut self.bump)?;
            let size = (self.bump.cur as usize) - (dict_base.as_ptr() as usize);
            unsafe {
                dict_base.as_ptr().write(DictionaryEntry {
                    name: FaStr::new(name_ptr.as_ptr(), name.len()),
                    body,
                    size,
                });
            }
            Ok(())
        })();

        match res {
            Ok(()) => {
                self.entries += 1;
                tracing::debug!(
                    name,
                    source = source.is_some(),
                    used = self.bump.used(),
                    capacity = self.bump.capacity(),
                    "added word"
                );
                Ok(())
            }
            Err(e) => {
                self.bump.rewind(mark);
                tracing::debug!(name, error = ?e, "failed to add word");
                Err(e)
            }
        }
    }

    /// Finds the first (oldest) word named exactly `name`.
    pub fn find(&self, name: &[u8]) -> Option<&DictionaryEntry<O>> {
        let fastr = TmpFaStr::new_from(name)?;
        self.iter().find(|de| de.name == *fastr)
    }

    /// Iterates words in the order they were added.
    pub fn iter(&self) -> Iter<'_, O> {
        Iter {
            cur: self.bump.start,
            end: self.bump.cur,
            _pd: PhantomData,
        }
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn used(&self) -> usize {
        self.bump.used()
    }

    pub fn capacity(&self) -> usize {
        self.bump.capacity()
    }
}

pub struct Iter<'a, O: 'static> {
    cur: *mut u8,
    end: *mut u8,
    _pd: PhantomData<&'a DictionaryEntry<O>>,
}

impl<'a, O: 'static> Iterator for Iter<'a, O> {
    type Item = &'a DictionaryEntry<O>;

    fn next(&mut self) -> Option<Self::Item> {
        // Records are bumped at aligned addresses, so re-align the same way
        // to find the next header.
        let offset = self
            .cur
            .align_offset(Layout::new::<DictionaryEntry<O>>().align());
        if offset == usize::MAX {
            return None;
        }
        let hdr = self.cur.wrapping_add(offset);
        if hdr >= self.end {
            return None;
        }
        let de = unsafe { &*hdr.cast::<DictionaryEntry<O>>() };
        self.cur = hdr.wrapping_add(de.size);
        Some(de)
    }
}
