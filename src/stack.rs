use core::mem::size_of;

/// A fixed capacity LIFO stack living in caller-provided memory.
///
/// The stack grows downwards from `top` towards `bot`.
pub struct Stack<T: Copy> {
    top: *mut T,
    cur: *mut T,
    bot: *mut T,
}

#[derive(Debug, PartialEq)]
pub enum StackError {
    StackEmpty,
    StackFull,
}

impl<T: Copy> Stack<T> {
    /// # Safety
    ///
    /// `bottom` must be valid for reads and writes of `items` elements of
    /// `T` for as long as the stack is in use.
    pub unsafe fn new(bottom: *mut T, items: usize) -> Self {
        let top = bottom.wrapping_add(items);
        debug_assert!(top >= bottom);
        Self {
            top,
            bot: bottom,
            cur: top,
        }
    }

    #[inline]
    pub fn push(&mut self, item: T) -> Result<(), StackError> {
        let next_cur = self.cur.wrapping_sub(1);
        if next_cur < self.bot {
            return Err(StackError::StackFull);
        }
        self.cur = next_cur;
        unsafe {
            self.cur.write(item);
        }
        Ok(())
    }

    /// Pushes `item`, first discarding everything on the stack if it is
    /// already full.
    ///
    /// Returns `true` if the stack was reset to make room.
    #[inline]
    pub fn push_or_reset(&mut self, item: T) -> bool {
        let reset = self.is_full();
        if reset {
            self.clear();
        }
        // Can't fail: we just made room, and a zero capacity stack is
        // rejected when the VM is constructed.
        let _ = self.push(item);
        reset
    }

    /// Replaces the top two items `[a, b]` (`b` on top) with `op(a, b)`.
    ///
    /// If there are fewer than two items, or `op` fails, the stack is left
    /// untouched.
    pub fn try_replace_top2<E, F>(&mut self, op: F) -> Result<T, E>
    where
        E: From<StackError>,
        F: FnOnce(T, T) -> Result<T, E>,
    {
        if self.depth() < 2 {
            return Err(StackError::StackEmpty.into());
        }
        let (b, a) = unsafe { (self.cur.read(), self.cur.add(1).read()) };
        let val = op(a, b)?;
        unsafe {
            self.cur = self.cur.add(1);
            self.cur.write(val);
        }
        Ok(val)
    }

    #[inline]
    pub fn depth(&self) -> usize {
        ((self.top as usize) - (self.cur as usize)) / size_of::<T>()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        ((self.top as usize) - (self.bot as usize)) / size_of::<T>()
    }

    #[inline]
    pub fn try_pop(&mut self) -> Result<T, StackError> {
        match self.pop() {
            Some(v) => Ok(v),
            None => Err(StackError::StackEmpty),
        }
    }

    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        let next_cur = self.cur.wrapping_add(1);
        if next_cur > self.top {
            return None;
        }
        let val = unsafe { self.cur.read() };
        self.cur = next_cur;
        Some(val)
    }

    #[inline]
    pub fn try_peek(&self) -> Result<T, StackError> {
        if self.cur == self.top {
            Err(StackError::StackEmpty)
        } else {
            Ok(unsafe { self.cur.read() })
        }
    }

    #[inline]
    pub fn peek(&self) -> Option<T> {
        if self.cur == self.top {
            None
        } else {
            Some(unsafe { self.cur.read() })
        }
    }

    /// Iterates the stack from the bottom (oldest) to the top (newest).
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (1..=self.depth()).map(move |i| unsafe { self.top.sub(i).read() })
    }

    #[inline]
    pub fn clear(&mut self) {
        self.cur = self.top;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cur == self.top
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.cur == self.bot
    }
}
