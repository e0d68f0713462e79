/// Bounded word accumulator, fed one byte at a time.
///
/// Bytes are collected until whitespace ends the word. If a word grows past
/// the capacity of the buffer, the buffer silently starts over and only the
/// bytes after the restart are kept.
pub struct WordBuf {
    start: *mut u8,
    cur: *mut u8,
    end: *mut u8,
    state: State,
    holding: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InWord,
}

/// What a single call to [`WordBuf::feed`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fed {
    /// Whitespace between words.
    Ignored,
    /// The byte was appended to the current word.
    Accumulated,
    /// The buffer was full; it was emptied and the byte starts a new word.
    Restarted,
    /// Whitespace ended a word, which is now available from
    /// [`WordBuf::cur_word`].
    Complete,
}

/// Word separators: space, carriage return, line feed, and tab.
#[inline]
pub fn is_space(ch: u8) -> bool {
    matches!(ch, b' ' | b'\r' | b'\n' | b'\t')
}

impl WordBuf {
    /// # Safety
    ///
    /// `bottom` must be valid for reads and writes of `size` bytes for as
    /// long as the buffer is in use.
    pub unsafe fn new(bottom: *mut u8, size: usize) -> Self {
        let end = bottom.wrapping_add(size);
        debug_assert!(end >= bottom);
        Self {
            end,
            start: bottom,
            cur: bottom,
            state: State::Idle,
            holding: false,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        (self.end as usize) - (self.start as usize)
    }

    /// Number of bytes of the word currently being accumulated.
    #[inline]
    pub fn len(&self) -> usize {
        (self.cur as usize) - (self.start as usize)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cur == self.start
    }

    pub fn in_word(&self) -> bool {
        self.state == State::InWord
    }

    pub fn feed(&mut self, ch: u8) -> Fed {
        // A completed word only lives until the next byte arrives.
        if self.holding {
            self.holding = false;
            self.cur = self.start;
        }

        match (self.state, is_space(ch)) {
            (State::Idle, true) => Fed::Ignored,
            (State::Idle, false) => {
                self.cur = self.start;
                self.state = State::InWord;
                self.append(ch)
            }
            (State::InWord, false) => self.append(ch),
            (State::InWord, true) => {
                self.state = State::Idle;
                self.holding = true;
                Fed::Complete
            }
        }
    }

    fn append(&mut self, ch: u8) -> Fed {
        let res = if self.cur >= self.end {
            self.cur = self.start;
            Fed::Restarted
        } else {
            Fed::Accumulated
        };
        // A zero capacity buffer can hold nothing at all.
        if self.cur < self.end {
            unsafe {
                self.cur.write(ch);
            }
            self.cur = self.cur.wrapping_add(1);
        }
        res
    }

    /// Drops any partially accumulated or completed word.
    pub fn clear(&mut self) {
        self.cur = self.start;
        self.state = State::Idle;
        self.holding = false;
    }

    /// The word completed by the last call to [`WordBuf::feed`], if that
    /// call returned [`Fed::Complete`].
    pub fn cur_word(&self) -> Option<&[u8]> {
        if !self.holding {
            return None;
        }
        Some(unsafe { core::slice::from_raw_parts(self.start, self.len()) })
    }
}
