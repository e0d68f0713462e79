use core::fmt;

/// Where the VM sends acknowledgments, diagnostics, and any other text.
///
/// `write` consumes as much of `buf` as it can and returns how many bytes it
/// took. Buffering, flushing, and the transport behind the sink are up to
/// the implementation.
pub trait Output {
    fn write(&mut self, buf: &[u8]) -> usize;
}

impl<O: Output + ?Sized> Output for &mut O {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> usize {
        (**self).write(buf)
    }
}

/// Adapts an [`Output`] to [`core::fmt::Write`], counting the bytes the sink
/// accepted.
pub(crate) struct Emitter<'a, O: ?Sized> {
    out: &'a mut O,
    pub(crate) written: usize,
}

impl<'a, O: Output + ?Sized> Emitter<'a, O> {
    pub(crate) fn new(out: &'a mut O) -> Self {
        Self { out, written: 0 }
    }
}

impl<O: Output + ?Sized> fmt::Write for Emitter<'_, O> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Short writes are the sink's business, keep rendering.
        self.written += self.out.write(s.as_bytes());
        Ok(())
    }
}

/// A bounded output buffer in caller-provided memory.
///
/// Once full, further bytes are dropped and `write` reports the short count.
pub struct OutputBuf {
    start: *mut u8,
    cur: *mut u8,
    end: *mut u8,
}

#[derive(Debug, PartialEq)]
pub enum OutputError {
    OutputFull,
}

impl OutputBuf {
    pub fn new(bottom: *mut u8, size: usize) -> Self {
        let end = bottom.wrapping_add(size);
        debug_assert!(end >= bottom);
        Self {
            end,
            start: bottom,
            cur: bottom,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        (self.end as usize) - (self.start as usize)
    }

    #[inline]
    pub fn len(&self) -> usize {
        (self.cur as usize) - (self.start as usize)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cur == self.start
    }

    pub fn push_bstr(&mut self, bstr: &[u8]) -> Result<(), OutputError> {
        let new_end = self.cur.wrapping_add(bstr.len());
        if new_end > self.end {
            Err(OutputError::OutputFull)
        } else {
            unsafe {
                core::ptr::copy_nonoverlapping(bstr.as_ptr(), self.cur, bstr.len());
                self.cur = new_end;
            }
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.cur = self.start;
    }

    pub fn as_bytes(&self) -> &[u8] {
        if self.is_empty() {
            &[]
        } else {
            unsafe { core::slice::from_raw_parts(self.start, self.len()) }
        }
    }

    /// The buffered output, up to the first byte that isn't valid UTF-8.
    pub fn as_str(&self) -> &str {
        let bytes = self.as_bytes();
        match core::str::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => unsafe { core::str::from_utf8_unchecked(&bytes[..e.valid_up_to()]) },
        }
    }
}

impl Output for OutputBuf {
    fn write(&mut self, buf: &[u8]) -> usize {
        let room = (self.end as usize) - (self.cur as usize);
        let n = buf.len().min(room);
        // `n` always fits.
        let _ = self.push_bstr(&buf[..n]);
        n
    }
}

impl fmt::Write for OutputBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_bstr(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

cfg_if::cfg_if! {
    if #[cfg(any(test, feature = "use-std"))] {
        impl Output for Vec<u8> {
            fn write(&mut self, buf: &[u8]) -> usize {
                self.extend_from_slice(buf);
                buf.len()
            }
        }

        /// Sends output to any [`std::io::Write`]r, such as stdout or a
        /// serial port opened by the host.
        pub struct IoOutput<W: std::io::Write>(pub W);

        impl<W: std::io::Write> Output for IoOutput<W> {
            fn write(&mut self, buf: &[u8]) -> usize {
                match self.0.write_all(buf) {
                    Ok(()) => buf.len(),
                    Err(_) => 0,
                }
            }
        }
    }
}
