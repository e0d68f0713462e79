// For now...
#![allow(clippy::missing_safety_doc)]
#![cfg_attr(not(any(test, feature = "use-std")), no_std)]

pub mod dictionary;
pub mod fastr;
pub mod input;
pub mod output;
pub mod peek;
pub mod stack;
pub mod vm;

#[cfg(any(test, feature = "use-std"))]
pub mod leakbox;

#[cfg(any(test, feature = "use-std"))]
pub mod testutil;

use core::fmt;

pub use crate::vm::Forth;
use crate::{dictionary::BumpError, peek::PeekError, stack::StackError};

#[derive(Debug, PartialEq)]
pub enum Error {
    Stack(StackError),
    Bump(BumpError),
    Peek(PeekError),
    LookupFailed,
    CompoundWord,
    DivideByZero,
    BadAddress,
    Unprivileged,
    ZeroSizedBuffer,
}

impl From<StackError> for Error {
    fn from(se: StackError) -> Self {
        Error::Stack(se)
    }
}

impl From<BumpError> for Error {
    fn from(be: BumpError) -> Self {
        Error::Bump(be)
    }
}

impl From<PeekError> for Error {
    fn from(pe: PeekError) -> Self {
        Error::Peek(pe)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Stack(StackError::StackEmpty) => f.write_str("stack underflow"),
            Error::Stack(StackError::StackFull) => f.write_str("stack overflow"),
            Error::Bump(BumpError::OutOfMemory) => f.write_str("dictionary full"),
            Error::Bump(BumpError::EmptyName) => f.write_str("empty word name"),
            Error::Bump(BumpError::NameTooLong) => f.write_str("word name too long"),
            Error::Peek(PeekError::Unaligned) => f.write_str("unaligned address"),
            Error::Peek(PeekError::OutOfRange) => f.write_str("address out of range"),
            Error::LookupFailed => f.write_str("unknown word"),
            Error::CompoundWord => f.write_str("compound words are not executable"),
            Error::DivideByZero => f.write_str("division by zero"),
            Error::BadAddress => f.write_str("bad address"),
            Error::Unprivileged => f.write_str("memory access not permitted"),
            Error::ZeroSizedBuffer => f.write_str("zero sized buffer"),
        }
    }
}

/// A native word: something the dispatcher can run against the VM.
///
/// Builtins are usually zero-sized types, so that `&Word` can live in a
/// `'static` table. Plain [`WordFunc`] function pointers implement this as
/// well.
pub trait Execute<O: 'static> {
    fn execute(&self, forth: &mut Forth<O>) -> Result<(), Error>;
}

/// `WordFunc` represents a function that can be used as a native word.
pub type WordFunc<O> = fn(&mut Forth<O>) -> Result<(), Error>;

impl<O: 'static> Execute<O> for WordFunc<O> {
    #[inline]
    fn execute(&self, forth: &mut Forth<O>) -> Result<(), Error> {
        (self)(forth)
    }
}
