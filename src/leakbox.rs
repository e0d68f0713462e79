use core::ptr::NonNull;
use std::{
    alloc::{GlobalAlloc, Layout, System},
    cell::UnsafeCell,
    mem::MaybeUninit,
};

use crate::{peek::MemoryPeek, Error, Forth};

// Helper type that will un-leak the buffer once it is dropped.
pub struct LeakBox<T> {
    ptr: *mut UnsafeCell<MaybeUninit<T>>,
    len: usize,
}

impl<T> LeakBox<T> {
    pub fn new(len: usize) -> Self {
        // The system allocator can't hand out zero-sized blocks.
        let ptr = if len == 0 {
            NonNull::<UnsafeCell<MaybeUninit<T>>>::dangling().as_ptr()
        } else {
            unsafe { System.alloc(Self::layout(len)).cast() }
        };
        Self { ptr, len }
    }

    fn layout(len: usize) -> Layout {
        Layout::array::<UnsafeCell<MaybeUninit<T>>>(len).unwrap()
    }

    pub fn ptr(&self) -> *mut T {
        self.ptr.cast()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Drop for LeakBox<T> {
    fn drop(&mut self) {
        if self.len != 0 {
            unsafe { System.dealloc(self.ptr.cast(), Self::layout(self.len)) }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LBForthParams {
    pub data_stack_elems: usize,
    pub word_buf_elems: usize,
    pub dict_buf_elems: usize,
}

impl Default for LBForthParams {
    fn default() -> Self {
        Self {
            data_stack_elems: 10,
            word_buf_elems: 64,
            dict_buf_elems: 1024,
        }
    }
}

/// A [`Forth`] VM that owns heap allocated buffers, for tests and hosted
/// tools.
pub struct LBForth<O: 'static> {
    pub forth: Forth<O>,
    _payload_dstack: LeakBox<f64>,
    _word_buf: LeakBox<u8>,
    _dict_buf: LeakBox<u8>,
}

impl<O: 'static> LBForth<O> {
    pub fn from_params(params: LBForthParams, output: O) -> Result<Self, Error> {
        Self::build(params, output, None)
    }

    pub fn from_params_privileged(
        params: LBForthParams,
        output: O,
        memory: &'static dyn MemoryPeek,
    ) -> Result<Self, Error> {
        Self::build(params, output, Some(memory))
    }

    fn build(
        params: LBForthParams,
        output: O,
        memory: Option<&'static dyn MemoryPeek>,
    ) -> Result<Self, Error> {
        let _payload_dstack: LeakBox<f64> = LeakBox::new(params.data_stack_elems);
        let _word_buf: LeakBox<u8> = LeakBox::new(params.word_buf_elems);
        let _dict_buf: LeakBox<u8> = LeakBox::new(params.dict_buf_elems);

        let dstack = (_payload_dstack.ptr(), _payload_dstack.len());
        let word = (_word_buf.ptr(), _word_buf.len());
        let dict = (_dict_buf.ptr(), _dict_buf.len());
        let forth = unsafe {
            match memory {
                Some(memory) => Forth::new_privileged(dstack, word, dict, output, memory)?,
                None => Forth::new(dstack, word, dict, output)?,
            }
        };

        Ok(Self {
            forth,
            _payload_dstack,
            _word_buf,
            _dict_buf,
        })
    }
}
