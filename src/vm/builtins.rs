use core::fmt::Write;

use crate::{
    output::{Emitter, Output},
    Error, Execute, Forth,
};

/// A named native word, ready to be added to a dictionary.
pub struct BuiltinEntry<O: 'static> {
    pub name: &'static str,
    pub func: &'static dyn Execute<O>,
}

macro_rules! builtin {
    ($name:literal, $func:expr) => {
        BuiltinEntry {
            name: $name,
            func: &$func,
        }
    };
}

impl<O: Output + 'static> Forth<O> {
    pub const CORE_BUILTINS: &'static [BuiltinEntry<O>] = &[
        builtin!("words", Words),
        builtin!("+", Add),
    ];

    pub const MATH_BUILTINS: &'static [BuiltinEntry<O>] = &[
        builtin!("-", Sub),
        builtin!("*", Mul),
        builtin!("/", Div),
        builtin!("dup", Dup),
        builtin!("drop", Discard),
        builtin!(".s", DotS),
    ];

    /// Adds `words` and `+`, then `l32` if this VM may read memory.
    pub fn register_core_words(&mut self) -> Result<(), Error> {
        self.add_builtins(Self::CORE_BUILTINS)?;
        if self.memory.is_some() {
            self.add_builtin("l32", &Load32)?;
        }
        Ok(())
    }

    pub fn register_math_words(&mut self) -> Result<(), Error> {
        self.add_builtins(Self::MATH_BUILTINS)
    }

    pub fn add_builtins(&mut self, bis: &[BuiltinEntry<O>]) -> Result<(), Error> {
        for bi in bis {
            self.add_builtin(bi.name, bi.func)?;
        }
        Ok(())
    }
}

/// `words`: list every word, oldest first.
pub struct Words;

impl<O: Output + 'static> Execute<O> for Words {
    fn execute(&self, forth: &mut Forth<O>) -> Result<(), Error> {
        for (i, de) in forth.dict.iter().enumerate() {
            if i != 0 {
                forth.output.write(b" ");
            }
            forth.output.write(de.name());
        }
        forth.output.write(b" ok\n");
        Ok(())
    }
}

fn binary_op<O, F>(forth: &mut Forth<O>, op: F) -> Result<(), Error>
where
    O: Output + 'static,
    F: FnOnce(f64, f64) -> Result<f64, Error>,
{
    let val = forth.data_stack.try_replace_top2(op)?;
    forth.emit(format_args!("{val} ok\n"));
    Ok(())
}

/// `+ ( a b -- a+b )`
pub struct Add;

impl<O: Output + 'static> Execute<O> for Add {
    fn execute(&self, forth: &mut Forth<O>) -> Result<(), Error> {
        binary_op(forth, |a, b| Ok(a + b))
    }
}

pub struct Sub;

impl<O: Output + 'static> Execute<O> for Sub {
    fn execute(&self, forth: &mut Forth<O>) -> Result<(), Error> {
        binary_op(forth, |a, b| Ok(a - b))
    }
}

pub struct Mul;

impl<O: Output + 'static> Execute<O> for Mul {
    fn execute(&self, forth: &mut Forth<O>) -> Result<(), Error> {
        binary_op(forth, |a, b| Ok(a * b))
    }
}

pub struct Div;

impl<O: Output + 'static> Execute<O> for Div {
    fn execute(&self, forth: &mut Forth<O>) -> Result<(), Error> {
        binary_op(forth, |a, b| {
            if b == 0.0 {
                Err(Error::DivideByZero)
            } else {
                Ok(a / b)
            }
        })
    }
}

pub struct Dup;

impl<O: Output + 'static> Execute<O> for Dup {
    fn execute(&self, forth: &mut Forth<O>) -> Result<(), Error> {
        let val = forth.data_stack.try_peek()?;
        forth.data_stack.push(val)?;
        forth.emit(format_args!("{val} ok\n"));
        Ok(())
    }
}

pub struct Discard;

impl<O: Output + 'static> Execute<O> for Discard {
    fn execute(&self, forth: &mut Forth<O>) -> Result<(), Error> {
        forth.data_stack.try_pop()?;
        forth.output.write(b"ok\n");
        Ok(())
    }
}

/// `.s`: print the whole stack, bottom first, without changing it.
pub struct DotS;

impl<O: Output + 'static> Execute<O> for DotS {
    fn execute(&self, forth: &mut Forth<O>) -> Result<(), Error> {
        let mut em = Emitter::new(&mut forth.output);
        for (i, val) in forth.data_stack.iter().enumerate() {
            let sep = if i == 0 { "" } else { " " };
            let _ = write!(&mut em, "{sep}{val}");
        }
        let _ = em.write_str(" ok\n");
        Ok(())
    }
}

/// `l32 ( addr -- val )`: load a 32-bit word from memory.
///
/// Only registered for privileged VMs. The address is checked and loaded
/// before the stack is touched, so failures leave it as it was.
pub struct Load32;

impl<O: Output + 'static> Execute<O> for Load32 {
    fn execute(&self, forth: &mut Forth<O>) -> Result<(), Error> {
        let memory = forth.memory.ok_or(Error::Unprivileged)?;
        let addr = to_address(forth.data_stack.try_peek()?)?;
        let val = memory.load_u32(addr)?;

        tracing::trace!(addr, val, "l32");
        forth.data_stack.try_pop()?;
        forth.data_stack.push(f64::from(val))?;
        forth.emit(format_args!("{val:#x} ok\n"));
        Ok(())
    }
}

/// Addresses are non-negative and finite; any fraction is dropped.
fn to_address(val: f64) -> Result<usize, Error> {
    if !val.is_finite() || val < 0.0 || val >= usize::MAX as f64 {
        return Err(Error::BadAddress);
    }
    Ok(val as usize)
}
