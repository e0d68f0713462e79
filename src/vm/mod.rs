use core::fmt::{self, Write};

use crate::{
    dictionary::{Dictionary, EntryBody},
    input::{Fed, WordBuf},
    output::{Emitter, Output},
    peek::MemoryPeek,
    stack::Stack,
    Error, Execute,
};

pub mod builtins;

#[cfg(feature = "async")]
mod async_vm;

/// Forth is the "context" of the VM/interpreter.
///
/// It owns the dictionary, the data stack, the word buffer, and the output
/// sink. Input arrives one byte at a time through [`Forth::process_char`];
/// every completed word is dispatched immediately.
pub struct Forth<O: 'static> {
    pub data_stack: Stack<f64>,
    pub(crate) dict: Dictionary<O>,
    pub input: WordBuf,
    pub output: O,
    pub(crate) memory: Option<&'static dyn MemoryPeek>,
}

/// How a word will be handled by the dispatcher.
pub enum Lookup<O: 'static> {
    Literal { val: f64 },
    Native { func: &'static dyn Execute<O> },
    Source,
}

impl<O: 'static> Forth<O> {
    /// # Safety
    ///
    /// Each buffer must be valid for reads and writes of the given number of
    /// elements for as long as the VM exists.
    pub unsafe fn new(
        dstack_buf: (*mut f64, usize),
        word_buf: (*mut u8, usize),
        dict_buf: (*mut u8, usize),
        output: O,
    ) -> Result<Self, Error> {
        if dstack_buf.1 == 0 || word_buf.1 == 0 || dict_buf.1 == 0 {
            return Err(Error::ZeroSizedBuffer);
        }

        let data_stack = Stack::new(dstack_buf.0, dstack_buf.1);
        let input = WordBuf::new(word_buf.0, word_buf.1);
        let dict = Dictionary::new(dict_buf.0, dict_buf.1);

        Ok(Self {
            data_stack,
            dict,
            input,
            output,
            memory: None,
        })
    }

    /// Like [`Forth::new`], but the VM may read memory through `memory`, and
    /// [`Forth::register_core_words`] will add `l32`.
    ///
    /// # Safety
    ///
    /// Same as [`Forth::new`].
    pub unsafe fn new_privileged(
        dstack_buf: (*mut f64, usize),
        word_buf: (*mut u8, usize),
        dict_buf: (*mut u8, usize),
        output: O,
        memory: &'static dyn MemoryPeek,
    ) -> Result<Self, Error> {
        let mut forth = Self::new(dstack_buf, word_buf, dict_buf, output)?;
        forth.memory = Some(memory);
        Ok(forth)
    }

    pub fn add_builtin(&mut self, name: &str, bi: &'static dyn Execute<O>) -> Result<(), Error> {
        self.dict.add_native(name, bi)?;
        Ok(())
    }

    /// Stores `source` under `name`. The word is listed by `words`, but
    /// can't be executed.
    pub fn add_source_word(&mut self, name: &str, source: &str) -> Result<(), Error> {
        self.dict.add_source(name, source)?;
        Ok(())
    }

    pub fn dictionary(&self) -> &Dictionary<O> {
        &self.dict
    }

    pub fn memory(&self) -> Option<&'static dyn MemoryPeek> {
        self.memory
    }

    pub fn is_privileged(&self) -> bool {
        self.memory.is_some()
    }

    fn parse_num(word: &[u8]) -> Option<f64> {
        let word = core::str::from_utf8(word).ok()?;
        word.parse::<f64>().ok().or_else(|| parse_hex(word))
    }

    pub fn lookup(&self, word: &[u8]) -> Result<Lookup<O>, Error> {
        if let Some(val) = Self::parse_num(word) {
            return Ok(Lookup::Literal { val });
        }
        match self.dict.find(word) {
            Some(de) => match de.body {
                EntryBody::Native(func) => Ok(Lookup::Native { func }),
                EntryBody::Source { .. } => Ok(Lookup::Source),
            },
            None => Err(Error::LookupFailed),
        }
    }

    pub fn release(self) -> O {
        self.output
    }
}

impl<O: Output + 'static> Forth<O> {
    /// Feeds one byte of input, running the word it completes (if any).
    pub fn process_char(&mut self, ch: u8) {
        match self.input.feed(ch) {
            Fed::Complete => self.execute_word(),
            Fed::Restarted => {
                tracing::trace!(capacity = self.input.capacity(), "word buffer full, restarting");
            }
            Fed::Ignored | Fed::Accumulated => {}
        }
    }

    pub fn process_bytes(&mut self, bytes: &[u8]) {
        for &ch in bytes {
            self.process_char(ch);
        }
    }

    pub fn process_str(&mut self, s: &str) {
        self.process_bytes(s.as_bytes());
    }

    /// Formats `args` into the output, returning how many bytes the sink took.
    pub fn emit(&mut self, args: fmt::Arguments<'_>) -> usize {
        let mut em = Emitter::new(&mut self.output);
        let _ = em.write_fmt(args);
        em.written
    }

    fn execute_word(&mut self) {
        let lookup = match self.input.cur_word() {
            Some(word) => {
                tracing::trace!(word = display_word(word), "dispatch");
                self.lookup(word)
            }
            None => return,
        };

        let res = match lookup {
            Ok(Lookup::Literal { val }) => {
                if self.data_stack.push_or_reset(val) {
                    tracing::debug!(
                        capacity = self.data_stack.capacity(),
                        "data stack full, reset"
                    );
                }
                self.emit(format_args!("{val} ok\n"));
                Ok(())
            }
            Ok(Lookup::Native { func }) => func.execute(self),
            Ok(Lookup::Source) => Err(Error::CompoundWord),
            Err(Error::LookupFailed) => {
                self.unknown_word();
                return;
            }
            Err(e) => Err(e),
        };

        if let Err(e) = res {
            self.report(&e);
        }
    }

    fn unknown_word(&mut self) {
        let word = self.input.cur_word().unwrap_or_default();
        tracing::debug!(word = display_word(word), "unknown word");
        self.output.write(word);
        self.output.write(b" error\n");
    }

    fn report(&mut self, err: &Error) {
        let word = self.input.cur_word().unwrap_or_default();
        tracing::debug!(word = display_word(word), error = %err, "word failed");
        self.output.write(word);
        self.emit(format_args!(": {err}\n"));
    }
}

/// Parses `[+-]0x<hex digits>[.<hex digits>][p[+-]<decimal exponent>]`, the
/// hexadecimal forms `strtod` accepts. The whole word must match.
fn parse_hex(word: &str) -> Option<f64> {
    let (neg, rest) = match word.as_bytes().first()? {
        b'-' => (true, &word[1..]),
        b'+' => (false, &word[1..]),
        _ => (false, word),
    };
    let rest = rest
        .strip_prefix("0x")
        .or_else(|| rest.strip_prefix("0X"))?;
    let (digits, exp) = match rest.find(['p', 'P']) {
        Some(i) => (&rest[..i], Some(&rest[i + 1..])),
        None => (rest, None),
    };
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, frac),
        None => (digits, ""),
    };
    if int.is_empty() && frac.is_empty() {
        return None;
    }

    // Keep 60 bits of mantissa; digits past that only move the exponent.
    const MANT_LIMIT: u64 = 1 << 60;
    let mut mant: u64 = 0;
    let mut exp2: i32 = 0;
    for ch in int.chars() {
        let d = u64::from(ch.to_digit(16)?);
        if mant < MANT_LIMIT {
            mant = mant * 16 + d;
        } else {
            exp2 = exp2.saturating_add(4);
        }
    }
    for ch in frac.chars() {
        let d = u64::from(ch.to_digit(16)?);
        if mant < MANT_LIMIT {
            mant = mant * 16 + d;
            exp2 = exp2.saturating_sub(4);
        }
    }

    if let Some(exp) = exp {
        let (eneg, edigits) = match exp.as_bytes().first()? {
            b'-' => (true, &exp[1..]),
            b'+' => (false, &exp[1..]),
            _ => (false, exp),
        };
        if edigits.is_empty() || !edigits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let e = edigits.bytes().fold(0i32, |acc, b| {
            acc.saturating_mul(10).saturating_add(i32::from(b - b'0'))
        });
        exp2 = if eneg {
            exp2.saturating_sub(e)
        } else {
            exp2.saturating_add(e)
        };
    }

    let mut val = mant as f64;
    if mant != 0 {
        // Past these, the result is already infinite or zero.
        let mut exp2 = exp2.clamp(-1200, 1200);
        while exp2 > 0 {
            val *= 2.0;
            exp2 -= 1;
        }
        while exp2 < 0 {
            val *= 0.5;
            exp2 += 1;
        }
    }
    Some(if neg { -val } else { val })
}

fn display_word(word: &[u8]) -> &str {
    core::str::from_utf8(word).unwrap_or("<non-utf8>")
}

#[cfg(test)]
pub mod test {
    use crate::{
        leakbox::{LBForth, LBForthParams},
        peek::SliceMemory,
        vm::Lookup,
        Error,
    };

    static REGS: [u32; 2] = [0x0000_002A, 0xCAFE_F00D];
    static MEM: SliceMemory = SliceMemory::new(0x1000, &REGS);

    fn vm(params: LBForthParams) -> LBForth<Vec<u8>> {
        let mut lbf = LBForth::from_params(params, Vec::new()).unwrap();
        lbf.forth.register_core_words().unwrap();
        lbf
    }

    fn privileged_vm() -> LBForth<Vec<u8>> {
        let mut lbf =
            LBForth::from_params_privileged(LBForthParams::default(), Vec::new(), &MEM).unwrap();
        lbf.forth.register_core_words().unwrap();
        lbf
    }

    fn take_output(lbf: &mut LBForth<Vec<u8>>) -> String {
        String::from_utf8(core::mem::take(&mut lbf.forth.output)).unwrap()
    }

    fn stack(lbf: &LBForth<Vec<u8>>) -> Vec<f64> {
        lbf.forth.data_stack.iter().collect()
    }

    #[test]
    fn add_two_numbers() {
        let mut lbf = vm(LBForthParams::default());
        lbf.forth.process_str("1 2 + ");
        assert_eq!(take_output(&mut lbf), "1 ok\n2 ok\n3 ok\n");
        assert_eq!(stack(&lbf), [3.0]);
    }

    #[test]
    fn unknown_word_changes_nothing() {
        let mut lbf = vm(LBForthParams::default());
        let used = lbf.forth.dictionary().used();
        lbf.forth.process_str("foo ");
        assert_eq!(take_output(&mut lbf), "foo error\n");
        assert!(lbf.forth.data_stack.is_empty());
        assert_eq!(lbf.forth.dictionary().used(), used);
    }

    #[test]
    fn words_lists_in_insertion_order() {
        let mut lbf = privileged_vm();
        lbf.forth.process_str("words ");
        assert_eq!(take_output(&mut lbf), "words + l32 ok\n");

        // No side effects, so asking twice gives the same answer.
        lbf.forth.process_str("words\nwords\n");
        assert_eq!(take_output(&mut lbf), "words + l32 ok\nwords + l32 ok\n");
        assert!(lbf.forth.data_stack.is_empty());
    }

    #[test]
    fn unprivileged_has_no_l32() {
        let mut lbf = vm(LBForthParams::default());
        assert!(!lbf.forth.is_privileged());
        lbf.forth.process_str("words 4096 l32 ");
        assert_eq!(take_output(&mut lbf), "words + ok\n4096 ok\nl32 error\n");
        assert_eq!(stack(&lbf), [4096.0]);
    }

    #[test]
    fn literal_push_resets_full_stack() {
        let mut lbf = vm(LBForthParams {
            data_stack_elems: 3,
            ..LBForthParams::default()
        });
        lbf.forth.process_str("1 2 3 ");
        assert_eq!(stack(&lbf), [1.0, 2.0, 3.0]);
        lbf.forth.process_str("4 ");
        assert_eq!(stack(&lbf), [4.0]);
        assert_eq!(take_output(&mut lbf), "1 ok\n2 ok\n3 ok\n4 ok\n");
    }

    #[test]
    fn long_word_keeps_tail() {
        let mut lbf = vm(LBForthParams {
            word_buf_elems: 4,
            ..LBForthParams::default()
        });
        // "12345678" restarts after "1234", leaving "5678".
        lbf.forth.process_str("12345678 ");
        assert_eq!(take_output(&mut lbf), "5678 ok\n");

        // Exactly full is still the whole word.
        lbf.forth.process_str("1234 ");
        assert_eq!(take_output(&mut lbf), "1234 ok\n");

        lbf.forth.process_str("wordswords ");
        assert_eq!(take_output(&mut lbf), "ds error\n");
        assert_eq!(stack(&lbf), [5678.0, 1234.0]);
    }

    #[test]
    fn words_need_trailing_whitespace() {
        let mut lbf = vm(LBForthParams::default());
        lbf.forth.process_str("1 2 +");
        assert_eq!(take_output(&mut lbf), "1 ok\n2 ok\n");
        lbf.forth.process_char(b'\r');
        assert_eq!(take_output(&mut lbf), "3 ok\n");
        lbf.forth.process_str("\t\t  \n");
        assert_eq!(take_output(&mut lbf), "");
    }

    #[test]
    fn underflow_is_reported() {
        let mut lbf = vm(LBForthParams::default());
        lbf.forth.process_str("+ 1 + ");
        assert_eq!(
            take_output(&mut lbf),
            "+: stack underflow\n1 ok\n+: stack underflow\n"
        );
        assert_eq!(stack(&lbf), [1.0]);
    }

    #[test]
    fn float_literals() {
        let mut lbf = vm(LBForthParams::default());
        lbf.forth.process_str("-1.5 .25 1e3 inf ");
        assert_eq!(
            take_output(&mut lbf),
            "-1.5 ok\n0.25 ok\n1000 ok\ninf ok\n"
        );
        assert_eq!(stack(&lbf), [-1.5, 0.25, 1000.0, f64::INFINITY]);

        lbf.forth.process_str("0x10 1.2.3 ");
        assert_eq!(take_output(&mut lbf), "16 ok\n1.2.3 error\n");
    }

    #[test]
    fn hex_literals() {
        let mut lbf = vm(LBForthParams::default());
        lbf.forth.process_str("0x10 0x1p4 -0X1.8 0x40021000 +0xa.8p-1 0x.4 ");
        assert_eq!(
            take_output(&mut lbf),
            "16 ok\n16 ok\n-1.5 ok\n1073876992 ok\n5.25 ok\n0.25 ok\n"
        );
        assert_eq!(
            stack(&lbf),
            [16.0, 16.0, -1.5, 1073876992.0, 5.25, 0.25]
        );

        // The whole word has to be hex.
        lbf.forth.data_stack.clear();
        lbf.forth.process_str("0x 0x. 0xg 0x1p 0x1p+ 0x10q 00x1 ");
        assert_eq!(
            take_output(&mut lbf),
            "0x error\n0x. error\n0xg error\n0x1p error\n0x1p+ error\n0x10q error\n00x1 error\n"
        );
        assert!(lbf.forth.data_stack.is_empty());
    }

    #[test]
    fn hex_addresses_for_l32() {
        let mut lbf = privileged_vm();
        lbf.forth.process_str("0x1004 l32 ");
        assert_eq!(take_output(&mut lbf), "4100 ok\n0xcafef00d ok\n");
        assert_eq!(stack(&lbf), [3405705229.0]);
    }

    #[test]
    fn literals_shadow_words() {
        let mut lbf = vm(LBForthParams::default());
        lbf.forth.add_source_word("1", "2").unwrap();
        assert!(matches!(lbf.forth.lookup(b"1"), Ok(Lookup::Literal { val }) if val == 1.0));
    }

    #[test]
    fn l32_loads_words() {
        let mut lbf = privileged_vm();
        lbf.forth.process_str("4096 l32 ");
        assert_eq!(take_output(&mut lbf), "4096 ok\n0x2a ok\n");
        assert_eq!(stack(&lbf), [42.0]);

        lbf.forth.process_str("4100.9 l32 ");
        assert_eq!(take_output(&mut lbf), "4100.9 ok\n0xcafef00d ok\n");
        assert_eq!(stack(&lbf), [42.0, 3405705229.0]);
    }

    #[test]
    fn l32_failures_leave_stack_alone() {
        let mut lbf = privileged_vm();
        lbf.forth.process_str("l32 ");
        assert_eq!(take_output(&mut lbf), "l32: stack underflow\n");

        let cases = [
            ("4098 ", "l32: unaligned address\n"),
            ("8192 ", "l32: address out of range\n"),
            ("-4 ", "l32: bad address\n"),
            ("nan ", "l32: bad address\n"),
            ("1e30 ", "l32: bad address\n"),
        ];
        for (addr, diag) in cases {
            lbf.forth.data_stack.clear();
            lbf.forth.process_str(addr);
            let _ = take_output(&mut lbf);
            let before = stack(&lbf);
            lbf.forth.process_str("l32 ");
            assert_eq!(take_output(&mut lbf), diag);
            assert_eq!(stack(&lbf).len(), before.len());
        }
    }

    #[test]
    fn source_words_are_listed_not_run() {
        let mut lbf = vm(LBForthParams::default());
        lbf.forth.add_source_word("sq", "dup *").unwrap();
        lbf.forth.add_source_word("+", "1 1").unwrap();

        lbf.forth.process_str("words ");
        assert_eq!(take_output(&mut lbf), "words + sq + ok\n");

        lbf.forth.process_str("2 sq ");
        assert_eq!(
            take_output(&mut lbf),
            "2 ok\nsq: compound words are not executable\n"
        );
        assert_eq!(stack(&lbf), [2.0]);

        // The native `+` was added first, and wins.
        lbf.forth.process_str("3 + ");
        assert_eq!(take_output(&mut lbf), "3 ok\n5 ok\n");

        let sq = lbf.forth.dictionary().find(b"sq").unwrap();
        assert_eq!(sq.source(), Some("dup *"));
    }

    #[test]
    fn full_dictionary_is_reported() {
        let mut lbf = LBForth::from_params(
            LBForthParams {
                dict_buf_elems: 64,
                ..LBForthParams::default()
            },
            Vec::<u8>::new(),
        )
        .unwrap();
        let mut res = Ok(());
        while res.is_ok() {
            res = lbf.forth.add_source_word("w", "a longer body than fits");
        }
        assert_eq!(
            res,
            Err(Error::Bump(crate::dictionary::BumpError::OutOfMemory))
        );
        assert!(lbf.forth.dictionary().used() <= lbf.forth.dictionary().capacity());
    }

    #[test]
    fn zero_sized_buffers_are_rejected() {
        for params in [
            LBForthParams {
                data_stack_elems: 0,
                ..LBForthParams::default()
            },
            LBForthParams {
                word_buf_elems: 0,
                ..LBForthParams::default()
            },
            LBForthParams {
                dict_buf_elems: 0,
                ..LBForthParams::default()
            },
        ] {
            assert!(matches!(
                LBForth::from_params(params, Vec::<u8>::new()),
                Err(Error::ZeroSizedBuffer)
            ));
        }
    }

    #[test]
    fn ui_tests() {
        crate::testutil::blocking_runtest(
            r#"
            > 1 2 +
            < 1 ok
            < 2 ok
            < 3 ok
            > words
            < words + - * / dup drop .s ok
            > foo
            < foo error
            > .s
            < 3 ok
            "#,
        );
    }
}
