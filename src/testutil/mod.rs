//! # Test Utilities
//!
//! For now, mostly just helpers for running "ui tests", or executing forth code at
//! test time.
//!
//! ## UI Tests
//!
//! Generally, forth code provided as a str will have one of the following things
//! for each line:
//!
//! * Configuration values for the VM, specified as "frontmatter comments".
//!   These must appear before any other non-comment lines. Currently accepted:
//!     * `( data_stack_elems USIZE )`
//!     * `( word_buf_elems USIZE )`
//!     * `( dict_buf_elems USIZE )`
//! * Comment lines. These are any lines just containing a `( ... )` style forth comment.
//! * Input lines, starting with `> ...`. The line is fed to the VM one byte at
//!   a time, followed by a newline.
//! * Output lines, starting with `< ...`.
//!     * Any input line can have zero or more output lines
//!     * If *no* output lines are specified, ANY output is accepted/ignored.
//!
//! Errors are not special: the VM reports them as output, so they are
//! checked with `<` lines like everything else.
//!
//! The VM used by [`blocking_runtest`] has the core words and the math words.
//!
//! ### Example
//!
//! ```rust
//! # use microforth::testutil::blocking_runtest;
//! #
//! # blocking_runtest(r#"
//! ( specify VM settings with frontmatter )
//! ( data_stack_elems 2 )
//!
//! ( specify input with no output )
//! > 1 2
//!
//! ( specify input and output )
//! > 3 .s
//! < 3 ok
//! < 3 ok
//!
//! ( diagnostics are output too )
//! > + nope
//! < +: stack underflow
//! < nope error
//! # "#)
//! ```

use crate::{
    leakbox::{LBForth, LBForthParams},
    Forth,
};

/// Run the given forth ui test against a default VM
///
/// Does accept any/all/none of the configuration frontmatter (see above for
/// listing of frontmatter kinds)
pub fn blocking_runtest(contents: &str) {
    let tokd = tokenize(contents, true).unwrap();
    let mut forth = LBForth::from_params(tokd.settings, Vec::new()).unwrap();
    forth.forth.register_core_words().unwrap();
    forth.forth.register_math_words().unwrap();
    steps_with(tokd.steps.as_slice(), &mut forth.forth);
}

/// Run the given forth ui-test against the given forth vm.
///
/// Does not accept ui-tests with frontmatter configuration (will panic)
pub fn blocking_runtest_with(forth: &mut Forth<Vec<u8>>, contents: &str) {
    let tokd = tokenize(contents, false).unwrap();
    steps_with(tokd.steps.as_slice(), forth);
}

fn check_output(outcome: &Outcome, output: &str) {
    #[cfg(not(miri))]
    println!("< {output}");
    match outcome {
        Outcome::AnyOutput => {}
        Outcome::WithOutput(exp) => {
            let act_lines = output.lines().collect::<Vec<&str>>();
            if act_lines.len() != exp.len() {
                eprintln!("Expected: {exp:?}");
                eprintln!("Got: {act_lines:?}");
                panic!("wrong number of output lines");
            }
            act_lines.iter().zip(exp.iter()).for_each(|(a, e)| {
                assert_eq!(a.trim_end(), e.trim_end());
            })
        }
    }
}

// Runs the given steps against the given forth VM.
//
// Panics on any mismatch
fn steps_with(steps: &[Step], forth: &mut Forth<Vec<u8>>) {
    for Step { input, output: outcome } in steps {
        #[cfg(not(miri))]
        println!("> {input}");
        forth.process_str(input);
        forth.process_char(b'\n');
        let output = String::from_utf8_lossy(&forth.output).into_owned();
        check_output(outcome, &output);
        forth.output.clear();
    }
}

#[derive(Debug)]
enum Outcome {
    AnyOutput,
    WithOutput(Vec<String>),
}

#[derive(Debug)]
struct Step {
    input: String,
    output: Outcome,
}

#[derive(Default, Debug)]
struct Tokenized {
    settings: LBForthParams,
    steps: Vec<Step>,
}

fn tokenize(contents: &str, allow_frontmatter: bool) -> Result<Tokenized, ()> {
    let mut output = Tokenized::default();
    let mut frontmatter_done = !allow_frontmatter;

    for line in contents.lines() {
        let (tok, remain) = if let Some(t) = line.trim_start().split_once(' ') {
            t
        } else {
            continue;
        };

        match tok {
            ">" => {
                frontmatter_done = true;
                output.steps.push(Step {
                    input: remain.to_string(),
                    output: Outcome::AnyOutput,
                });
            }
            "<" => {
                frontmatter_done = true;
                let cur_step = output.steps.last_mut().ok_or(())?;
                let expected_out = remain.to_string();
                match &mut cur_step.output {
                    Outcome::AnyOutput => {
                        cur_step.output = Outcome::WithOutput(vec![expected_out]);
                    }
                    Outcome::WithOutput(o) => {
                        o.push(expected_out);
                    }
                }
            }
            "(" => {
                let mut split = remain.split_whitespace();
                let setting = match split.next() {
                    Some("data_stack_elems") => &mut output.settings.data_stack_elems,
                    Some("word_buf_elems") => &mut output.settings.word_buf_elems,
                    Some("dict_buf_elems") => &mut output.settings.dict_buf_elems,
                    Some(_) => continue,
                    None => return Err(()),
                };
                assert!(!frontmatter_done, "Unexpected frontmatter settings!");
                *setting = split
                    .next()
                    .and_then(|v| v.parse::<usize>().ok())
                    .ok_or(())?;
                assert_eq!(Some(")"), split.next());
            }
            _ => {}
        }
    }

    Ok(output)
}

#[cfg(test)]
pub mod test {
    use super::{blocking_runtest, blocking_runtest_with};
    use crate::leakbox::{LBForth, LBForthParams};

    #[test]
    fn frontmatter() {
        blocking_runtest(
            r#"
            ( word_buf_elems 4 )
            ( data_stack_elems 2 )
            > 123456 1 2 3
            < 56 ok
            < 1 ok
            < 2 ok
            < 3 ok
            > .s
            < 2 3 ok
            "#,
        );
    }

    #[test]
    fn any_output() {
        blocking_runtest(
            r#"
            ( nothing to check here )
            > 1 2 3 words
            > + + .s
            < 5 ok
            < 6 ok
            < 6 ok
            "#,
        );
    }

    #[test]
    fn custom_vm() {
        let mut lbf = LBForth::from_params(LBForthParams::default(), Vec::new()).unwrap();
        lbf.forth.register_core_words().unwrap();
        lbf.forth.add_source_word("five", "2 3 +").unwrap();
        blocking_runtest_with(
            &mut lbf.forth,
            r#"
            > words five
            < words + five ok
            < five: compound words are not executable
            "#,
        );
    }

    #[test]
    #[should_panic]
    fn mismatch_panics() {
        blocking_runtest(
            r#"
            > 1 2 +
            < 4 ok
            "#,
        );
    }
}
