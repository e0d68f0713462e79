use futures::{Stream, StreamExt};

use super::Forth;
use crate::output::Output;

impl<O: Output + 'static> Forth<O> {
    /// Drives the VM from an asynchronous source of bytes.
    ///
    /// Each byte is handled exactly like [`Forth::process_char`]. The VM
    /// stays the only owner of its state, so several producers can share one
    /// interpreter by sending into a channel whose receiving end is passed
    /// here.
    ///
    /// Returns the number of bytes processed once `input` ends.
    pub async fn process_stream<S>(&mut self, mut input: S) -> usize
    where
        S: Stream<Item = u8> + Unpin,
    {
        let mut count = 0;
        while let Some(ch) = input.next().await {
            self.process_char(ch);
            count += 1;
        }
        tracing::debug!(count, "input stream ended");
        count
    }
}

#[cfg(test)]
pub mod test {
    use futures::{channel::mpsc, executor::block_on, stream};

    use crate::leakbox::{LBForth, LBForthParams};

    #[test]
    fn stream_of_bytes() {
        let mut lbf = LBForth::from_params(LBForthParams::default(), Vec::new()).unwrap();
        lbf.forth.register_core_words().unwrap();

        let input = stream::iter(b"1 2 + words ".iter().copied());
        let count = block_on(lbf.forth.process_stream(input));
        assert_eq!(count, 12);
        assert_eq!(lbf.forth.output, b"1 ok\n2 ok\n3 ok\nwords + ok\n");
    }

    #[test]
    fn many_producers() {
        let mut lbf = LBForth::from_params(LBForthParams::default(), Vec::new()).unwrap();
        lbf.forth.register_core_words().unwrap();

        let (tx, rx) = mpsc::unbounded::<u8>();
        let tx2 = tx.clone();
        for &b in b"40 " {
            tx.unbounded_send(b).unwrap();
        }
        for &b in b"2 + " {
            tx2.unbounded_send(b).unwrap();
        }
        drop((tx, tx2));

        let count = block_on(lbf.forth.process_stream(rx));
        assert_eq!(count, 7);
        assert_eq!(lbf.forth.output, b"40 ok\n2 ok\n42 ok\n");
        assert_eq!(lbf.forth.data_stack.try_pop(), Ok(42.0));
    }
}
