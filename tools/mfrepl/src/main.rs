use std::io::{stdin, stdout, Read};

use microforth::{
    leakbox::{LBForth, LBForthParams},
    output::IoOutput,
};

const ENV_FILTER: &str = "MFREPL_TRACE";

fn setup_tracing() {
    use tracing_subscriber::prelude::*;

    let filter = tracing_subscriber::EnvFilter::from_env(ENV_FILTER);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();
}

fn main() {
    setup_tracing();

    let params = LBForthParams {
        data_stack_elems: 10,
        word_buf_elems: 64,
        dict_buf_elems: 4 * 1024,
    };
    let mut lbf = match LBForth::from_params(params, IoOutput(stdout().lock())) {
        Ok(lbf) => lbf,
        Err(e) => {
            eprintln!("failed to create VM: {e}");
            std::process::exit(1);
        }
    };
    let forth = &mut lbf.forth;
    if let Err(e) = forth.register_core_words() {
        eprintln!("failed to register builtins: {e}");
        std::process::exit(1);
    }
    tracing::info!(words = forth.dictionary().len(), "ready");

    for byte in stdin().lock().bytes() {
        match byte {
            Ok(ch) => forth.process_char(ch),
            Err(error) => {
                tracing::error!(%error, "failed to read stdin");
                break;
            }
        }
    }
    tracing::debug!("end of input");
}
