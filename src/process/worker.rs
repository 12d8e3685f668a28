//! Child side of the process pool

use std::io::{self, BufRead, Write};

use tracing::{debug, trace};

use crate::error::Result;
use crate::task::{TaskError, TaskRegistry};

use super::protocol::{self, JobReply, JobRequest};

/// Answer job requests from `input` on `output` until end of input.
///
/// Returns the number of jobs served. Unknown function names are answered
/// with a [`TaskError::UnknownFunction`] reply rather than ending the loop.
pub fn serve<R: BufRead, W: Write>(registry: &TaskRegistry, mut input: R, mut output: W) -> Result<usize> {
    let mut served = 0;

    while let Some(request) = protocol::read_message::<_, JobRequest>(&mut input)? {
        trace!(index = request.index, function = %request.function, "Job received");

        let outcome = match registry.get(&request.function) {
            Some(function) => function.call(&request.arguments),
            None => Err(TaskError::UnknownFunction {
                name: request.function.clone(),
            }),
        };

        let reply = JobReply {
            index: request.index,
            outcome: outcome.into(),
        };
        protocol::write_message(&mut output, &reply)?;
        served += 1;
    }

    Ok(served)
}

/// Serve jobs on this process's stdin/stdout.
///
/// SIGINT is ignored so that Ctrl-C reaches only the coordinating process,
/// which decides what to salvage before killing its workers.
pub fn run_worker(registry: &TaskRegistry) -> Result<usize> {
    ignore_interrupts();

    let stdin = io::stdin();
    let stdout = io::stdout();
    let served = serve(registry, stdin.lock(), stdout.lock())?;

    debug!(served, "Worker input closed");
    Ok(served)
}

#[cfg(unix)]
fn ignore_interrupts() {
    // SAFETY: installs the SIG_IGN disposition; no handler code runs.
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_IGN);
    }
}

#[cfg(not(unix))]
fn ignore_interrupts() {}
