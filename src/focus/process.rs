//! Bounded external process calls.
//!
//! Every helper invocation runs with a deadline so that a hung tool cannot
//! hold the focus lock forever.

use std::io::{ErrorKind, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Poll interval while waiting for a child to exit
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{program} not found")]
    NotFound { program: String },
    #[error("{program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
    #[error("{program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result of a finished child process.
#[derive(Debug)]
pub struct Finished {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
}

/// Spawn `cmd`, optionally feed `input` on stdin, and wait up to `timeout`.
///
/// Stdout is captured when `capture` is set, discarded otherwise. A child
/// still running at the deadline is killed.
pub fn run(
    cmd: &mut Command,
    input: Option<&[u8]>,
    capture: bool,
    timeout: Duration,
) -> Result<Finished, RunError> {
    let program = cmd.get_program().to_string_lossy().into_owned();

    cmd.stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(if capture { Stdio::piped() } else { Stdio::null() })
        .stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(|source| match source.kind() {
        ErrorKind::NotFound => RunError::NotFound {
            program: program.clone(),
        },
        _ => RunError::Io {
            program: program.clone(),
            source,
        },
    })?;

    // Pipes are serviced on their own threads so the deadline also covers a
    // child that never reads its input or floods its output.
    let writer = match (input, child.stdin.take()) {
        (Some(data), Some(mut stdin)) => {
            let data = data.to_vec();
            Some(thread::spawn(move || match stdin.write_all(&data) {
                // A command that never reads its input is not an error.
                Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            }))
        }
        _ => None,
    };
    let reader = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            out.read_to_end(&mut buf).map(|_| buf)
        })
    });

    let status = wait_with_deadline(&mut child, &program, timeout)?;

    // Only join a writer that is done; a grandchild may still hold the pipe.
    if let Some(writer) = writer.filter(|w| w.is_finished())
        && let Ok(Err(e)) = writer.join()
    {
        warn!(program, error = %e, "Failed to write child input");
    }

    let stdout = match reader.map(|r| r.join()) {
        Some(Ok(Ok(buf))) => buf,
        Some(Ok(Err(source))) => return Err(RunError::Io { program, source }),
        Some(Err(_)) => {
            return Err(RunError::Io {
                program,
                source: std::io::Error::other("stdout reader panicked"),
            });
        }
        None => Vec::new(),
    };

    debug!(program, ?status, "Child exited");
    Ok(Finished { status, stdout })
}

fn wait_with_deadline(
    child: &mut Child,
    program: &str,
    timeout: Duration,
) -> Result<ExitStatus, RunError> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if start.elapsed() > timeout {
                    kill(child, program);
                    return Err(RunError::TimedOut {
                        program: program.to_string(),
                        timeout,
                    });
                }
                std::thread::sleep(WAIT_POLL_INTERVAL);
            }
            Err(source) => {
                return Err(RunError::Io {
                    program: program.to_string(),
                    source,
                });
            }
        }
    }
}

fn kill(child: &mut Child, program: &str) {
    if let Err(e) = child.kill() {
        warn!(program, error = %e, "Failed to kill child");
    }
    // Reap it so it does not linger as a zombie.
    let _ = child.wait();
}
