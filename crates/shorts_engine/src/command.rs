use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use engine_logging::engine_warn;

use crate::CollabError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const STDERR_TAIL_CHARS: usize = 300;

/// Run `command` to completion, killing and reaping it once `deadline` passes.
///
/// Stdout and stderr are drained on their own threads so a chatty child
/// cannot stall on a full pipe.
pub(crate) fn run_with_deadline(
    program: &Path,
    command: &mut Command,
    deadline: Duration,
) -> Result<Output, CollabError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| spawn_error(program, err))?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match wait_until(&mut child, Instant::now() + deadline) {
        Ok(Some(status)) => status,
        Ok(None) => {
            // Grandchildren may still hold the pipes; the drain threads are left behind.
            let _ = child.kill();
            let _ = child.wait();
            engine_warn!("{} killed after {:?}", program.display(), deadline);
            return Err(CollabError::Timeout(deadline));
        }
        Err(err) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CollabError::Transient(format!(
                "lost track of {}: {err}",
                program.display()
            )));
        }
    };

    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn wait_until(child: &mut Child, until: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= until {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(until - now));
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

pub(crate) fn spawn_error(program: &Path, err: io::Error) -> CollabError {
    let message = format!("could not start {}: {err}", program.display());
    if err.kind() == io::ErrorKind::NotFound || err.kind() == io::ErrorKind::PermissionDenied {
        CollabError::Rejected(message)
    } else {
        CollabError::Transient(message)
    }
}

pub(crate) fn check_exit(program: &Path, output: &Output) -> Result<(), CollabError> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    let skip = stderr.chars().count().saturating_sub(STDERR_TAIL_CHARS);
    let tail: String = stderr.chars().skip(skip).collect();
    Err(CollabError::Transient(format!(
        "{} exited with {}: {}",
        program.display(),
        output.status,
        tail
    )))
}
