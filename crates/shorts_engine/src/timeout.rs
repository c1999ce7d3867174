use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("collaborator panicked")]
    Panicked,
    #[error("could not start collaborator thread: {0}")]
    Spawn(String),
}

/// Run `call` on a helper thread and wait at most `timeout` for its result.
///
/// On timeout the helper thread is left to finish on its own; its result is
/// discarded. A panic inside `call` surfaces as [`CallError::Panicked`].
pub fn call_with_timeout<T, F>(name: &str, timeout: Duration, call: F) -> Result<T, CallError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name(format!("shorts-{name}"))
        .spawn(move || {
            let _ = tx.send(call());
        })
        .map_err(|err| CallError::Spawn(err.to_string()))?;

    match rx.recv_timeout(timeout) {
        Ok(value) => Ok(value),
        Err(RecvTimeoutError::Timeout) => Err(CallError::TimedOut(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(CallError::Panicked),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_value_within_timeout() {
        let result = call_with_timeout("fast", Duration::from_secs(1), || 7);
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn slow_calls_time_out() {
        let result = call_with_timeout("slow", Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(300));
            7
        });
        assert_eq!(result, Err(CallError::TimedOut(Duration::from_millis(20))));
    }

    #[test]
    fn panics_are_contained() {
        let result: Result<u8, _> =
            call_with_timeout("boom", Duration::from_secs(1), || panic!("renderer bug"));
        assert_eq!(result, Err(CallError::Panicked));
    }
}
