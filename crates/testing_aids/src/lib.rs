// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An unpublished crate containing testing utilities for use within this repo.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

mod log;
#[cfg(unix)]
mod stub;

pub use log::*;
#[cfg(unix)]
pub use stub::*;

/// If something (whatever) does not happen in a test within this time, the test will fail.
///
/// This is only to break out of hangs, not for any situations that are actually expected. Tests
/// that drive stub processes with deliberately short timeouts must still finish well within it.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes a thread-safe function on a background thread and abandons it if it does not complete
/// within [`TEST_TIMEOUT`].
///
/// Returns `None` if the function panicked or ran out of time.
#[must_use]
pub fn execute_or_abandon<F, R>(f: F) -> Option<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (sender, receiver) = mpsc::channel();

    // A panic or a hang both leave the channel without a value; the former also closes it.
    thread::spawn(move || {
        let result = f();
        _ = sender.send(result);
    });

    receiver.recv_timeout(TEST_TIMEOUT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_within_timeout() {
        assert_eq!(execute_or_abandon(|| 42), Some(42));
    }

    #[test]
    fn panic_is_reported_as_none() {
        let result = execute_or_abandon(|| -> u32 { panic!("boom") });

        assert_eq!(result, None);
    }
}
