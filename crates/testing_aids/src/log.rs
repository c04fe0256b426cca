// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::Write;
use std::sync::{Arc, Mutex, Once, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Enables logging of test output to the standard output stream.
///
/// Everything down to DEBUG is shown, which includes every line `gfsh` prints. The test harness
/// only surfaces this output for failing tests.
///
/// Logging is global state and lasts until end of process. Calling this more than once is fine.
pub fn log_to_stdout() {
    LOGGING_INITIALIZER.call_once(|| {
        let terminal_layer = tracing_subscriber::fmt::layer()
            .with_test_writer()
            .with_filter(LevelFilter::DEBUG);

        // Another harness may have installed a subscriber already; theirs wins.
        _ = tracing_subscriber::registry().with(terminal_layer).try_init();
    });
}

static LOGGING_INITIALIZER: Once = Once::new();

/// Log capture buffer for testing.
///
/// Uses `tracing_subscriber::fmt::MakeWriter` to capture formatted log output into a shared
/// buffer that can be inspected in tests. Install it for the current thread with
/// `tracing::subscriber::with_default(capture.subscriber(), ...)`.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Creates an empty capture buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the captured log output as a string.
    #[must_use]
    pub fn output(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).to_string()
    }

    /// Waits until the captured output contains `expected` or `timeout` elapses.
    ///
    /// Useful when log entries are written from background threads that may lag behind the
    /// operation under test.
    #[must_use]
    pub fn wait_for(&self, expected: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            if self.output().contains(expected) {
                return true;
            }

            if Instant::now() >= deadline {
                return false;
            }

            thread::sleep(Duration::from_millis(20));
        }
    }

    /// Asserts that the captured log output contains the given string.
    ///
    /// # Panics
    ///
    /// Panics if the captured log output does not contain the expected string.
    pub fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(
            output.contains(expected),
            "log output does not contain '{expected}', got:\n{output}"
        );
    }

    /// Creates a `tracing` subscriber, capturing everything down to TRACE, that writes to this
    /// buffer.
    #[must_use]
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + use<> {
        tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_writer(self.clone())
                .with_ansi(false)
                .with_filter(LevelFilter::TRACE),
        )
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// Writer that appends to a shared buffer.
#[derive(Debug)]
pub struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_events_on_current_thread() {
        let capture = LogCapture::new();

        tracing::subscriber::with_default(capture.subscriber(), || {
            tracing::debug!(port = 10334, "locator started");
        });

        capture.assert_contains("locator started");
        capture.assert_contains("port=10334");
    }

    #[test]
    fn wait_for_sees_late_writes() {
        let capture = LogCapture::new();
        let dispatch = tracing::Dispatch::new(capture.subscriber());

        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            tracing::dispatcher::with_default(&dispatch, || tracing::warn!("late line"));
        });

        assert!(capture.wait_for("late line", Duration::from_secs(5)));
        writer.join().unwrap();
    }

    #[test]
    fn wait_for_gives_up() {
        let capture = LogCapture::new();

        assert!(!capture.wait_for("never", Duration::from_millis(30)));
    }
}
