//! In-memory capture of tracing events.

use parking_lot::Mutex;
use serde_json::Value;
use std::io;
use std::sync::Arc;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

/// Events recorded by [`capture_logs`], one JSON object per event.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    /// Every event recorded so far, in emission order.
    pub fn events(&self) -> Vec<Value> {
        let buf = self.buf.lock();
        String::from_utf8_lossy(&buf)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Events whose `code` field equals `code`.
    pub fn with_code(&self, code: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|event| event["fields"]["code"] == code)
            .collect()
    }

    /// Levels (`"INFO"`, `"WARN"`, ...) of the events carrying `code`.
    pub fn levels(&self, code: &str) -> Vec<String> {
        self.with_code(code)
            .iter()
            .filter_map(|event| event["level"].as_str().map(str::to_string))
            .collect()
    }
}

pub struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CaptureWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter(Arc::clone(&self.buf))
    }
}

/// Record every event on the current thread until the guard is dropped.
///
/// Use from a current-thread runtime so the whole test stays on one thread.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(logs.clone())
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_records_fields_and_levels() {
        let (logs, _guard) = capture_logs();
        tracing::info!(code = "first", n = 1, "hello");
        tracing::warn!(code = "second", "careful");
        tracing::warn!(code = "first", "again");

        assert_eq!(logs.events().len(), 3);
        assert_eq!(logs.levels("first"), vec!["INFO", "WARN"]);
        assert_eq!(logs.with_code("second")[0]["fields"]["message"], "careful");
    }

    #[test]
    fn test_capture_stops_with_guard() {
        let (logs, guard) = capture_logs();
        drop(guard);
        tracing::warn!(code = "late", "not recorded");
        assert!(logs.events().is_empty());
    }
}
