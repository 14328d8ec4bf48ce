use bytes::Bytes;
use futures::stream;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;

/// Size of each body chunk handed to the HTTP client.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Sentinel for "nothing reported yet".
const NOT_REPORTED: u16 = u16::MAX;

/// Turns bytes-sent into integer percentages and reports each new value once.
pub struct ProgressTracker {
    total: usize,
    sent: AtomicUsize,
    last: AtomicU16,
    callback: Box<dyn Fn(u8) + Send + Sync>,
}

impl ProgressTracker {
    pub fn new(total: usize, callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            total,
            sent: AtomicUsize::new(0),
            last: AtomicU16::new(NOT_REPORTED),
            callback: Box::new(callback),
        }
    }

    /// Record `n` more bytes handed to the transport.
    pub fn advance(&self, n: usize) {
        let sent = self.sent.fetch_add(n, Ordering::AcqRel) + n;
        self.report(percent(sent, self.total));
    }

    fn report(&self, pct: u8) {
        let prev = self.last.swap(pct as u16, Ordering::AcqRel);
        if prev != pct as u16 {
            (self.callback)(pct);
        }
    }
}

/// Integer percentage, rounded down, clamped to 100. An empty body is done.
pub fn percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent.min(total) as u128 * 100) / total as u128) as u8
}

/// Wrap `bytes` in a streaming request body that reports progress as each
/// chunk is pulled by the transport.
pub fn chunked_body(bytes: Bytes, tracker: Arc<ProgressTracker>) -> reqwest::Body {
    if bytes.is_empty() {
        tracker.report(100);
    }

    let chunks: Vec<Bytes> = (0..bytes.len())
        .step_by(CHUNK_SIZE)
        .map(|start| bytes.slice(start..(start + CHUNK_SIZE).min(bytes.len())))
        .collect();

    let body = stream::iter(chunks.into_iter().map(move |chunk| {
        tracker.advance(chunk.len());
        Ok::<Bytes, std::io::Error>(chunk)
    }));

    reqwest::Body::wrap_stream(body)
}
