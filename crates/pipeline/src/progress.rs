//! Progress reporting and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Receives `(done, total, message)` after each processed tile.
pub trait ProgressSink {
    fn report(&mut self, done: usize, total: usize, message: &str);
}

impl<F: FnMut(usize, usize, &str)> ProgressSink for F {
    fn report(&mut self, done: usize, total: usize, message: &str) {
        self(done, total, message)
    }
}

/// Logs progress at every 10% step.
#[derive(Debug, Default)]
pub struct LogProgress {
    last_step: Option<usize>,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for LogProgress {
    fn report(&mut self, done: usize, total: usize, message: &str) {
        let step = if total == 0 { 10 } else { done * 10 / total };
        if self.last_step.map_or(true, |last| step > last) {
            self.last_step = Some(step);
            info!(percent = step * 10, done, total, "{}", message);
        }
    }
}

/// Shared flag checked by sessions between tiles.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |done: usize, total: usize, _: &str| seen.push((done, total));
            sink.report(1, 2, "x");
            sink.report(2, 2, "x");
        }
        assert_eq!(seen, vec![(1, 2), (2, 2)]);
    }
}
