//! Polling log tail with per-subscriber cursoring.
//!
//! Each subscription owns its own loop and [`LogCursor`]; one fetch is in
//! flight at a time. Dropping the stream drops the timer and any pending
//! fetch, so nothing is emitted after the subscriber leaves.

use crate::config::LifecycleConfig;
use crate::runtime::{ContainerRuntime, LogTail};
use craftd_common::{CraftdError, LogFrame, Result};
use futures::Stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Position of one subscriber in an instance's output.
#[derive(Debug)]
pub struct LogCursor {
    next_index: u64,
    tail_lines: usize,
    /// Tail window of the last emitted fetch; `None` until output was seen.
    baseline: Option<Vec<String>>,
}

impl LogCursor {
    pub fn new(tail_lines: usize) -> Self {
        Self {
            next_index: 0,
            tail_lines: tail_lines.max(1),
            baseline: None,
        }
    }

    /// Full backlog until something was emitted, then only the tail window.
    pub fn next_fetch(&self) -> LogTail {
        match self.baseline {
            Some(_) => LogTail::Lines(self.tail_lines),
            None => LogTail::All,
        }
    }

    /// Compares a fetch with the previous one and returns a frame only if
    /// it changed. The frame carries the whole fetched set, not a delta.
    pub fn observe(&mut self, lines: Vec<String>) -> Option<LogFrame> {
        let window = lines[lines.len().saturating_sub(self.tail_lines)..].to_vec();
        match &self.baseline {
            None if lines.is_empty() => return None,
            Some(previous) if *previous == window => return None,
            _ => {}
        }

        let frame = LogFrame {
            data: lines,
            index: self.next_index,
        };
        self.next_index += 1;
        self.baseline = Some(window);
        Some(frame)
    }
}

#[derive(Clone)]
pub struct LogTailPoller {
    runtime: Arc<dyn ContainerRuntime>,
    interval: Duration,
    tail_lines: usize,
}

impl LogTailPoller {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: &LifecycleConfig) -> Self {
        Self {
            runtime,
            interval: config.log_poll_interval,
            tail_lines: config.log_tail_lines,
        }
    }

    /// Checks the instance exists, then returns its frame stream.
    pub async fn open(
        &self,
        id: &str,
    ) -> Result<impl Stream<Item = LogFrame> + Send + 'static> {
        self.runtime
            .inspect(id)
            .await
            .map_err(|e| CraftdError::LogFetchFailed {
                id: id.to_string(),
                reason: e.message(),
            })?;
        info!(container_id = %id, "Log subscription opened");
        Ok(self.subscribe(id.to_string()))
    }

    /// Poll loop for one subscriber. Failed fetches yield nothing for that
    /// tick and never end the stream.
    pub fn subscribe(&self, id: String) -> impl Stream<Item = LogFrame> + Send + 'static {
        let runtime = self.runtime.clone();
        let period = self.interval;
        let tail_lines = self.tail_lines;

        async_stream::stream! {
            let mut cursor = LogCursor::new(tail_lines);
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match runtime.logs(&id, cursor.next_fetch()).await {
                    Ok(lines) => {
                        if let Some(frame) = cursor.observe(lines) {
                            yield frame;
                        }
                    }
                    Err(e) => {
                        debug!(container_id = %id, error = %e, "Log fetch failed, skipping tick")
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_fetch_is_full_backlog() {
        let mut cursor = LogCursor::new(100);
        assert_eq!(cursor.next_fetch(), LogTail::All);

        // Nothing seen yet, keep asking for everything
        assert!(cursor.observe(Vec::new()).is_none());
        assert_eq!(cursor.next_fetch(), LogTail::All);

        cursor.observe(lines(&["a"])).unwrap();
        assert_eq!(cursor.next_fetch(), LogTail::Lines(100));
    }

    #[test]
    fn test_identical_fetch_emits_nothing() {
        let mut cursor = LogCursor::new(100);
        let first = cursor.observe(lines(&["a", "b"])).unwrap();
        assert_eq!(first.index, 0);

        assert!(cursor.observe(lines(&["a", "b"])).is_none());
        assert!(cursor.observe(lines(&["a", "b"])).is_none());
    }

    #[test]
    fn test_changed_fetch_emits_full_set_with_next_index() {
        let mut cursor = LogCursor::new(100);
        cursor.observe(lines(&["a", "b"])).unwrap();

        let frame = cursor.observe(lines(&["a", "b", "c"])).unwrap();
        assert_eq!(frame.index, 1);
        assert_eq!(frame.data, lines(&["a", "b", "c"]));
    }

    #[test]
    fn test_tail_window_matches_full_backlog_tail() {
        let mut cursor = LogCursor::new(2);
        cursor.observe(lines(&["a", "b", "c"])).unwrap();

        // Tail fetch of the unchanged output
        assert!(cursor.observe(lines(&["b", "c"])).is_none());

        let frame = cursor.observe(lines(&["c", "d"])).unwrap();
        assert_eq!(frame.index, 1);
    }
}
