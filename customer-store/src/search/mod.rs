//! Search box state
//!
//! [`SearchQuery`] holds the raw text with a single setter. Listings should
//! not follow every keystroke, so [`SearchQuery::debounced`] spawns a stage
//! that forwards a value only once the text has been quiet for `delay`.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Debounce used by the contacts listing
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct SearchQuery {
    tx: watch::Sender<String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchQuery {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(String::new());
        Self { tx }
    }

    /// Replace the search text; setting the same text again is a no-op
    pub fn set(&self, text: impl Into<String>) {
        let text = text.into();
        self.tx.send_if_modified(|current| {
            if *current == text {
                false
            } else {
                *current = text;
                true
            }
        });
    }

    pub fn current(&self) -> String {
        self.tx.borrow().clone()
    }

    /// Raw, undebounced updates
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }

    /// Spawn a debounce stage on the current runtime
    pub fn debounced(&self, delay: Duration) -> DebouncedSearch {
        let input = self.tx.subscribe();
        let (output, rx) = watch::channel(input.borrow().clone());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(debounce(input, output, delay, cancel.clone()));
        DebouncedSearch { rx, cancel, handle }
    }
}

/// Output side of a debounce stage; dropping it stops the stage
#[derive(Debug)]
pub struct DebouncedSearch {
    rx: watch::Receiver<String>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl DebouncedSearch {
    /// Last forwarded value
    pub fn current(&self) -> String {
        self.rx.borrow().clone()
    }

    /// Wait for the next forwarded value. `None` once the stage has stopped.
    pub async fn changed(&mut self) -> Option<String> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn has_pending(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DebouncedSearch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn debounce(
    mut input: watch::Receiver<String>,
    output: watch::Sender<String>,
    delay: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            changed = input.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }

        // Quiet period: every further change restarts the timer
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                changed = input.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(delay) => break,
            }
        }

        let value = input.borrow_and_update().clone();
        tracing::trace!(search = %value, "Search settled");
        output.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}
