//! Countdown that gates the final sort on every peer's END frame.

use meshsort_common::{Result, SortError};
use tokio::sync::watch;

/// Countdown initialised to the number of peers.
///
/// Each receiver calls [`CompletionBarrier::arrive`] once after reading its
/// peer's END frame; [`CompletionBarrier::wait`] resolves when the count
/// reaches zero. A barrier created for zero peers is released immediately.
#[derive(Debug)]
pub struct CompletionBarrier {
    expected: usize,
    remaining: watch::Sender<usize>,
}

impl CompletionBarrier {
    pub fn new(expected: usize) -> Self {
        let (remaining, _) = watch::channel(expected);
        Self {
            expected,
            remaining,
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn remaining(&self) -> usize {
        *self.remaining.borrow()
    }

    pub fn is_released(&self) -> bool {
        self.remaining() == 0
    }

    /// Record one peer's END.
    pub fn arrive(&self) -> Result<usize> {
        let mut overrun = false;
        self.remaining.send_if_modified(|remaining| {
            if *remaining == 0 {
                overrun = true;
                false
            } else {
                *remaining -= 1;
                true
            }
        });
        if overrun {
            return Err(SortError::internal_error(format!(
                "more END frames than the {} expected peers",
                self.expected
            )));
        }
        Ok(self.remaining())
    }

    pub async fn wait(&self) {
        let mut rx = self.remaining.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|remaining| *remaining == 0).await;
    }
}
