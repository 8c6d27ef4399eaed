//! Bounded resize queue between a session and its backend
//!
//! The sender side never blocks: when the queue is full the new size is not
//! queued, but it is remembered as the latest overflow so the consumer still
//! converges on the most recent size once the queue drains.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::frame::TerminalSize;

/// Default number of pending resizes held per session
pub const DEFAULT_RESIZE_CAPACITY: usize = 10;

struct QueueState {
    pending: VecDeque<TerminalSize>,
    capacity: usize,
    /// Newest size that did not fit; superseded by any later queued size
    overflow: Option<TerminalSize>,
}

struct Shared {
    state: Mutex<QueueState>,
    notify: Notify,
    closed: CancellationToken,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Create a resize queue that shuts down when `closed` is cancelled
pub fn resize_queue(capacity: usize, closed: CancellationToken) -> (ResizeSender, ResizeReceiver) {
    let capacity = capacity.max(1);
    let shared = Arc::new(Shared {
        state: Mutex::new(QueueState {
            pending: VecDeque::with_capacity(capacity),
            capacity,
            overflow: None,
        }),
        notify: Notify::new(),
        closed,
    });

    (
        ResizeSender {
            shared: Arc::clone(&shared),
        },
        ResizeReceiver { shared },
    )
}

/// Producer half, owned by the client-to-backend loop
pub struct ResizeSender {
    shared: Arc<Shared>,
}

impl ResizeSender {
    /// Offer a new size without blocking.
    ///
    /// Returns `false` when the size was not queued, either because the
    /// session is closing or because the queue is full.
    pub fn offer(&self, size: TerminalSize) -> bool {
        if self.shared.closed.is_cancelled() {
            return false;
        }

        let queued = {
            let mut state = self.shared.lock();
            if state.pending.len() < state.capacity {
                state.pending.push_back(size);
                state.overflow = None;
                true
            } else {
                state.overflow = Some(size);
                false
            }
        };

        if queued {
            debug!(rows = size.rows, cols = size.cols, "Queued resize");
        } else {
            warn!(
                rows = size.rows,
                cols = size.cols,
                "Resize queue full, dropping resize"
            );
        }

        self.shared.notify.notify_one();
        queued
    }
}

/// Consumer half, owned by the backend's resize driver
pub struct ResizeReceiver {
    shared: Arc<Shared>,
}

impl ResizeReceiver {
    /// Wait for the next size.
    ///
    /// Returns `None` once the session is closing, even if sizes are still
    /// pending.
    pub async fn next_size(&mut self) -> Option<TerminalSize> {
        loop {
            if self.shared.closed.is_cancelled() {
                return None;
            }

            if let Some(size) = self.take() {
                return Some(size);
            }

            tokio::select! {
                biased;
                _ = self.shared.closed.cancelled() => return None,
                _ = self.shared.notify.notified() => {}
            }
        }
    }

    fn take(&self) -> Option<TerminalSize> {
        let mut state = self.shared.lock();
        state.pending.pop_front().or_else(|| state.overflow.take())
    }
}
