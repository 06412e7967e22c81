#![forbid(unsafe_code)]

//! Cooperative cancellation for subscription threads.
//!
//! A [`CancellationSource`] hands out cloneable [`CancellationToken`]s. The
//! poller checks its token between fetches and sleeps with
//! [`CancellationToken::wait_timeout`], so teardown wakes it at once rather
//! than after a full poll interval.
//!
//! ```
//! use flowboard::cancellation::CancellationSource;
//! use std::time::Duration;
//!
//! let source = CancellationSource::new();
//! let token = source.token();
//! let worker = std::thread::spawn(move || {
//!     let mut rounds = 0;
//!     while !token.wait_timeout(Duration::from_millis(5)) {
//!         rounds += 1;
//!     }
//!     rounds
//! });
//! source.cancel();
//! let _rounds = worker.join().unwrap();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use web_time::{Duration, Instant};

struct Shared {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Observer side of a cancellation signal.
#[derive(Clone)]
pub struct CancellationToken {
    shared: Arc<Shared>,
}

/// Control side of a cancellation signal. Dropping it does not cancel.
pub struct CancellationSource {
    shared: Arc<Shared>,
}

impl CancellationSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                cancelled: AtomicBool::new(false),
                lock: Mutex::new(()),
                wake: Condvar::new(),
            }),
        }
    }

    /// A token observing this source.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Request cancellation and wake every waiter. Idempotent.
    pub fn cancel(&self) {
        if self.shared.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let _guard = self.shared.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.shared.wake.notify_all();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSource")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancellationToken {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Sleep up to `duration`, returning early on cancellation.
    ///
    /// Returns `true` if cancelled, `false` if the full duration elapsed.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut guard = self.shared.lock.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = self
                .shared
                .wake
                .wait_timeout(guard, deadline - now)
                .map(|(g, _)| g)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
