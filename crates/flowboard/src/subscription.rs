#![forbid(unsafe_code)]

//! Subscription system for continuous event sources.
//!
//! A subscription runs on its own thread and feeds messages into the
//! program's channel until its [`CancellationToken`] fires or the channel
//! closes. The program starts what `Model::subscriptions()` declares and
//! stops everything on teardown.
//!
//! # Invariants
//!
//! - Two subscriptions with the same [`SubId`] never run concurrently.
//! - After [`SubscriptionManager::stop_all`] returns, every subscription has
//!   been cancelled. A thread that does not exit within [`STOP_GRACE`] (one
//!   blocked in a request or a stdin read) is detached rather than joined, so
//!   teardown never waits on I/O. Well-behaved sources check their token
//!   before sending, and the program stops draining its channel at teardown.

use std::collections::HashSet;
use std::sync::mpsc;
use std::thread;

use web_time::{Duration, Instant};

use crate::cancellation::{CancellationSource, CancellationToken};

/// How long `stop` waits for a subscription thread before detaching it.
pub const STOP_GRACE: Duration = Duration::from_millis(100);

/// Identifier used to deduplicate subscriptions.
pub type SubId = u64;

/// A background source of messages.
pub trait Subscription<M: Send + 'static>: Send {
    /// Unique identifier for deduplication.
    fn id(&self) -> SubId;

    /// Produce messages until `stop` is cancelled or `sender` disconnects.
    ///
    /// Called on a dedicated thread.
    fn run(&self, sender: mpsc::Sender<M>, stop: CancellationToken);
}

struct RunningSubscription {
    id: SubId,
    source: CancellationSource,
    thread: Option<thread::JoinHandle<()>>,
}

impl RunningSubscription {
    /// Cancel the subscription and join its thread if it exits within
    /// [`STOP_GRACE`]; otherwise detach it.
    fn stop(mut self) -> bool {
        self.source.cancel();
        let Some(handle) = self.thread.take() else {
            return true;
        };
        let deadline = Instant::now() + STOP_GRACE;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                tracing::debug!(
                    target: "flowboard.subscription",
                    sub_id = self.id,
                    "subscription still blocked after cancel; detaching"
                );
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        if handle.join().is_err() {
            tracing::warn!(target: "flowboard.subscription", sub_id = self.id, "subscription thread panicked");
        }
        true
    }
}

impl Drop for RunningSubscription {
    fn drop(&mut self) {
        self.source.cancel();
    }
}

/// Starts and stops subscriptions for a program.
pub(crate) struct SubscriptionManager<M: Send + 'static> {
    active: Vec<RunningSubscription>,
    sender: mpsc::Sender<M>,
}

impl<M: Send + 'static> SubscriptionManager<M> {
    pub(crate) fn new(sender: mpsc::Sender<M>) -> Self {
        Self {
            active: Vec::new(),
            sender,
        }
    }

    /// Make the running set match `subscriptions`.
    pub(crate) fn reconcile(&mut self, subscriptions: Vec<Box<dyn Subscription<M>>>) {
        let new_ids: HashSet<SubId> = subscriptions.iter().map(|s| s.id()).collect();

        let mut remaining = Vec::new();
        for running in self.active.drain(..) {
            if new_ids.contains(&running.id) {
                remaining.push(running);
            } else {
                tracing::debug!(target: "flowboard.subscription", sub_id = running.id, "stopping subscription");
                let _ = running.stop();
            }
        }
        self.active = remaining;

        let mut active_ids: HashSet<SubId> = self.active.iter().map(|r| r.id).collect();
        for sub in subscriptions {
            let id = sub.id();
            if !active_ids.insert(id) {
                continue;
            }
            tracing::debug!(target: "flowboard.subscription", sub_id = id, "starting subscription");
            let source = CancellationSource::new();
            let token = source.token();
            let sender = self.sender.clone();
            let thread = thread::spawn(move || sub.run(sender, token));
            self.active.push(RunningSubscription {
                id,
                source,
                thread: Some(thread),
            });
        }
    }

    /// Number of running subscriptions.
    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }

    /// Stop every running subscription. Returns how many were detached
    /// instead of joined.
    pub(crate) fn stop_all(&mut self) -> usize {
        let mut detached = 0;
        for running in self.active.drain(..) {
            if !running.stop() {
                detached += 1;
            }
        }
        detached
    }
}

impl<M: Send + 'static> Drop for SubscriptionManager<M> {
    fn drop(&mut self) {
        let _ = self.stop_all();
    }
}
