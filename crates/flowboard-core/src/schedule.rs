#![forbid(unsafe_code)]

//! Deterministic, host-driven scheduler for frame callbacks and timeouts.
//!
//! The engine never blocks and never spawns threads. Instead it records what
//! it is waiting for here, and the host drains the queues:
//!
//! - [`Scheduler::take_frame_tasks`] at every rendering frame boundary,
//! - [`Scheduler::take_due`] whenever the monotonic clock advances.
//!
//! Time is a [`Duration`] since an arbitrary host epoch, the same convention
//! as a backend's monotonic clock.
//!
//! # Invariants
//!
//! 1. Frame tasks requested during a drain run on the *next* drain.
//! 2. Timers with equal deadlines fire in scheduling order.
//! 3. A cleared timer or cancelled frame request never fires.
//! 4. After [`Scheduler::cancel_all`] both queues are empty.

use std::collections::BTreeMap;

use web_time::Duration;

use crate::transition::TransitionId;

/// Work the engine asks to be woken up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// Capture end rectangles for snapshot `generation`.
    MeasureEnds { generation: u64 },
    /// Force completion of a glide that did not report finishing.
    Fallback(TransitionId),
}

/// Handle for a scheduled timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Handle for a frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameTicket(u64);

/// Frame and timer queues.
#[derive(Debug, Default)]
pub struct Scheduler {
    seq: u64,
    frame: Vec<(FrameTicket, Wakeup)>,
    timers: BTreeMap<(Duration, u64), Wakeup>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Run `task` at the next frame boundary.
    pub fn request_frame(&mut self, task: Wakeup) -> FrameTicket {
        let ticket = FrameTicket(self.next_seq());
        self.frame.push((ticket, task));
        ticket
    }

    /// Drop a pending frame request.
    pub fn cancel_frame(&mut self, ticket: FrameTicket) -> bool {
        let before = self.frame.len();
        self.frame.retain(|(t, _)| *t != ticket);
        self.frame.len() != before
    }

    /// Fire `task` once the clock reaches `deadline`.
    pub fn set_timeout(&mut self, deadline: Duration, task: Wakeup) -> TimerId {
        let seq = self.next_seq();
        self.timers.insert((deadline, seq), task);
        TimerId(seq)
    }

    /// Clear a timeout. Returns whether it was still pending.
    pub fn clear_timeout(&mut self, id: TimerId) -> bool {
        let key = self.timers.keys().find(|(_, seq)| *seq == id.0).copied();
        match key {
            Some(key) => self.timers.remove(&key).is_some(),
            None => false,
        }
    }

    /// Take every task queued for this frame.
    pub fn take_frame_tasks(&mut self) -> Vec<Wakeup> {
        std::mem::take(&mut self.frame)
            .into_iter()
            .map(|(_, task)| task)
            .collect()
    }

    /// Take every timer whose deadline is `<= now`, earliest first.
    pub fn take_due(&mut self, now: Duration) -> Vec<Wakeup> {
        let later = self.timers.split_off(&(now, u64::MAX));
        let due = std::mem::replace(&mut self.timers, later);
        due.into_values().collect()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Whether a frame callback is pending.
    #[inline]
    pub fn has_frame_tasks(&self) -> bool {
        !self.frame.is_empty()
    }

    /// Number of pending timers.
    #[inline]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Whether nothing is scheduled.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.frame.is_empty() && self.timers.is_empty()
    }

    /// Drop every pending frame request and timer.
    pub fn cancel_all(&mut self) {
        self.frame.clear();
        self.timers.clear();
    }
}
