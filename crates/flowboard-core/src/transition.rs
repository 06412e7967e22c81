#![forbid(unsafe_code)]

//! Transition Store: the in-flight glide records.
//!
//! Every mutation goes through [`TransitionStore::create`],
//! [`TransitionStore::set_end_rect`], [`TransitionStore::finish`] and
//! [`TransitionStore::cancel`]. The presentation layer only reads: a real card
//! is visible iff [`TransitionStore::active_for`] returns `None`, and a clone is
//! drawn for each record in [`TransitionStore::all`].
//!
//! # Lifecycle
//!
//! ```text
//! create ──► PendingEnd ──set_end_rect──► Animating ──finish──► Finished
//!                │                            │
//!                └────────────cancel──────────┴──────────────► Cancelled
//! ```
//!
//! `PendingStart` is never stored: `create` takes the captured start rectangle,
//! and a card whose start cannot be captured gets no record at all.
//!
//! # Invariants
//!
//! 1. At most one record per card id.
//! 2. Ids are monotonic; iteration order equals creation order.
//! 3. `end` is written at most once.
//! 4. Terminal records leave the store immediately and are kept only in the
//!    bounded history.
//! 5. `version()` changes on every successful mutation.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use ahash::AHashMap;

use crate::geometry::Rect;
use crate::snapshot::{Card, CardId};

/// Resolved transitions kept for diagnostics.
const HISTORY_CAPACITY: usize = 64;

/// Unique transition identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId(pub u64);

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "glide-{}", self.0)
    }
}

/// Lifecycle state of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStatus {
    /// Detected, start rectangle not yet captured.
    PendingStart,
    /// Start captured, waiting for the post-commit frame.
    PendingEnd,
    /// Both rectangles known; playback in progress.
    Animating,
    /// Playback completed (natively or via fallback timeout).
    Finished,
    /// Terminated early: measurement miss, supersession or teardown.
    Cancelled,
}

impl TransitionStatus {
    /// Whether the status is terminal.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

/// One glide's bookkeeping record.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub id: TransitionId,
    /// Card data as of detection time; what the clone displays.
    pub card: Card,
    pub start: Rect,
    pub end: Option<Rect>,
    pub status: TransitionStatus,
}

impl Transition {
    #[inline]
    pub fn card_id(&self) -> &CardId {
        &self.card.id
    }
}

/// A transition that left the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub id: TransitionId,
    pub card_id: CardId,
    pub status: TransitionStatus,
}

/// Owned container of in-flight transitions.
#[derive(Debug, Default)]
pub struct TransitionStore {
    next_id: u64,
    version: u64,
    entries: BTreeMap<TransitionId, Transition>,
    by_card: AHashMap<CardId, TransitionId>,
    history: VecDeque<Resolved>,
}

impl TransitionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new transition in `PendingEnd`.
    ///
    /// Returns `None` (and logs) when no start rectangle was captured. If the
    /// card already has an active transition it is cancelled first.
    pub fn create(&mut self, card: Card, start: Option<Rect>) -> Option<TransitionId> {
        let Some(start) = start else {
            tracing::warn!(
                target: "flowboard.transition",
                card_id = %card.id,
                "no start rectangle; glide skipped"
            );
            return None;
        };

        if let Some(stale) = self.active_for(&card.id) {
            tracing::debug!(
                target: "flowboard.transition",
                card_id = %card.id,
                stale = %stale,
                "superseding active transition"
            );
            self.cancel(stale);
        }

        self.next_id += 1;
        let id = TransitionId(self.next_id);
        self.by_card.insert(card.id.clone(), id);
        tracing::debug!(
            target: "flowboard.transition",
            id = %id,
            card_id = %card.id,
            "transition created"
        );
        self.entries.insert(
            id,
            Transition {
                id,
                card,
                start,
                end: None,
                status: TransitionStatus::PendingEnd,
            },
        );
        self.version += 1;
        Some(id)
    }

    /// Set the end rectangle and move the record to `Animating`.
    ///
    /// Only succeeds once, from `PendingEnd`.
    pub fn set_end_rect(&mut self, id: TransitionId, rect: Rect) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        if entry.status != TransitionStatus::PendingEnd || entry.end.is_some() {
            tracing::debug!(
                target: "flowboard.transition",
                id = %id,
                status = ?entry.status,
                "end rectangle already set"
            );
            return false;
        }
        entry.end = Some(rect);
        entry.status = TransitionStatus::Animating;
        self.version += 1;
        true
    }

    /// Remove a transition that completed. Idempotent.
    pub fn finish(&mut self, id: TransitionId) -> bool {
        self.resolve(id, TransitionStatus::Finished)
    }

    /// Remove a transition that was terminated early. Idempotent.
    pub fn cancel(&mut self, id: TransitionId) -> bool {
        self.resolve(id, TransitionStatus::Cancelled)
    }

    fn resolve(&mut self, id: TransitionId, status: TransitionStatus) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        if self.by_card.get(entry.card_id()) == Some(&id) {
            self.by_card.remove(entry.card_id());
        }
        tracing::debug!(
            target: "flowboard.transition",
            id = %id,
            card_id = %entry.card.id,
            status = ?status,
            "transition resolved"
        );
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(Resolved {
            id,
            card_id: entry.card.id,
            status,
        });
        self.version += 1;
        true
    }

    /// Cancel every active transition, returning their ids in creation order.
    pub fn drain_active(&mut self) -> Vec<TransitionId> {
        let ids: Vec<TransitionId> = self.entries.keys().copied().collect();
        for id in &ids {
            self.cancel(*id);
        }
        ids
    }

    /// The card's active transition, if any.
    #[inline]
    pub fn active_for(&self, card_id: &CardId) -> Option<TransitionId> {
        self.by_card.get(card_id).copied()
    }

    /// Whether the real card should be drawn.
    #[inline]
    pub fn is_visible(&self, card_id: &CardId) -> bool {
        self.active_for(card_id).is_none()
    }

    /// Look up a transition.
    #[inline]
    pub fn get(&self, id: TransitionId) -> Option<&Transition> {
        self.entries.get(&id)
    }

    /// All active transitions in creation order.
    pub fn all(&self) -> impl Iterator<Item = &Transition> + '_ {
        self.entries.values()
    }

    /// Number of active transitions.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no transition is active.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mutation counter.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Recently resolved transitions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Resolved> + '_ {
        self.history.iter()
    }

    /// Terminal status recorded for `id`, if it is still in the history.
    pub fn resolution_of(&self, id: TransitionId) -> Option<TransitionStatus> {
        self.history
            .iter()
            .rev()
            .find(|r| r.id == id)
            .map(|r| r.status)
    }
}
