#![forbid(unsafe_code)]

//! Two-Phase Measurer: capture glide rectangles around a layout commit.
//!
//! A rectangle is only meaningful for the layout it was read from, so each
//! relocation is measured twice:
//!
//! 1. [`TwoPhaseMeasurer::capture_starts`] runs synchronously *before* the
//!    new snapshot is committed, while the card still occupies its old slot.
//!    It creates a `PendingEnd` transition per captured card.
//! 2. [`TwoPhaseMeasurer::capture_ends`] runs at the next frame boundary,
//!    *after* the presentation layer has laid out the new snapshot.
//!
//! The probe reports which snapshot generation it currently reflects. If the
//! layout still lags behind the committed generation when the frame fires,
//! phase 2 is deferred to the following frame, up to a bounded number of
//! frames; past that the pending transitions are cancelled.
//!
//! Each relocation is measured independently: one card missing from the new
//! layout cancels only its own transition.

use crate::diff::Relocation;
use crate::geometry::Rect;
use crate::snapshot::CardId;
use crate::transition::{TransitionId, TransitionStatus, TransitionStore};

/// Frames phase 2 may wait for the layout to catch up.
pub const DEFAULT_MAX_END_DEFERRAL_FRAMES: u32 = 3;

/// Read access to the laid-out board.
pub trait LayoutProbe {
    /// Current bounding rectangle of the card's real representation.
    fn bounding_rect(&self, card: &CardId) -> Option<Rect>;

    /// Snapshot generation the layout currently reflects.
    fn generation(&self) -> u64;
}

/// Outcome of phase 1.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StartCapture {
    /// Transitions created in `PendingEnd`.
    pub created: Vec<TransitionId>,
    /// Cards whose start rectangle could not be read.
    pub missed: Vec<CardId>,
}

/// Outcome of phase 2.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum EndCapture {
    /// Nothing was awaiting measurement.
    #[default]
    Idle,
    /// Layout still shows an older generation; retry next frame.
    Deferred { layout: u64, awaiting: u64 },
    /// Measurement ran.
    Measured {
        /// Transitions whose end rectangle was set, ready to play.
        ready: Vec<TransitionId>,
        /// Transitions cancelled because the card was not found.
        missed: Vec<TransitionId>,
    },
}

/// Coordinates the two measurement phases.
#[derive(Debug)]
pub struct TwoPhaseMeasurer {
    pending: Vec<TransitionId>,
    awaiting: Option<u64>,
    deferrals: u32,
    max_deferrals: u32,
}

impl Default for TwoPhaseMeasurer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_END_DEFERRAL_FRAMES)
    }
}

impl TwoPhaseMeasurer {
    /// Create a measurer allowing `max_deferrals` frames of layout lag.
    #[must_use]
    pub fn new(max_deferrals: u32) -> Self {
        Self {
            pending: Vec::new(),
            awaiting: None,
            deferrals: 0,
            max_deferrals,
        }
    }

    /// Phase 1: read start rectangles from the pre-commit layout.
    ///
    /// `generation` is the snapshot generation about to be committed; phase 2
    /// will not run against a layout older than it.
    pub fn capture_starts(
        &mut self,
        relocations: &[Relocation],
        probe: &impl LayoutProbe,
        store: &mut TransitionStore,
        generation: u64,
    ) -> StartCapture {
        let mut out = StartCapture::default();
        for relocation in relocations {
            let start = probe.bounding_rect(&relocation.card_id);
            if start.is_none() {
                tracing::warn!(
                    target: "flowboard.measure",
                    card_id = %relocation.card_id,
                    from = %relocation.from,
                    to = %relocation.to,
                    "old element not found; skipping glide"
                );
                out.missed.push(relocation.card_id.clone());
            }
            if let Some(id) = store.create(relocation.card.clone(), start) {
                self.pending.push(id);
                out.created.push(id);
            }
        }
        if !self.pending.is_empty() {
            self.awaiting = Some(self.awaiting.map_or(generation, |g| g.max(generation)));
            self.deferrals = 0;
        }
        out
    }

    /// Phase 2: read end rectangles from the post-commit layout.
    pub fn capture_ends(
        &mut self,
        probe: &impl LayoutProbe,
        store: &mut TransitionStore,
    ) -> EndCapture {
        let Some(awaiting) = self.awaiting else {
            return EndCapture::Idle;
        };

        // Drop ids resolved elsewhere (superseded, torn down).
        self.pending.retain(|id| {
            store
                .get(*id)
                .is_some_and(|t| t.status == TransitionStatus::PendingEnd)
        });
        if self.pending.is_empty() {
            self.awaiting = None;
            return EndCapture::Idle;
        }

        let layout = probe.generation();
        if layout < awaiting {
            if self.deferrals < self.max_deferrals {
                self.deferrals += 1;
                tracing::debug!(
                    target: "flowboard.measure",
                    layout,
                    awaiting,
                    deferrals = self.deferrals,
                    "layout behind committed snapshot; deferring end capture"
                );
                return EndCapture::Deferred { layout, awaiting };
            }
            tracing::warn!(
                target: "flowboard.measure",
                layout,
                awaiting,
                pending = self.pending.len(),
                "layout never caught up; cancelling pending glides"
            );
            let missed = std::mem::take(&mut self.pending);
            for id in &missed {
                store.cancel(*id);
            }
            self.awaiting = None;
            self.deferrals = 0;
            return EndCapture::Measured {
                ready: Vec::new(),
                missed,
            };
        }

        let mut ready = Vec::new();
        let mut missed = Vec::new();
        for id in std::mem::take(&mut self.pending) {
            let Some(card_id) = store.get(id).map(|t| t.card_id().clone()) else {
                continue;
            };
            match probe.bounding_rect(&card_id) {
                Some(end) => {
                    if store.set_end_rect(id, end) {
                        ready.push(id);
                    }
                }
                None => {
                    tracing::warn!(
                        target: "flowboard.measure",
                        id = %id,
                        card_id = %card_id,
                        "card not found in new position; cancelling glide"
                    );
                    store.cancel(id);
                    missed.push(id);
                }
            }
        }
        self.awaiting = None;
        self.deferrals = 0;
        EndCapture::Measured { ready, missed }
    }

    /// Whether phase 2 has work pending.
    #[inline]
    pub fn is_waiting(&self) -> bool {
        self.awaiting.is_some()
    }

    /// Generation phase 2 is waiting for.
    #[inline]
    pub fn awaiting_generation(&self) -> Option<u64> {
        self.awaiting
    }

    /// Forget all pending work (teardown).
    pub fn clear(&mut self) {
        self.pending.clear();
        self.awaiting = None;
        self.deferrals = 0;
    }
}
