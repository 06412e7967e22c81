#![forbid(unsafe_code)]

//! Reconciler: the animated reconciliation loop.
//!
//! One [`Reconciler`] lives on the UI thread and is the only thing that
//! mutates the [`TransitionStore`]. The host drives it through four entry
//! points:
//!
//! ```text
//! poll result ──► ingest(next, old_layout)      diff, phase-1 capture, commit
//! frame       ──► on_frame(now, new_layout)     phase-2 capture, start glides
//! clock       ──► advance(now)                  native completion, fallbacks
//! host signal ──► notify_animation_finished(id)
//! ```
//!
//! Presentation reads [`Reconciler::is_card_visible`] and
//! [`Reconciler::clones`] every frame.
//!
//! # Duplicate relocations
//!
//! A card relocated again while its previous glide is still active gets
//! cancel-old-start-new treatment: the stale transition is cancelled (driver
//! playback stopped, fallback cleared) before the new start rectangle is
//! captured. The new glide starts where the stale clone was last drawn, not
//! from the hidden card's slot.
//!
//! # Teardown
//!
//! [`Reconciler::shutdown`] (also run on drop) clears frame requests, timers,
//! playbacks and transitions. Every entry point is a no-op afterwards.

use std::sync::Arc;

use ahash::AHashMap;
use web_time::Duration;

use crate::diff::{self, Relocation};
use crate::driver::{AnimationDriver, GlideConfig, GlideFrame, Outcome, Resolution};
use crate::geometry::Rect;
use crate::measure::{DEFAULT_MAX_END_DEFERRAL_FRAMES, EndCapture, LayoutProbe, TwoPhaseMeasurer};
use crate::schedule::{FrameTicket, Scheduler, TimerId, Wakeup};
use crate::snapshot::{BoardSnapshot, Card, CardId, ColumnId};
use crate::transition::{Transition, TransitionId, TransitionStatus, TransitionStore};

/// Reconciler parameters.
#[derive(Debug, Clone, Copy)]
pub struct ReconcilerConfig {
    pub glide: GlideConfig,
    /// Frames the end capture may wait for the layout to catch up.
    pub max_end_deferral_frames: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            glide: GlideConfig::default(),
            max_end_deferral_frames: DEFAULT_MAX_END_DEFERRAL_FRAMES,
        }
    }
}

/// What a single [`Reconciler::ingest`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Generation of the committed snapshot.
    pub generation: u64,
    pub relocations: Vec<Relocation>,
    /// Transitions created in `PendingEnd`.
    pub created: Vec<TransitionId>,
    /// Stale transitions cancelled by a newer relocation of the same card.
    pub superseded: Vec<TransitionId>,
    /// Relocated cards without a start rectangle.
    pub missed: Vec<CardId>,
}

/// A clone the presentation layer should draw.
#[derive(Debug, Clone, PartialEq)]
pub struct CloneView {
    pub id: TransitionId,
    /// Card data as of detection time; `card.col` is the source lane.
    pub card: Card,
    /// Destination lane in the committed snapshot, `None` once the card left
    /// the board.
    pub to: Option<ColumnId>,
    pub start: Rect,
    /// Interpolated state; `None` until the end rectangle is measured.
    pub frame: Option<GlideFrame>,
}

impl CloneView {
    /// Where to draw the clone now.
    pub fn rect(&self) -> Rect {
        self.frame.map_or(self.start, |f| f.rect)
    }

    /// Clone opacity now.
    pub fn opacity(&self) -> f32 {
        self.frame.map_or(1.0, |f| f.opacity)
    }
}

/// Owns the snapshot, transitions, measurer, driver and their timers.
#[derive(Debug)]
pub struct Reconciler {
    current: Option<Arc<BoardSnapshot>>,
    generation: u64,
    store: TransitionStore,
    measurer: TwoPhaseMeasurer,
    driver: AnimationDriver,
    scheduler: Scheduler,
    measure_frame: Option<FrameTicket>,
    fallback_timers: AHashMap<TransitionId, TimerId>,
    /// Latest time seen by `on_frame`, `advance` or `clones`.
    clock: Duration,
    shut_down: bool,
}

/// Layout probe with the positions of superseded clones laid over it.
struct CloneOverlay<'a, P> {
    layout: &'a P,
    clones: &'a AHashMap<CardId, Rect>,
}

impl<P: LayoutProbe> LayoutProbe for CloneOverlay<'_, P> {
    fn bounding_rect(&self, card: &CardId) -> Option<Rect> {
        self.clones
            .get(card)
            .copied()
            .or_else(|| self.layout.bounding_rect(card))
    }

    fn generation(&self) -> u64 {
        self.layout.generation()
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ReconcilerConfig::default())
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            current: None,
            generation: 0,
            store: TransitionStore::new(),
            measurer: TwoPhaseMeasurer::new(config.max_end_deferral_frames),
            driver: AnimationDriver::new(config.glide),
            scheduler: Scheduler::new(),
            measure_frame: None,
            fallback_timers: AHashMap::new(),
            clock: Duration::ZERO,
            shut_down: false,
        }
    }

    /// Commit `next` as the current snapshot.
    ///
    /// `probe` must still reflect the *previous* layout: start rectangles are
    /// read from it before the commit. The caller lays out the returned
    /// generation and passes that layout to the next [`Self::on_frame`].
    pub fn ingest(&mut self, next: BoardSnapshot, probe: &impl LayoutProbe) -> IngestReport {
        if self.shut_down {
            tracing::debug!(target: "flowboard.reconcile", "ingest after shutdown ignored");
            return IngestReport {
                generation: self.generation,
                ..IngestReport::default()
            };
        }

        let relocations = diff::relocations(self.current.as_deref(), &next);

        let mut superseded = Vec::new();
        let mut in_flight = AHashMap::new();
        for relocation in &relocations {
            if let Some(stale) = self.store.active_for(&relocation.card_id) {
                if let Some(rect) = self.clone_rect(stale) {
                    in_flight.insert(relocation.card_id.clone(), rect);
                }
                tracing::debug!(
                    target: "flowboard.reconcile",
                    card_id = %relocation.card_id,
                    stale = %stale,
                    "card relocated again before its glide ended"
                );
                self.cancel_transition(stale);
                superseded.push(stale);
            }
        }

        let generation = self.generation + 1;
        let overlay = CloneOverlay {
            layout: probe,
            clones: &in_flight,
        };
        let capture = self
            .measurer
            .capture_starts(&relocations, &overlay, &mut self.store, generation);

        self.current = Some(Arc::new(next));
        self.generation = generation;

        if self.measurer.is_waiting() && self.measure_frame.is_none() {
            let awaiting = self.measurer.awaiting_generation().unwrap_or(generation);
            self.measure_frame = Some(
                self.scheduler
                    .request_frame(Wakeup::MeasureEnds { generation: awaiting }),
            );
        }

        if !relocations.is_empty() {
            tracing::debug!(
                target: "flowboard.reconcile",
                generation,
                relocations = relocations.len(),
                created = capture.created.len(),
                superseded = superseded.len(),
                missed = capture.missed.len(),
                "snapshot committed"
            );
        }

        IngestReport {
            generation,
            relocations,
            created: capture.created,
            superseded,
            missed: capture.missed,
        }
    }

    /// Where the clone of `id` was last drawn.
    fn clone_rect(&mut self, id: TransitionId) -> Option<Rect> {
        match self.driver.sample(id, self.clock) {
            Some(frame) => Some(frame.rect),
            None => self.store.get(id).map(|t| t.start),
        }
    }

    /// Run frame-boundary work: end capture and glide start.
    ///
    /// Returns the transitions whose playback started.
    pub fn on_frame(&mut self, now: Duration, probe: &impl LayoutProbe) -> Vec<TransitionId> {
        if self.shut_down {
            return Vec::new();
        }
        self.clock = self.clock.max(now);
        let tasks = self.scheduler.take_frame_tasks();
        self.measure_frame = None;

        let mut started = Vec::new();
        for task in tasks {
            match task {
                Wakeup::MeasureEnds { .. } => match self.measurer.capture_ends(probe, &mut self.store) {
                    EndCapture::Idle => {}
                    EndCapture::Deferred { awaiting, .. } => {
                        self.measure_frame = Some(
                            self.scheduler
                                .request_frame(Wakeup::MeasureEnds { generation: awaiting }),
                        );
                    }
                    EndCapture::Measured { ready, .. } => {
                        for id in ready {
                            if self.start_playback(id, now) {
                                started.push(id);
                            }
                        }
                    }
                },
                // Fallbacks only travel through the timer queue.
                Wakeup::Fallback(_) => {}
            }
        }
        started
    }

    fn start_playback(&mut self, id: TransitionId, now: Duration) -> bool {
        let Some(Transition {
            card,
            start,
            end: Some(end),
            status: TransitionStatus::Animating,
            ..
        }) = self.store.get(id)
        else {
            return false;
        };
        let deadline = self.driver.play(id, card.id.clone(), *start, *end, now);
        let timer = self.scheduler.set_timeout(deadline, Wakeup::Fallback(id));
        self.fallback_timers.insert(id, timer);
        true
    }

    /// Advance the clock: fire due fallbacks, then finish completed glides.
    ///
    /// A clock that jumps past a fallback deadline (a stalled host) resolves
    /// that glide as timed out rather than finished.
    pub fn advance(&mut self, now: Duration) -> Vec<Resolution> {
        if self.shut_down {
            return Vec::new();
        }
        self.clock = self.clock.max(now);
        let mut resolved = Vec::new();
        for task in self.scheduler.take_due(now) {
            if let Wakeup::Fallback(id) = task {
                self.fallback_timers.remove(&id);
                if let Some(resolution) = self.driver.expire(id, now) {
                    self.apply(&resolution);
                    resolved.push(resolution);
                }
            }
        }
        for resolution in self.driver.tick(now) {
            self.apply(&resolution);
            resolved.push(resolution);
        }
        resolved
    }

    /// The host's completion signal for `id` arrived.
    pub fn notify_animation_finished(&mut self, id: TransitionId) -> Option<Resolution> {
        if self.shut_down {
            return None;
        }
        let resolution = self.driver.notify_finished(id)?;
        self.apply(&resolution);
        Some(resolution)
    }

    /// Cancel one transition wherever it is in its lifecycle.
    pub fn cancel_transition(&mut self, id: TransitionId) -> bool {
        match self.driver.cancel(id) {
            Some(resolution) => {
                self.apply(&resolution);
                true
            }
            None => self.store.cancel(id),
        }
    }

    fn apply(&mut self, resolution: &Resolution) {
        if let Some(timer) = self.fallback_timers.remove(&resolution.id) {
            self.scheduler.clear_timeout(timer);
        }
        match resolution.outcome {
            Outcome::Finished | Outcome::TimedOut => self.store.finish(resolution.id),
            Outcome::Cancelled => self.store.cancel(resolution.id),
        };
    }

    /// Tear everything down. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.scheduler.cancel_all();
        self.measure_frame = None;
        self.fallback_timers.clear();
        self.measurer.clear();
        let stopped = self.driver.cancel_all();
        for resolution in &stopped {
            self.store.cancel(resolution.id);
        }
        let pending = self.store.drain_active();
        self.shut_down = true;
        tracing::debug!(
            target: "flowboard.reconcile",
            stopped = stopped.len(),
            pending = pending.len(),
            "reconciler shut down"
        );
    }

    /// Whether the real card should be drawn.
    #[inline]
    pub fn is_card_visible(&self, card_id: &CardId) -> bool {
        self.store.is_visible(card_id)
    }

    /// Clones to draw at `now`, in creation order.
    pub fn clones(&mut self, now: Duration) -> Vec<CloneView> {
        self.clock = self.clock.max(now);
        let mut out = Vec::with_capacity(self.store.len());
        for t in self.store.all() {
            let frame = if t.status == TransitionStatus::Animating {
                self.driver.sample(t.id, now)
            } else {
                None
            };
            let to = self
                .current
                .as_deref()
                .and_then(|snapshot| snapshot.card(&t.card.id))
                .map(|card| card.col);
            out.push(CloneView {
                id: t.id,
                card: t.card.clone(),
                to,
                start: t.start,
                frame,
            });
        }
        out
    }

    /// Active transitions in creation order.
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> + '_ {
        self.store.all()
    }

    #[inline]
    pub fn store(&self) -> &TransitionStore {
        &self.store
    }

    /// The committed snapshot.
    #[inline]
    pub fn snapshot(&self) -> Option<&Arc<BoardSnapshot>> {
        self.current.as_ref()
    }

    /// Generation of the committed snapshot (0 before the first ingest).
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Earliest fallback deadline.
    #[inline]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduler.next_deadline()
    }

    /// Whether a frame callback is pending.
    #[inline]
    pub fn wants_frame(&self) -> bool {
        self.scheduler.has_frame_tasks() || !self.driver.is_empty()
    }

    /// Nothing in flight and nothing scheduled.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.store.is_empty() && self.scheduler.is_idle()
    }

    #[inline]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
