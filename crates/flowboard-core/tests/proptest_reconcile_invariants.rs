#![forbid(unsafe_code)]

//! Property tests for the Reconciler.
//!
//! Random interleavings of snapshot arrivals, frame boundaries, clock advances
//! and host completion signals must preserve:
//! - At most one active transition per card.
//! - A card is hidden exactly while it has an active transition.
//! - Every transition is resolved exactly once.
//! - Once input stops, the reconciler drains to idle.
//! - After shutdown nothing is active and nothing is scheduled.

use std::collections::{HashMap, HashSet};

use flowboard_core::{
    BoardSnapshot, Card, CardId, Lane, LayoutProbe, Rect, Reconciler, TransitionId,
};
use proptest::prelude::*;
use web_time::Duration;

const LANES: u32 = 4;
const CARDS: usize = 6;

struct GridLayout {
    generation: u64,
    rects: HashMap<CardId, Rect>,
}

impl GridLayout {
    fn of(snapshot: Option<&BoardSnapshot>, generation: u64) -> Self {
        let mut rects = HashMap::new();
        if let Some(snapshot) = snapshot {
            for (li, lane) in snapshot.lanes.iter().enumerate() {
                for (ci, card) in lane.cards.iter().enumerate() {
                    rects.insert(
                        card.id.clone(),
                        Rect::new(li as f64 * 126.0, 70.0 + ci as f64 * 34.0, 90.0, 30.0),
                    );
                }
            }
        }
        Self { generation, rects }
    }
}

impl LayoutProbe for GridLayout {
    fn bounding_rect(&self, card: &CardId) -> Option<Rect> {
        self.rects.get(card).copied()
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone)]
enum Op {
    Ingest(Vec<Option<u32>>),
    Frame,
    Advance(u64),
    Notify(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => prop::collection::vec(prop::option::weighted(0.9, 0..LANES), CARDS..=CARDS)
            .prop_map(Op::Ingest),
        3 => Just(Op::Frame),
        2 => (0u64..400).prop_map(Op::Advance),
        1 => (0usize..8).prop_map(Op::Notify),
    ]
}

fn board(placement: &[Option<u32>]) -> BoardSnapshot {
    let mut lanes: Vec<Lane> = (0..LANES)
        .map(|i| Lane::new(format!("lane-{i}"), format!("Lane {i}")))
        .collect();
    for (i, col) in placement.iter().enumerate() {
        if let Some(col) = col {
            lanes[*col as usize].cards.push(Card::new(format!("c{i}"), *col));
        }
    }
    BoardSnapshot::new(lanes)
}

fn check_visibility(r: &Reconciler) -> Result<(), TestCaseError> {
    let active: Vec<&CardId> = r.transitions().map(|t| t.card_id()).collect();
    let unique: HashSet<&CardId> = active.iter().copied().collect();
    prop_assert_eq!(active.len(), unique.len(), "one active transition per card");
    for i in 0..CARDS {
        let id = CardId::new(format!("c{i}"));
        prop_assert_eq!(r.is_card_visible(&id), !unique.contains(&id));
    }
    Ok(())
}

struct Harness {
    r: Reconciler,
    now: Duration,
    /// Generation the presentation layer has laid out.
    laid_out: u64,
    created: Vec<TransitionId>,
}

impl Harness {
    fn new() -> Self {
        Self {
            r: Reconciler::default(),
            now: Duration::ZERO,
            laid_out: 0,
            created: Vec::new(),
        }
    }

    fn layout(&self) -> GridLayout {
        GridLayout::of(self.r.snapshot().map(|s| s.as_ref()), self.laid_out)
    }

    fn apply(&mut self, op: &Op) {
        match op {
            Op::Ingest(placement) => {
                let before = self.layout();
                let report = self.r.ingest(board(placement), &before);
                self.created.extend(report.created);
            }
            Op::Frame => {
                // Layout catches up before the frame callback runs.
                self.laid_out = self.r.generation();
                let layout = self.layout();
                self.r.on_frame(self.now, &layout);
            }
            Op::Advance(ms) => {
                self.now += Duration::from_millis(*ms);
                self.r.advance(self.now);
            }
            Op::Notify(i) => {
                if let Some(id) = self.created.get(*i).copied() {
                    self.r.notify_animation_finished(id);
                }
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn visibility_tracks_active_transitions(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut h = Harness::new();
        for op in &ops {
            h.apply(op);
            check_visibility(&h.r)?;
        }
    }

    #[test]
    fn every_transition_resolves_once_and_drains(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut h = Harness::new();
        for op in &ops {
            h.apply(op);
        }
        h.apply(&Op::Frame);
        h.apply(&Op::Advance(1_000));
        prop_assert!(h.r.is_idle());

        let resolved: Vec<TransitionId> = h.r.store().history().map(|r| r.id).collect();
        let unique: HashSet<TransitionId> = resolved.iter().copied().collect();
        prop_assert_eq!(resolved.len(), unique.len(), "resolved twice");
        for id in h.created.iter().rev().take(32) {
            prop_assert!(h.r.store().resolution_of(*id).is_some());
        }
    }

    #[test]
    fn shutdown_leaves_nothing_behind(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut h = Harness::new();
        for op in &ops {
            h.apply(op);
        }
        h.r.shutdown();
        prop_assert!(h.r.is_idle());
        prop_assert!(!h.r.wants_frame());
        for i in 0..CARDS {
            let id = CardId::new(format!("c{i}"));
            prop_assert!(h.r.is_card_visible(&id));
        }
        for op in &ops {
            h.apply(op);
        }
        prop_assert!(h.r.is_idle());
    }
}
