#![no_main]

use std::collections::HashMap;

use arbitrary::Arbitrary;
use flowboard_core::{BoardSnapshot, Card, CardId, Lane, LayoutProbe, Rect, Reconciler, TransitionId};
use libfuzzer_sys::fuzz_target;
use web_time::Duration;

const LANES: u8 = 4;

#[derive(Debug, Arbitrary)]
enum Op {
    /// Card `i` goes to lane `placement[i] % LANES`, or is absent when 0xFF.
    Ingest(Vec<u8>),
    /// Frame boundary; `stale` keeps the layout one generation behind.
    Frame { stale: bool },
    Advance(u16),
    Notify(u8),
    Shutdown,
}

struct Layout {
    generation: u64,
    rects: HashMap<CardId, Rect>,
}

impl Layout {
    fn of(snapshot: Option<&BoardSnapshot>, generation: u64) -> Self {
        let mut rects = HashMap::new();
        for (li, lane) in snapshot.iter().flat_map(|s| s.lanes.iter()).enumerate() {
            for (ci, card) in lane.cards.iter().enumerate() {
                rects.insert(
                    card.id.clone(),
                    Rect::new(li as f64 * 126.0, ci as f64 * 34.0, 90.0, 30.0),
                );
            }
        }
        Self { generation, rects }
    }
}

impl LayoutProbe for Layout {
    fn bounding_rect(&self, card: &CardId) -> Option<Rect> {
        self.rects.get(card).copied()
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

fn board(placement: &[u8]) -> BoardSnapshot {
    let mut lanes: Vec<Lane> = (0..LANES)
        .map(|i| Lane::new(format!("lane-{i}"), format!("Lane {i}")))
        .collect();
    for (i, slot) in placement.iter().take(16).enumerate() {
        if *slot != 0xFF {
            let col = u32::from(slot % LANES);
            lanes[col as usize]
                .cards
                .push(Card::new(format!("c{i}"), col));
        }
    }
    BoardSnapshot::new(lanes)
}

fuzz_target!(|ops: Vec<Op>| {
    let mut reconciler = Reconciler::default();
    let mut layout = Layout::of(None, 0);
    let mut now = Duration::ZERO;

    for op in ops.into_iter().take(256) {
        match op {
            Op::Ingest(placement) => {
                let report = reconciler.ingest(board(&placement), &layout);
                layout = Layout::of(reconciler.snapshot().map(|s| &**s), report.generation);
            }
            Op::Frame { stale } => {
                let probe = Layout::of(
                    reconciler.snapshot().map(|s| &**s),
                    if stale { layout.generation.saturating_sub(1) } else { layout.generation },
                );
                reconciler.on_frame(now, &probe);
            }
            Op::Advance(ms) => {
                now += Duration::from_millis(u64::from(ms));
                reconciler.advance(now);
            }
            Op::Notify(n) => {
                reconciler.notify_animation_finished(TransitionId(u64::from(n)));
            }
            Op::Shutdown => reconciler.shutdown(),
        }

        // One active transition per card, and hidden exactly while active.
        let mut seen = HashMap::new();
        for t in reconciler.transitions() {
            assert!(seen.insert(t.card.id.clone(), t.id).is_none());
            assert!(!reconciler.is_card_visible(&t.card.id));
        }
        if reconciler.is_shut_down() {
            assert!(reconciler.is_idle());
        }
    }

    reconciler.shutdown();
    assert!(reconciler.is_idle());
    assert_eq!(reconciler.transitions().count(), 0);
});
