#![forbid(unsafe_code)]

//! Diff Engine: detect lane changes between two consecutive snapshots.
//!
//! [`relocations`] is a pure function. It builds a lookup of the previous
//! snapshot's cards and walks the next snapshot in display order, emitting one
//! [`Relocation`] per card whose lane changed.
//!
//! # Invariants
//!
//! 1. No previous snapshot means nothing to animate: the result is empty.
//! 2. Cards that appear or disappear never produce relocations.
//! 3. Output order is lane order, then card order, of `next`: stable for a
//!    given pair of snapshots.
//! 4. At most one relocation per card id, even if `next` repeats an id.

use ahash::{AHashMap, AHashSet};

use crate::snapshot::{BoardSnapshot, Card, CardId, ColumnId};

/// A card that changed lane between two consecutive snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// The relocated card.
    pub card_id: CardId,
    /// Lane in the previous snapshot.
    pub from: ColumnId,
    /// Lane in the next snapshot.
    pub to: ColumnId,
    /// The card as it was in the previous snapshot.
    pub card: Card,
}

/// Build a `card id → card` lookup for a snapshot.
///
/// Duplicate ids violate the snapshot contract; the first occurrence wins and
/// the duplicate is logged.
pub fn card_index(snapshot: &BoardSnapshot) -> AHashMap<&CardId, &Card> {
    let mut index = AHashMap::with_capacity(snapshot.card_count());
    for card in snapshot.cards() {
        if index.contains_key(&card.id) {
            tracing::warn!(
                target: "flowboard.diff",
                card_id = %card.id,
                "duplicate card id in snapshot; keeping first occurrence"
            );
            continue;
        }
        index.insert(&card.id, card);
    }
    index
}

/// Compute the relocations from `previous` to `next`.
pub fn relocations(previous: Option<&BoardSnapshot>, next: &BoardSnapshot) -> Vec<Relocation> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    let before = card_index(previous);
    let mut seen = AHashSet::with_capacity(next.card_count());
    let mut events = Vec::new();

    for card in next.cards() {
        if !seen.insert(&card.id) {
            continue;
        }
        let Some(old) = before.get(&card.id) else {
            continue;
        };
        if old.col != card.col {
            events.push(Relocation {
                card_id: card.id.clone(),
                from: old.col,
                to: card.col,
                card: (*old).clone(),
            });
        }
    }

    if !events.is_empty() {
        tracing::debug!(
            target: "flowboard.diff",
            count = events.len(),
            "relocations detected"
        );
    }
    events
}
