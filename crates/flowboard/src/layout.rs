#![forbid(unsafe_code)]

//! Board geometry.
//!
//! The text renderer has no layout engine to ask, so the client computes the
//! pixel boxes a browser would give the board: fixed-width lanes laid out
//! left to right, fixed-size cards stacked under each lane header. The
//! reconciler reads card rectangles through [`LayoutProbe`]; they only have to
//! be consistent between two layouts for glides to land where the card is
//! drawn.

use ahash::AHashMap;
use flowboard_core::{BoardSnapshot, CardId, LayoutProbe, Rect};

/// Padding around the board.
pub const BOARD_PADDING: f64 = 8.0;
/// Lane width.
pub const LANE_WIDTH: f64 = 122.0;
/// Horizontal gap between lanes.
pub const LANE_GAP: f64 = 4.0;
/// Height reserved for the lane header.
pub const HEADER_HEIGHT: f64 = 70.0;
/// Minimum lane height.
pub const LANE_MIN_HEIGHT: f64 = 500.0;
/// Card width.
pub const CARD_WIDTH: f64 = 90.0;
/// Card height.
pub const CARD_HEIGHT: f64 = 30.0;
/// Vertical gap between cards.
pub const CARD_GAP: f64 = 4.0;

/// A laid-out lane.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneBox {
    pub id: String,
    pub title: String,
    pub rect: Rect,
}

/// Rectangles for one committed snapshot.
#[derive(Debug, Clone, Default)]
pub struct BoardLayout {
    generation: u64,
    lanes: Vec<LaneBox>,
    cards: AHashMap<CardId, Rect>,
}

impl BoardLayout {
    /// Layout with no lanes, reflecting generation 0.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Lay out `snapshot`, tagging the result with `generation`.
    #[must_use]
    pub fn compute(snapshot: &BoardSnapshot, generation: u64) -> Self {
        let tallest = snapshot
            .lanes
            .iter()
            .map(|lane| lane.cards.len())
            .max()
            .unwrap_or(0);
        let height = lane_height(tallest);

        let mut lanes = Vec::with_capacity(snapshot.lanes.len());
        let mut cards = AHashMap::with_capacity(snapshot.card_count());
        for (index, lane) in snapshot.lanes.iter().enumerate() {
            let x = BOARD_PADDING + index as f64 * (LANE_WIDTH + LANE_GAP);
            let rect = Rect::new(x, BOARD_PADDING, LANE_WIDTH, height);
            let card_x = x + (LANE_WIDTH - CARD_WIDTH) / 2.0;
            for (row, card) in lane.cards.iter().enumerate() {
                let y = BOARD_PADDING + HEADER_HEIGHT + row as f64 * (CARD_HEIGHT + CARD_GAP);
                cards.insert(card.id.clone(), Rect::new(card_x, y, CARD_WIDTH, CARD_HEIGHT));
            }
            lanes.push(LaneBox {
                id: lane.id.clone(),
                title: lane.title.clone(),
                rect,
            });
        }

        Self {
            generation,
            lanes,
            cards,
        }
    }

    pub fn lanes(&self) -> &[LaneBox] {
        &self.lanes
    }

    pub fn card_rect(&self, id: &CardId) -> Option<Rect> {
        self.cards.get(id).copied()
    }

    /// Index of the lane whose center is nearest to `x`.
    #[must_use]
    pub fn lane_index_at(&self, x: f64) -> Option<usize> {
        self.lanes
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = (a.rect.x + a.rect.width / 2.0 - x).abs();
                let db = (b.rect.x + b.rect.width / 2.0 - x).abs();
                da.total_cmp(&db)
            })
            .map(|(index, _)| index)
    }

    /// Title of the lane nearest to `x`.
    pub fn lane_title_at(&self, x: f64) -> Option<&str> {
        self.lane_index_at(x).map(|i| self.lanes[i].title.as_str())
    }
}

impl LayoutProbe for BoardLayout {
    fn bounding_rect(&self, card: &CardId) -> Option<Rect> {
        self.card_rect(card)
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

fn lane_height(cards: usize) -> f64 {
    let stacked = HEADER_HEIGHT + cards as f64 * (CARD_HEIGHT + CARD_GAP);
    stacked.max(LANE_MIN_HEIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowboard_core::{Card, Lane};

    fn board() -> BoardSnapshot {
        BoardSnapshot::new(vec![
            Lane::new("lane-0", "Backlog")
                .with_card(Card::new("a", 0))
                .with_card(Card::new("b", 0)),
            Lane::new("lane-1", "Analysis").with_card(Card::new("c", 1)),
        ])
    }

    #[test]
    fn cards_are_centered_and_stacked() {
        let layout = BoardLayout::compute(&board(), 4);
        assert_eq!(layout.generation(), 4);
        assert_eq!(
            layout.card_rect(&CardId::new("a")),
            Some(Rect::new(24.0, 78.0, 90.0, 30.0))
        );
        assert_eq!(
            layout.card_rect(&CardId::new("b")),
            Some(Rect::new(24.0, 112.0, 90.0, 30.0))
        );
        assert_eq!(
            layout.card_rect(&CardId::new("c")),
            Some(Rect::new(150.0, 78.0, 90.0, 30.0))
        );
        assert_eq!(layout.card_rect(&CardId::new("zz")), None);
    }

    #[test]
    fn lanes_share_the_minimum_height() {
        let layout = BoardLayout::compute(&board(), 1);
        assert_eq!(layout.lanes().len(), 2);
        assert!(layout.lanes().iter().all(|l| l.rect.height == LANE_MIN_HEIGHT));
        assert_eq!(layout.lanes()[1].rect.x, 134.0);
    }

    #[test]
    fn nearest_lane_lookup() {
        let layout = BoardLayout::compute(&board(), 1);
        assert_eq!(layout.lane_title_at(24.0), Some("Backlog"));
        assert_eq!(layout.lane_title_at(190.0), Some("Analysis"));
        assert_eq!(layout.lane_title_at(9_000.0), Some("Analysis"));
        assert_eq!(BoardLayout::empty().lane_index_at(0.0), None);
    }
}
