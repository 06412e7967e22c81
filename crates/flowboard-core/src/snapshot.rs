#![forbid(unsafe_code)]

//! Snapshot data model.
//!
//! A [`BoardSnapshot`] is one immutable point-in-time view of the simulation
//! board: ordered lanes, each holding an ordered list of cards. Snapshots are
//! never patched; the next poll supersedes them wholesale.
//!
//! With the `serde` feature the types deserialize directly from the simulation
//! server's JSON. Fields the engine does not use (positions, timings) are
//! ignored.

use std::fmt;

/// Stable card identity.
///
/// The server may send ids as strings or integers; both deserialize to the
/// same textual id, so `5` and `"5"` name the same card.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CardId(pub String);

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for CardId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl serde::de::Visitor<'_> for IdVisitor {
            type Value = CardId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or integer card id")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<CardId, E> {
                Ok(CardId::new(v))
            }

            fn visit_string<E: serde::de::Error>(self, v: String) -> Result<CardId, E> {
                Ok(CardId(v))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<CardId, E> {
                Ok(CardId(v.to_string()))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<CardId, E> {
                Ok(CardId(v.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

impl CardId {
    /// Create a card id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lane (column) index a card currently belongs to: its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ColumnId(pub u32);

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "col-{}", self.0)
    }
}

/// A card on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Card {
    /// Stable identity.
    pub id: CardId,
    /// Lane the card sits in.
    pub col: ColumnId,
    /// Sequential number assigned when the card entered the board.
    #[cfg_attr(feature = "serde", serde(default))]
    pub birth_id: Option<u64>,
    /// The tracked card whose cycle time the simulation measures.
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_red: bool,
}

impl Card {
    /// Create a plain card.
    pub fn new(id: impl Into<String>, col: u32) -> Self {
        Self {
            id: CardId::new(id),
            col: ColumnId(col),
            birth_id: None,
            is_red: false,
        }
    }

    /// Set the birth number (builder pattern).
    #[must_use]
    pub fn with_birth_id(mut self, birth_id: u64) -> Self {
        self.birth_id = Some(birth_id);
        self
    }

    /// Mark as the tracked red card (builder pattern).
    #[must_use]
    pub fn red(mut self) -> Self {
        self.is_red = true;
        self
    }

    /// Text shown on the card: `Karte <birth_id>` when numbered, else the id.
    pub fn label(&self) -> String {
        match self.birth_id {
            Some(n) => format!("Karte {n}"),
            None => self.id.to_string(),
        }
    }
}

/// One lane of the board.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lane {
    /// Lane identifier, conventionally `lane-<index>`.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Cards in display order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub cards: Vec<Card>,
    /// Highest concurrent card count observed in the current round.
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_wip_in_round: Option<u32>,
    /// Work-in-progress limit the server applies to this lane.
    #[cfg_attr(feature = "serde", serde(default))]
    pub wip_limit: Option<u32>,
}

impl Lane {
    /// Create an empty lane.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            cards: Vec::new(),
            max_wip_in_round: None,
            wip_limit: None,
        }
    }

    /// Append a card (builder pattern).
    #[must_use]
    pub fn with_card(mut self, card: Card) -> Self {
        self.cards.push(card);
        self
    }

    /// Column index encoded in a `lane-<n>` id.
    pub fn column(&self) -> Option<ColumnId> {
        self.id
            .strip_prefix("lane-")
            .and_then(|n| n.parse().ok())
            .map(ColumnId)
    }
}

/// A point-in-time view of the whole board.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoardSnapshot {
    /// Whether the simulation loop is running, when the server reports it.
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_running: Option<bool>,
    /// Lanes in display order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub lanes: Vec<Lane>,
}

impl BoardSnapshot {
    /// Create a snapshot from lanes.
    pub fn new(lanes: Vec<Lane>) -> Self {
        Self {
            is_running: None,
            lanes,
        }
    }

    /// Iterate over every card in lane order, then card order.
    pub fn cards(&self) -> impl Iterator<Item = &Card> + '_ {
        self.lanes.iter().flat_map(|lane| lane.cards.iter())
    }

    /// Find a card by id.
    pub fn card(&self, id: &CardId) -> Option<&Card> {
        self.cards().find(|c| &c.id == id)
    }

    /// Total card count.
    pub fn card_count(&self) -> usize {
        self.lanes.iter().map(|l| l.cards.len()).sum()
    }

    /// Whether the snapshot contains no lanes.
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

/// One row of the metrics table, recorded per simulation round.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsEntry {
    pub round: u32,
    pub wip_limit: u32,
    pub red_card_cycle_time: String,
    pub flow_efficiency: String,
    pub in_progress: u32,
    pub done: u32,
    pub throughput: String,
}

/// The metrics table as reported by the server, oldest round first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub entries: Vec<MetricsEntry>,
}

impl MetricsSnapshot {
    /// Entries newest first, the order the table is displayed in.
    pub fn newest_first(&self) -> impl Iterator<Item = &MetricsEntry> + '_ {
        self.entries.iter().rev()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
