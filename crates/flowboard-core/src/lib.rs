#![forbid(unsafe_code)]

//! Core: the animated reconciliation engine behind FlowBoard.
//!
//! # Role in FlowBoard
//! `flowboard-core` turns a stream of board snapshots into short-lived glide
//! transitions for every card that changed lane. It is deliberately
//! host-driven: it never sleeps, spawns threads or performs I/O. The host
//! pushes snapshots, reports frame boundaries and advances the monotonic clock.
//!
//! # Primary responsibilities
//! - **Diff Engine** ([`diff`]): pure `(previous, next) -> relocations`.
//! - **Transition Store** ([`transition`]): the only mutable record of
//!   in-flight glides; the presentation layer consults it to hide real cards.
//! - **Two-Phase Measurer** ([`measure`]): start rectangles before commit,
//!   end rectangles on the frame after commit.
//! - **Animation Driver** ([`driver`]): eased interpolation with a
//!   first-wins completion guard and a fallback timeout.
//! - **Reconciler** ([`reconcile`]): wires the above to a deterministic
//!   [`schedule::Scheduler`].
//!
//! # How it fits in the system
//! The `flowboard` client crate owns the network polling, the board layout and
//! the text presentation. It feeds snapshots into [`reconcile::Reconciler`] and
//! renders whatever the reconciler reports as visible cards and clones.

pub mod animation;
pub mod diff;
pub mod driver;
pub mod geometry;
pub mod measure;
pub mod reconcile;
pub mod schedule;
pub mod snapshot;
pub mod transition;

pub use diff::{Relocation, relocations};
pub use driver::{AnimationDriver, GlideConfig, GlideFrame, Outcome, Resolution};
pub use geometry::Rect;
pub use measure::{LayoutProbe, TwoPhaseMeasurer};
pub use reconcile::{CloneView, IngestReport, Reconciler};
pub use snapshot::{BoardSnapshot, Card, CardId, ColumnId, Lane, MetricsEntry, MetricsSnapshot};
pub use transition::{Transition, TransitionId, TransitionStatus, TransitionStore};
