#![forbid(unsafe_code)]

//! Text presentation of the board, in-flight glides and the metrics table.
//!
//! Rendering is a pure function of a [`View`]: nothing here touches the
//! reconciler or the network. A card with an active transition is drawn as
//! an empty slot so its row keeps its place while the glide plays; the glide
//! itself is listed below the board with its progress.

use std::fmt::{self, Write};

use flowboard_core::{BoardSnapshot, CardId, CloneView, Lane, MetricsSnapshot};

use crate::config::{COMPLEXITY_LANES, SimulationSettings};
use crate::layout::BoardLayout;

/// Width of one lane column, separator included.
pub const COLUMN_WIDTH: usize = 14;
const BAR_WIDTH: usize = 20;

/// Everything one frame shows.
pub struct View<'a> {
    pub board: Option<&'a BoardSnapshot>,
    pub layout: &'a BoardLayout,
    pub is_card_visible: &'a dyn Fn(&CardId) -> bool,
    pub clones: &'a [CloneView],
    pub metrics: &'a MetricsSnapshot,
    pub running: bool,
    pub settings: &'a SimulationSettings,
    pub status: Option<&'a str>,
}

/// Render `view` into `out`.
pub fn render(out: &mut impl Write, view: &View<'_>) -> fmt::Result {
    header(out, view)?;
    writeln!(out)?;
    match view.board {
        Some(board) if !board.is_empty() => {
            lanes(out, board, view.settings, view.is_card_visible)?;
            glides(out, board, view.layout, view.clones)?;
        }
        _ => writeln!(out, "No board data")?,
    }
    writeln!(out)?;
    metrics(out, view.metrics)?;
    if let Some(status) = view.status {
        writeln!(out)?;
        writeln!(out, "{status}")?;
    }
    Ok(())
}

/// Render into a fresh string.
#[must_use]
pub fn render_to_string(view: &View<'_>) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = render(&mut out, view);
    out
}

fn header(out: &mut impl Write, view: &View<'_>) -> fmt::Result {
    let state = if view.running { "running" } else { "stopped" };
    writeln!(
        out,
        "FlowBoard [{state}]  WIP limit {}  speed {}s/step",
        view.settings.wip_limit, view.settings.speed
    )
}

fn lanes(
    out: &mut impl Write,
    board: &BoardSnapshot,
    settings: &SimulationSettings,
    visible: &dyn Fn(&CardId) -> bool,
) -> fmt::Result {
    let settings_row = |lane: &Lane| -> String {
        match lane.max_wip_in_round {
            Some(n) => format!("max WIP {n}"),
            None => String::new(),
        }
    };
    let complexity_row = |lane: &Lane| -> String {
        match lane.column() {
            Some(col) if COMPLEXITY_LANES.contains(&col.0) => {
                format!("complexity {}", settings.complexity_for(col.0))
            }
            _ => String::new(),
        }
    };

    row(out, board.lanes.iter().map(|l| l.title.clone()))?;
    row(out, board.lanes.iter().map(settings_row))?;
    row(out, board.lanes.iter().map(complexity_row))?;
    row(
        out,
        board.lanes.iter().map(|_| "-".repeat(COLUMN_WIDTH - 1)),
    )?;

    let tallest = board.lanes.iter().map(|l| l.cards.len()).max().unwrap_or(0);
    for index in 0..tallest {
        row(
            out,
            board.lanes.iter().map(|lane| match lane.cards.get(index) {
                Some(card) if visible(&card.id) => {
                    let mark = if card.is_red { "!" } else { "" };
                    format!("{mark}{}", card.label())
                }
                Some(_) => "  ".to_string(),
                None => String::new(),
            }),
        )?;
    }
    Ok(())
}

fn row(out: &mut impl Write, cells: impl Iterator<Item = String>) -> fmt::Result {
    let mut line = String::new();
    for cell in cells {
        let cell = truncate(&cell, COLUMN_WIDTH - 1);
        let _ = write!(line, "{cell:<width$} ", width = COLUMN_WIDTH - 1);
    }
    writeln!(out, "{}", line.trim_end())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut short: String = text.chars().take(width.saturating_sub(1)).collect();
    short.push('~');
    short
}

fn glides(out: &mut impl Write, board: &BoardSnapshot, layout: &BoardLayout, clones: &[CloneView]) -> fmt::Result {
    if clones.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    for clone in clones {
        let from = layout.lane_title_at(clone.start.x).unwrap_or("?");
        let to = clone
            .to
            .and_then(|col| board.lanes.iter().find(|lane| lane.column() == Some(col)))
            .map_or("?", |lane| lane.title.as_str());
        match clone.frame {
            Some(frame) => {
                let filled = ((frame.progress.clamp(0.0, 1.0) * BAR_WIDTH as f32).round()) as usize;
                writeln!(
                    out,
                    "  {} {from} -> {to} [{}{}] {:>3}%",
                    clone.card.label(),
                    "#".repeat(filled),
                    ".".repeat(BAR_WIDTH - filled),
                    (frame.progress * 100.0).round() as u32
                )?;
            }
            None => writeln!(out, "  {} {from} -> {to} (measuring)", clone.card.label())?,
        }
    }
    Ok(())
}

fn metrics(out: &mut impl Write, metrics: &MetricsSnapshot) -> fmt::Result {
    writeln!(out, "Metrics")?;
    if metrics.is_empty() {
        return writeln!(out, "(no metrics yet)");
    }
    writeln!(
        out,
        "{:>5} {:>4} {:>10} {:>10} {:>11} {:>5} {:>10}",
        "Round", "WIP", "Red cycle", "Flow eff.", "In progress", "Done", "Throughput"
    )?;
    for entry in metrics.newest_first() {
        writeln!(
            out,
            "{:>5} {:>4} {:>10} {:>10} {:>11} {:>5} {:>10}",
            entry.round,
            entry.wip_limit,
            entry.red_card_cycle_time,
            entry.flow_efficiency,
            entry.in_progress,
            entry.done,
            entry.throughput
        )?;
    }
    Ok(())
}
