#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use flowboard::api::{SimulationApi, StartOutcome};
use flowboard::error::{ClientError, Result};
use flowboard::wire::ConfigRequest;
use flowboard_core::{BoardSnapshot, Card, Lane, MetricsEntry, MetricsSnapshot};

/// In-memory server double. Boards are served in order; the last one repeats.
#[derive(Default)]
pub struct FakeServer {
    pub boards: Mutex<VecDeque<BoardSnapshot>>,
    pub metrics: Mutex<MetricsSnapshot>,
    pub fail_config: bool,
    pub already_running: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeServer {
    pub fn with_boards(boards: Vec<BoardSnapshot>) -> Self {
        Self {
            boards: Mutex::new(boards.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl SimulationApi for FakeServer {
    fn fetch_board(&self) -> Result<BoardSnapshot> {
        self.record("board");
        let mut boards = self.boards.lock().unwrap();
        let board = if boards.len() > 1 {
            boards.pop_front()
        } else {
            boards.front().cloned()
        };
        board.ok_or_else(|| ClientError::Rejected {
            action: "board",
            status: 503,
            detail: "no board".to_string(),
        })
    }

    fn fetch_metrics(&self) -> Result<MetricsSnapshot> {
        self.record("metrics");
        Ok(self.metrics.lock().unwrap().clone())
    }

    fn set_config(&self, request: &ConfigRequest) -> Result<()> {
        self.record(format!("config wip={} speed={}", request.wip_limit, request.speed));
        if self.fail_config {
            return Err(ClientError::Rejected {
                action: "set-config",
                status: 422,
                detail: "invalid speed".to_string(),
            });
        }
        Ok(())
    }

    fn start(&self) -> Result<StartOutcome> {
        self.record("start");
        if self.already_running {
            Ok(StartOutcome::AlreadyRunning)
        } else {
            Ok(StartOutcome::Started)
        }
    }

    fn stop(&self) -> Result<()> {
        self.record("stop");
        Ok(())
    }

    fn clear_metrics(&self) -> Result<()> {
        self.record("clear");
        self.metrics.lock().unwrap().entries.clear();
        Ok(())
    }
}

/// Three lanes `L0..L2` with card `c1` (Karte 1) in `lane`.
pub fn board_with_card_in(lane: u32) -> BoardSnapshot {
    let mut lanes: Vec<Lane> = (0..3)
        .map(|i| Lane::new(format!("lane-{i}"), format!("L{i}")))
        .collect();
    lanes[lane as usize]
        .cards
        .push(Card::new("c1", lane).with_birth_id(1));
    BoardSnapshot::new(lanes)
}

pub fn metrics(rounds: u32) -> MetricsSnapshot {
    MetricsSnapshot {
        entries: (1..=rounds)
            .map(|round| MetricsEntry {
                round,
                wip_limit: 5,
                red_card_cycle_time: "4.0".to_string(),
                flow_efficiency: "50%".to_string(),
                in_progress: 2,
                done: round,
                throughput: "1.0".to_string(),
            })
            .collect(),
    }
}
