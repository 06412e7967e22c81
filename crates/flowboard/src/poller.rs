#![forbid(unsafe_code)]

//! Periodic snapshot polling.
//!
//! One cycle fetches the board and then the metrics table. Each result is
//! delivered as its own message, success or failure, so the model decides
//! what a failed fetch means. The next cycle starts `interval` after the
//! previous one finished; there is never more than one request in flight.

use std::sync::Arc;
use std::sync::mpsc;

use crate::cancellation::CancellationToken;
use flowboard_core::{BoardSnapshot, MetricsSnapshot};
use web_time::Duration;

use crate::api::SimulationApi;
use crate::error::Result;
use crate::subscription::{SubId, Subscription};

const POLLER_ID: SubId = 0x706f_6c6c;

/// Result of one fetch.
#[derive(Debug)]
pub enum PollEvent {
    Board(Result<BoardSnapshot>),
    Metrics(Result<MetricsSnapshot>),
}

/// Subscription that polls the server until cancelled.
pub struct Poller {
    api: Arc<dyn SimulationApi>,
    interval: Duration,
}

impl Poller {
    pub fn new(api: Arc<dyn SimulationApi>, interval: Duration) -> Self {
        Self { api, interval }
    }
}

impl<M> Subscription<M> for Poller
where
    M: From<PollEvent> + Send + 'static,
{
    fn id(&self) -> SubId {
        POLLER_ID
    }

    fn run(&self, sender: mpsc::Sender<M>, stop: CancellationToken) {
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;

            let board = self.api.fetch_board();
            if let Err(error) = &board {
                tracing::warn!(target: "flowboard.poll", cycle, error = %error, "board fetch failed");
            }
            if stop.is_cancelled() || sender.send(PollEvent::Board(board).into()).is_err() {
                break;
            }

            let metrics = self.api.fetch_metrics();
            if let Err(error) = &metrics {
                tracing::warn!(target: "flowboard.poll", cycle, error = %error, "metrics fetch failed");
            }
            if stop.is_cancelled() || sender.send(PollEvent::Metrics(metrics).into()).is_err() {
                break;
            }

            if stop.wait_timeout(self.interval) {
                break;
            }
        }
        tracing::debug!(target: "flowboard.poll", cycles = cycle, "poller stopped");
    }
}
