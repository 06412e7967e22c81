#![forbid(unsafe_code)]

//! Simulation server access.
//!
//! [`SimulationApi`] is the seam between the client and the network: the
//! poller and the control actions only ever see the trait, and tests swap in
//! an in-memory fake. [`HttpApi`] is the production implementation on a
//! blocking `reqwest` client.
//!
//! # Failure Modes
//!
//! - Transport errors surface as [`ClientError::Http`].
//! - Non-2xx responses surface as [`ClientError::Rejected`] with the server's
//!   `detail` text.
//! - Malformed bodies surface as [`ClientError::Json`].
//!
//! None of these is retried here; the poller simply tries again next cycle.

use flowboard_core::{BoardSnapshot, MetricsSnapshot};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use web_time::Duration;

use crate::error::{ClientError, Result};
use crate::wire::{self, ActionResponse, ConfigRequest, DashboardResponse};

/// Header that suppresses tunnel interstitial pages in front of the server.
pub const SKIP_BROWSER_WARNING: (&str, &str) = ("ngrok-skip-browser-warning", "true");

/// How a start request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// The server was already running a simulation.
    AlreadyRunning,
}

/// Operations the client performs against the simulation server.
pub trait SimulationApi: Send + Sync {
    /// `GET /simulation/status`.
    fn fetch_board(&self) -> Result<BoardSnapshot>;

    /// `GET /dashboard/data`.
    fn fetch_metrics(&self) -> Result<MetricsSnapshot>;

    /// `POST /simulation/config`.
    fn set_config(&self, request: &ConfigRequest) -> Result<()>;

    /// `POST /simulation/start`.
    fn start(&self) -> Result<StartOutcome>;

    /// `POST /simulation/stop`.
    fn stop(&self) -> Result<()>;

    /// `POST /dashboard/clear`.
    fn clear_metrics(&self) -> Result<()>;
}

/// Push `request` and start the simulation.
///
/// A failed set-config aborts the start; the server is never asked to run
/// with stale parameters.
pub fn start_with_config(api: &dyn SimulationApi, request: &ConfigRequest) -> Result<StartOutcome> {
    if let Err(error) = api.set_config(request) {
        tracing::warn!(
            target: "flowboard.api",
            error = %error,
            "set-config failed; start aborted"
        );
        return Err(error);
    }
    api.start()
}

/// [`SimulationApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    /// Build a client for the server rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(2)))
            .timeout(timeout)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get<T: DeserializeOwned>(&self, action: &'static str, path: &str) -> Result<T> {
        let request = self.client.get(self.url(path));
        Self::send(action, request)
    }

    fn post<T: DeserializeOwned>(&self, action: &'static str, path: &str) -> Result<T> {
        let request = self.client.post(self.url(path));
        Self::send(action, request)
    }

    fn send<T: DeserializeOwned>(action: &'static str, request: RequestBuilder) -> Result<T> {
        let response = request
            .header(SKIP_BROWSER_WARNING.0, SKIP_BROWSER_WARNING.1)
            .send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            let detail = wire::error_detail(&body);
            tracing::debug!(
                target: "flowboard.api",
                action,
                status = status.as_u16(),
                detail = %detail,
                "request rejected"
            );
            return Err(ClientError::Rejected {
                action,
                status: status.as_u16(),
                detail,
            });
        }
        tracing::trace!(target: "flowboard.api", action, bytes = body.len(), "response received");
        Ok(serde_json::from_str(&body)?)
    }
}

impl SimulationApi for HttpApi {
    fn fetch_board(&self) -> Result<BoardSnapshot> {
        self.get("board", "/simulation/status")
    }

    fn fetch_metrics(&self) -> Result<MetricsSnapshot> {
        let response: DashboardResponse = self.get("metrics", "/dashboard/data")?;
        Ok(response.into())
    }

    fn set_config(&self, request: &ConfigRequest) -> Result<()> {
        let http = self.client.post(self.url("/simulation/config")).json(request);
        let response: ActionResponse = Self::send("set-config", http)?;
        tracing::info!(
            target: "flowboard.api",
            wip_limit = request.wip_limit,
            speed = request.speed,
            message = %response.message,
            "simulation config updated"
        );
        Ok(())
    }

    fn start(&self) -> Result<StartOutcome> {
        match self.post::<ActionResponse>("start", "/simulation/start") {
            Ok(_) => {
                tracing::info!(target: "flowboard.api", "simulation started");
                Ok(StartOutcome::Started)
            }
            Err(ClientError::Rejected { status: 400, detail, .. }) if detail == wire::ALREADY_RUNNING => {
                tracing::info!(target: "flowboard.api", "simulation already running");
                Ok(StartOutcome::AlreadyRunning)
            }
            Err(e) => Err(e),
        }
    }

    fn stop(&self) -> Result<()> {
        self.post::<ActionResponse>("stop", "/simulation/stop")?;
        tracing::info!(target: "flowboard.api", "simulation stopped");
        Ok(())
    }

    fn clear_metrics(&self) -> Result<()> {
        self.post::<ActionResponse>("clear", "/dashboard/clear")?;
        tracing::info!(target: "flowboard.api", "metrics cleared");
        Ok(())
    }
}
