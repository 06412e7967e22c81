#![forbid(unsafe_code)]

//! JSON bodies exchanged with the simulation server.
//!
//! Board snapshots deserialize straight into
//! [`flowboard_core::BoardSnapshot`]; this module only covers the envelopes
//! around metrics and control actions.

use std::collections::BTreeMap;

use flowboard_core::{MetricsEntry, MetricsSnapshot};
use serde::{Deserialize, Serialize};

/// `detail` the server returns when start is called on a running simulation.
pub const ALREADY_RUNNING: &str = "Simulation is already running.";

/// Body of `POST /simulation/config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRequest {
    /// Lane index (as a string) → complexity.
    pub complexity: BTreeMap<String, u32>,
    pub wip_limit: u32,
    pub speed: f64,
}

/// Body of `GET /dashboard/data`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DashboardResponse {
    #[serde(default)]
    pub dashboard_entries: Vec<MetricsEntry>,
}

impl From<DashboardResponse> for MetricsSnapshot {
    fn from(response: DashboardResponse) -> Self {
        Self {
            entries: response.dashboard_entries,
        }
    }
}

/// Success body of the control endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Error body; `detail` is a string for application errors and a list for
/// request validation errors.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: serde_json::Value,
}

/// Human-readable error detail from a raw error response body.
#[must_use]
pub fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody {
            detail: serde_json::Value::Null,
        })
        | Err(_) => body.trim().to_string(),
        Ok(ErrorBody { detail }) => detail.to_string(),
    }
}
