mod common;

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use flowboard::api::SimulationApi;
use flowboard::cli::{Cli, resolve_config, run_with};
use flowboard::config::ClientConfig;
use flowboard::error::{ClientError, Result};
use pretty_assertions::assert_eq;

use common::{FakeServer, board_with_card_in, metrics};

fn run(server: Arc<FakeServer>, args: &[&str]) -> (Result<()>, String) {
    let cli = Cli::try_parse_from(std::iter::once("flowboard").chain(args.iter().copied()))
        .expect("arguments parse");
    let connect = move |_: &ClientConfig| -> Result<Arc<dyn SimulationApi>> {
        Ok(Arc::clone(&server) as Arc<dyn SimulationApi>)
    };
    let mut out = Vec::new();
    let result = run_with(cli, &connect, &mut out);
    (result, String::from_utf8(out).expect("utf-8 output"))
}

#[test]
fn start_pushes_overridden_config_first() {
    let server = Arc::new(FakeServer::default());
    let (result, out) = run(
        Arc::clone(&server),
        &["start", "--wip-limit", "2", "--speed", "0.5"],
    );
    result.unwrap();
    assert_eq!(out, "Simulation started.\n");
    assert_eq!(server.calls(), ["config wip=2 speed=0.5", "start"]);
}

#[test]
fn start_is_aborted_when_config_is_rejected() {
    let server = Arc::new(FakeServer {
        fail_config: true,
        ..FakeServer::default()
    });
    let (result, out) = run(Arc::clone(&server), &["start"]);
    let error = result.unwrap_err();
    assert!(error.is_rejection());
    assert_eq!(error.exit_code(), 1);
    assert!(out.is_empty());
    assert_eq!(server.calls(), ["config wip=5 speed=1"]);
}

#[test]
fn start_reports_already_running() {
    let server = Arc::new(FakeServer {
        already_running: true,
        ..FakeServer::default()
    });
    let (result, out) = run(server, &["start"]);
    result.unwrap();
    assert_eq!(out, "Simulation is already running.\n");
}

#[test]
fn stop_and_clear() {
    let server = Arc::new(FakeServer::default());
    *server.metrics.lock().unwrap() = metrics(2);

    let (result, out) = run(Arc::clone(&server), &["stop"]);
    result.unwrap();
    assert_eq!(out, "Simulation stopped.\n");

    let (result, out) = run(Arc::clone(&server), &["clear"]);
    result.unwrap();
    assert_eq!(out, "Metrics cleared.\n");
    assert!(server.metrics.lock().unwrap().is_empty());
    assert_eq!(server.calls(), ["stop", "clear"]);
}

#[test]
fn status_prints_board_and_newest_metrics_first() {
    let server = Arc::new(FakeServer::with_boards(vec![board_with_card_in(1)]));
    *server.metrics.lock().unwrap() = metrics(3);
    let (result, out) = run(server, &["status"]);
    result.unwrap();

    assert!(out.starts_with("FlowBoard [stopped]"));
    assert!(out.contains("L0            L1            L2"));
    assert!(out.contains("Karte 1"));
    let round_3 = out.find("    3    5").expect("round 3 row");
    let round_1 = out.find("    1    5").expect("round 1 row");
    assert!(round_3 < round_1);
}

#[test]
fn status_fails_when_board_is_unavailable() {
    let server = Arc::new(FakeServer::default());
    let (result, _) = run(server, &["status"]);
    assert!(matches!(result, Err(ClientError::Rejected { status: 503, .. })));
}

#[test]
fn config_file_is_loaded_and_overridden() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    writeln!(
        file,
        "api_base_url = \"http://file:1\"\npoll_interval_ms = 250\n[simulation]\nwip_limit = 9\n"
    )
    .unwrap();
    let path = file.path().to_str().unwrap();

    let cli = Cli::try_parse_from(["flowboard", "--config", path, "config", "--speed", "2"]).unwrap();
    let config = resolve_config(&cli).unwrap();
    assert_eq!(config.poll_interval_ms, 250);
    assert_eq!(config.simulation.wip_limit, 9);
    assert_eq!(config.simulation.speed, 2.0);

    let cli = Cli::try_parse_from([
        "flowboard",
        "--config",
        path,
        "--api-url",
        "https://cli:2",
        "stop",
    ])
    .unwrap();
    assert_eq!(resolve_config(&cli).unwrap().base_url(), "https://cli:2");
}

#[test]
fn json_config_file_is_detected_by_extension() {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .unwrap();
    write!(file, r#"{{"glide": {{"duration_ms": 120}}}}"#).unwrap();
    let config = ClientConfig::from_file(file.path()).unwrap();
    assert_eq!(config.glide.duration_ms, 120);
    assert_eq!(config.glide.fallback_margin_ms, 200);
}

#[test]
fn missing_or_invalid_config_exits_with_usage_code() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    let error = ClientConfig::from_file(&missing).unwrap_err();
    assert!(matches!(error, ClientError::MissingConfig { .. }));
    assert_eq!(error.exit_code(), 2);

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "poll_interval_ms = 0\n").unwrap();
    let cli = Cli::try_parse_from(["flowboard", "--config", bad.to_str().unwrap(), "status"]).unwrap();
    let error = resolve_config(&cli).unwrap_err();
    assert!(error.to_string().contains("poll_interval_ms must be > 0"));
    assert_eq!(error.exit_code(), 2);
}
