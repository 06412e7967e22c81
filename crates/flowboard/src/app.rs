#![forbid(unsafe_code)]

//! The FlowBoard application model.
//!
//! [`FlowBoard`] owns the [`Reconciler`], the current [`BoardLayout`] and the
//! local view of the simulation (running flag, metrics, settings). Network
//! results arrive as messages and are applied in arrival order.
//!
//! # Invariants
//!
//! - The layout is recomputed right after every ingest and tagged with the
//!   committed generation, so the end capture on the next frame measures the
//!   new positions.
//! - A failed fetch never clears what is on screen: a board failure keeps the
//!   last board and marks the simulation stopped, a metrics failure keeps the
//!   last table.
//! - Control actions run as tasks; their outcome only changes local state
//!   once the server has answered.
//! - Settings typed while watching stay local until the next start pushes
//!   them with the set-config call.

use std::sync::Arc;

use flowboard_core::reconcile::ReconcilerConfig;
use flowboard_core::{BoardSnapshot, CardId, CloneView, MetricsSnapshot, Reconciler};
use web_time::Duration;

use crate::api::{self, SimulationApi, StartOutcome};
use crate::config::{ClientConfig, SimulationSettings};
use crate::error::Result;
use crate::input::{self, Command, LineInput};
use crate::layout::BoardLayout;
use crate::poller::{PollEvent, Poller};
use crate::program::{Cmd, Model};
use crate::render::{self, View};
use crate::subscription::Subscription;

/// Messages driving [`FlowBoard`].
#[derive(Debug)]
pub enum Msg {
    Poll(PollEvent),
    Start,
    Stop,
    ClearMetrics,
    Started(Result<StartOutcome>),
    Stopped(Result<()>),
    Cleared(Result<()>),
    SetWipLimit(u32),
    SetSpeed(f64),
    SetComplexity { lane: u32, value: u32 },
    /// An input line that was not a command.
    BadInput(String),
    Quit,
}

impl From<PollEvent> for Msg {
    fn from(event: PollEvent) -> Self {
        Self::Poll(event)
    }
}

impl From<Command> for Msg {
    fn from(command: Command) -> Self {
        match command {
            Command::Start => Self::Start,
            Command::Stop => Self::Stop,
            Command::Clear => Self::ClearMetrics,
            Command::WipLimit(limit) => Self::SetWipLimit(limit),
            Command::Speed(speed) => Self::SetSpeed(speed),
            Command::Complexity { lane, value } => Self::SetComplexity { lane, value },
            Command::Quit => Self::Quit,
            Command::Invalid(reason) => Self::BadInput(reason),
        }
    }
}

/// Application state.
pub struct FlowBoard {
    api: Arc<dyn SimulationApi>,
    poll_interval: Duration,
    reconciler: Reconciler,
    layout: BoardLayout,
    metrics: MetricsSnapshot,
    running: bool,
    settings: SimulationSettings,
    status: Option<String>,
    clones: Vec<CloneView>,
    autostart: bool,
    input: Option<LineInput>,
}

impl FlowBoard {
    pub fn new(api: Arc<dyn SimulationApi>, config: &ClientConfig) -> Self {
        Self::with_parts(
            api,
            config.poll_interval(),
            config.reconciler_config(),
            config.simulation.clone(),
        )
    }

    pub fn with_parts(
        api: Arc<dyn SimulationApi>,
        poll_interval: Duration,
        reconciler: ReconcilerConfig,
        settings: SimulationSettings,
    ) -> Self {
        Self {
            api,
            poll_interval,
            reconciler: Reconciler::new(reconciler),
            layout: BoardLayout::empty(),
            metrics: MetricsSnapshot::default(),
            running: false,
            settings,
            status: None,
            clones: Vec::new(),
            autostart: false,
            input: None,
        }
    }

    /// Start the simulation as soon as the program runs.
    #[must_use]
    pub fn autostart(mut self, enabled: bool) -> Self {
        self.autostart = enabled;
        self
    }

    /// Accept line commands from `input` while running.
    #[must_use]
    pub fn with_input(mut self, input: LineInput) -> Self {
        self.input = Some(input);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn metrics(&self) -> &MetricsSnapshot {
        &self.metrics
    }

    pub fn board(&self) -> Option<&BoardSnapshot> {
        self.reconciler.snapshot().map(|snapshot| &**snapshot)
    }

    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Clones sampled at the last frame.
    pub fn clones(&self) -> &[CloneView] {
        &self.clones
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    fn on_board(&mut self, board: BoardSnapshot) {
        if let Some(running) = board.is_running {
            self.running = running;
        }
        let report = self.reconciler.ingest(board, &self.layout);
        if let Some(snapshot) = self.reconciler.snapshot() {
            self.layout = BoardLayout::compute(snapshot, report.generation);
        }
        if !report.relocations.is_empty() {
            tracing::debug!(
                target: "flowboard.app",
                generation = report.generation,
                relocations = report.relocations.len(),
                superseded = report.superseded.len(),
                "board updated"
            );
        }
    }

    fn start(&mut self) -> Cmd<Msg> {
        if self.running {
            self.set_status("Simulation is already running.");
            return Cmd::none();
        }
        self.set_status("Starting simulation...");
        let client = Arc::clone(&self.api);
        let request = self.settings.to_request();
        Cmd::task("start", move || {
            Msg::Started(api::start_with_config(client.as_ref(), &request))
        })
    }
}

impl Model for FlowBoard {
    type Message = Msg;

    fn init(&mut self) -> Cmd<Msg> {
        if self.input.is_some() {
            self.set_status(input::HELP);
        }
        let start = if self.autostart {
            Cmd::msg(Msg::Start)
        } else {
            Cmd::none()
        };
        Cmd::batch(vec![
            Cmd::log(format!(
                "watching board, polling every {} ms",
                self.poll_interval.as_millis()
            )),
            start,
        ])
    }

    fn update(&mut self, msg: Msg) -> Cmd<Msg> {
        match msg {
            Msg::Poll(PollEvent::Board(Ok(board))) => self.on_board(board),
            Msg::Poll(PollEvent::Board(Err(error))) => {
                self.running = false;
                self.set_status(format!("Board fetch failed: {error}"));
            }
            Msg::Poll(PollEvent::Metrics(Ok(metrics))) => self.metrics = metrics,
            Msg::Poll(PollEvent::Metrics(Err(error))) => {
                self.set_status(format!("Metrics fetch failed: {error}"));
            }
            Msg::Start => return self.start(),
            Msg::Stop => {
                let client = Arc::clone(&self.api);
                return Cmd::task("stop", move || Msg::Stopped(client.stop()));
            }
            Msg::ClearMetrics => {
                let client = Arc::clone(&self.api);
                return Cmd::task("clear", move || Msg::Cleared(client.clear_metrics()));
            }
            Msg::Started(Ok(StartOutcome::Started)) => {
                self.running = true;
                self.set_status("Simulation started.");
            }
            Msg::Started(Ok(StartOutcome::AlreadyRunning)) => {
                self.running = true;
                self.set_status("Simulation is already running.");
            }
            Msg::Started(Err(error)) => {
                self.running = false;
                self.set_status(format!("Start failed: {error}"));
            }
            Msg::Stopped(Ok(())) => {
                self.running = false;
                self.set_status("Simulation stopped.");
            }
            Msg::Stopped(Err(error)) => self.set_status(format!("Stop failed: {error}")),
            Msg::Cleared(Ok(())) => {
                self.metrics = MetricsSnapshot::default();
                self.set_status("Metrics cleared.");
            }
            Msg::Cleared(Err(error)) => self.set_status(format!("Clear failed: {error}")),
            Msg::SetWipLimit(limit) => {
                self.settings.wip_limit = limit;
                self.set_status(format!("WIP limit {limit}, sent on next start."));
            }
            Msg::SetSpeed(speed) if speed.is_finite() && speed > 0.0 => {
                self.settings.speed = speed;
                self.set_status(format!("Speed {speed}s/step, sent on next start."));
            }
            Msg::SetSpeed(speed) => self.set_status(format!("Ignoring invalid speed {speed}")),
            Msg::SetComplexity { lane, value } => {
                self.settings.set_complexity(lane, value);
                self.set_status(format!("Lane {lane} complexity {value}, sent on next start."));
            }
            Msg::BadInput(reason) => self.set_status(format!("{reason}. {}", input::HELP)),
            Msg::Quit => return Cmd::quit(),
        }
        Cmd::none()
    }

    fn frame(&mut self, now: Duration) -> Cmd<Msg> {
        self.reconciler.on_frame(now, &self.layout);
        self.reconciler.advance(now);
        self.clones = self.reconciler.clones(now);
        Cmd::none()
    }

    fn view(&self) -> String {
        let visible = |id: &CardId| self.reconciler.is_card_visible(id);
        render::render_to_string(&View {
            board: self.board(),
            layout: &self.layout,
            is_card_visible: &visible,
            clones: &self.clones,
            metrics: &self.metrics,
            running: self.running,
            settings: &self.settings,
            status: self.status.as_deref(),
        })
    }

    fn subscriptions(&self) -> Vec<Box<dyn Subscription<Msg>>> {
        let mut subs: Vec<Box<dyn Subscription<Msg>>> =
            vec![Box::new(Poller::new(Arc::clone(&self.api), self.poll_interval))];
        if let Some(input) = &self.input {
            subs.push(Box::new(input.clone()));
        }
        subs
    }

    fn is_animating(&self) -> bool {
        !self.clones.is_empty() || !self.reconciler.is_idle()
    }

    fn teardown(&mut self) {
        self.reconciler.shutdown();
        self.clones.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::wire::ConfigRequest;
    use flowboard_core::{Card, Lane, LayoutProbe, MetricsEntry};

    struct Offline;

    impl SimulationApi for Offline {
        fn fetch_board(&self) -> Result<BoardSnapshot> {
            Err(ClientError::invalid("offline"))
        }
        fn fetch_metrics(&self) -> Result<MetricsSnapshot> {
            Err(ClientError::invalid("offline"))
        }
        fn set_config(&self, _request: &ConfigRequest) -> Result<()> {
            Ok(())
        }
        fn start(&self) -> Result<StartOutcome> {
            Ok(StartOutcome::Started)
        }
        fn stop(&self) -> Result<()> {
            Ok(())
        }
        fn clear_metrics(&self) -> Result<()> {
            Ok(())
        }
    }

    fn app() -> FlowBoard {
        FlowBoard::new(Arc::new(Offline), &ClientConfig::default())
    }

    fn board(card_lane: u32, running: Option<bool>) -> BoardSnapshot {
        let mut lanes: Vec<Lane> = (0..3)
            .map(|i| Lane::new(format!("lane-{i}"), format!("L{i}")))
            .collect();
        lanes[card_lane as usize].cards.push(Card::new("c1", card_lane).with_birth_id(1));
        let mut snapshot = BoardSnapshot::new(lanes);
        snapshot.is_running = running;
        snapshot
    }

    fn poll_board(app: &mut FlowBoard, snapshot: BoardSnapshot) {
        let _ = app.update(Msg::Poll(PollEvent::Board(Ok(snapshot))));
    }

    #[test]
    fn running_flag_follows_board_when_reported() {
        let mut app = app();
        poll_board(&mut app, board(0, Some(true)));
        assert!(app.is_running());
        poll_board(&mut app, board(0, None));
        assert!(app.is_running());
        poll_board(&mut app, board(0, Some(false)));
        assert!(!app.is_running());
    }

    #[test]
    fn relocation_hides_card_until_glide_ends() {
        let mut app = app();
        poll_board(&mut app, board(0, None));
        poll_board(&mut app, board(1, None));
        let c1 = CardId::new("c1");
        assert!(!app.reconciler().is_card_visible(&c1));
        assert_eq!(app.layout().generation(), 2);

        let _ = app.frame(Duration::ZERO);
        assert_eq!(app.clones().len(), 1);
        assert!(app.is_animating());

        let _ = app.frame(Duration::from_secs(1));
        assert!(app.clones().is_empty());
        assert!(app.reconciler().is_card_visible(&c1));
        assert!(!app.is_animating());
    }

    #[test]
    fn board_failure_keeps_board_and_stops() {
        let mut app = app();
        poll_board(&mut app, board(2, Some(true)));
        let _ = app.update(Msg::Poll(PollEvent::Board(Err(ClientError::invalid("down")))));
        assert!(!app.is_running());
        assert_eq!(app.board().map(BoardSnapshot::card_count), Some(1));
        assert!(app.status().is_some_and(|s| s.starts_with("Board fetch failed")));
    }

    #[test]
    fn metrics_failure_keeps_table() {
        let mut app = app();
        let table = MetricsSnapshot {
            entries: vec![MetricsEntry::default()],
        };
        let _ = app.update(Msg::Poll(PollEvent::Metrics(Ok(table.clone()))));
        let _ = app.update(Msg::Poll(PollEvent::Metrics(Err(ClientError::invalid("down")))));
        assert_eq!(app.metrics(), &table);
    }

    #[test]
    fn start_while_running_sends_nothing() {
        let mut app = app();
        poll_board(&mut app, board(0, Some(true)));
        assert!(app.update(Msg::Start).is_none());
        assert_eq!(app.status(), Some("Simulation is already running."));
    }

    #[test]
    fn start_when_stopped_is_a_task() {
        let mut app = app();
        assert!(matches!(app.update(Msg::Start), Cmd::Task("start", _)));
    }

    #[test]
    fn control_outcomes_update_state() {
        let mut app = app();
        let _ = app.update(Msg::Started(Ok(StartOutcome::AlreadyRunning)));
        assert!(app.is_running());
        let _ = app.update(Msg::Stopped(Ok(())));
        assert!(!app.is_running());
        let _ = app.update(Msg::Poll(PollEvent::Metrics(Ok(MetricsSnapshot {
            entries: vec![MetricsEntry::default()],
        }))));
        let _ = app.update(Msg::Cleared(Ok(())));
        assert!(app.metrics().is_empty());
    }

    #[test]
    fn glide_route_names_the_destination_lane() {
        let mut app = app();
        poll_board(&mut app, board(0, None));
        poll_board(&mut app, board(1, None));
        let _ = app.frame(Duration::ZERO);
        let view = app.view();
        let line = view
            .lines()
            .find(|l| l.contains("Karte 1 "))
            .unwrap_or_default();
        assert!(line.contains("Karte 1 L0 -> L1"), "glide line: {line:?}");

        let _ = app.frame(Duration::from_millis(250));
        assert!(app.view().contains("Karte 1 L0 -> L1 [#"));
    }

    #[test]
    fn typed_commands_map_to_messages() {
        assert!(matches!(Msg::from(Command::Stop), Msg::Stop));
        assert!(matches!(Msg::from(Command::Clear), Msg::ClearMetrics));
        assert!(matches!(Msg::from(Command::WipLimit(4)), Msg::SetWipLimit(4)));
        assert!(matches!(
            Msg::from(Command::Complexity { lane: 5, value: 2 }),
            Msg::SetComplexity { lane: 5, value: 2 }
        ));

        let mut app = app();
        assert!(matches!(app.update(Command::Stop.into()), Cmd::Task("stop", _)));
        assert!(matches!(app.update(Command::Clear.into()), Cmd::Task("clear", _)));
        assert!(matches!(app.update(Command::Quit.into()), Cmd::Quit));
        let _ = app.update(Command::Invalid("unknown command \"x\"".into()).into());
        assert!(app.status().is_some_and(|s| s.contains(input::HELP)));
    }

    #[test]
    fn input_subscription_is_opt_in() {
        assert_eq!(app().subscriptions().len(), 1);
        let with_input = app().with_input(LineInput::from_reader(|| Box::new(std::io::empty())));
        assert_eq!(with_input.subscriptions().len(), 2);
    }

    #[test]
    fn settings_messages() {
        let mut app = app();
        let _ = app.update(Msg::SetWipLimit(2));
        let _ = app.update(Msg::SetSpeed(0.5));
        let _ = app.update(Msg::SetSpeed(f64::NAN));
        let _ = app.update(Msg::SetComplexity { lane: 3, value: 4 });
        assert_eq!(app.settings().wip_limit, 2);
        assert_eq!(app.settings().speed, 0.5);
        assert_eq!(app.settings().complexity_for(3), 4);
    }

    #[test]
    fn autostart_issues_start() {
        assert!(matches!(app().init(), Cmd::Log(_)));
        match app().autostart(true).init() {
            Cmd::Batch(cmds) => assert!(matches!(cmds.as_slice(), [Cmd::Log(_), Cmd::Msg(Msg::Start)])),
            other => panic!("unexpected init command: {other:?}"),
        }
    }

    #[test]
    fn teardown_clears_transitions() {
        let mut app = app();
        poll_board(&mut app, board(0, None));
        poll_board(&mut app, board(2, None));
        app.teardown();
        assert!(app.reconciler().is_shut_down());
        assert!(app.reconciler().is_card_visible(&CardId::new("c1")));
    }
}
