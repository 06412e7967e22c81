#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use web_time::Duration;

use crate::api::{self, HttpApi, SimulationApi, StartOutcome};
use crate::app::{FlowBoard, Msg};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::input::LineInput;
use crate::logging;
use crate::poller::PollEvent;
use crate::program::{Model, Program, ProgramConfig};

#[derive(Debug, Parser)]
#[command(
    name = "flowboard",
    about = "Watch and control a kanban-flow simulation from the terminal",
    version
)]
pub struct Cli {
    /// Config file (TOML, or JSON by extension).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Simulation server root; overrides the config file and FLOWBOARD_API_URL.
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Poll the server and render the board with animated relocations.
    ///
    /// While watching, type `start`, `stop`, `clear`, `wip N`, `speed S`,
    /// `complexity L=V` or `quit` followed by Enter.
    Watch(WatchArgs),

    /// Fetch and print the board and metrics once.
    Status,

    /// Push the simulation config and start the simulation.
    Start(StartArgs),

    /// Stop the simulation.
    Stop,

    /// Clear the metrics table on the server.
    Clear,

    /// Print the effective configuration as TOML.
    Config(SimulationArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct WatchArgs {
    /// Start the simulation when the watch begins.
    #[arg(long)]
    pub start: bool,

    /// Append frames instead of redrawing the screen.
    #[arg(long)]
    pub no_clear: bool,

    /// Ignore commands typed on stdin.
    #[arg(long)]
    pub no_input: bool,

    /// Stop watching after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub seconds: Option<u64>,

    #[command(flatten)]
    pub simulation: SimulationArgs,
}

#[derive(Debug, Clone, Default, Args)]
pub struct StartArgs {
    #[command(flatten)]
    pub simulation: SimulationArgs,
}

/// Overrides for the `[simulation]` config section.
#[derive(Debug, Clone, Default, Args)]
pub struct SimulationArgs {
    /// Work-in-progress limit.
    #[arg(long)]
    pub wip_limit: Option<u32>,

    /// Seconds per simulation step.
    #[arg(long)]
    pub speed: Option<f64>,

    /// Lane complexity as LANE=VALUE; repeatable.
    #[arg(long = "complexity", value_name = "LANE=VALUE", value_parser = parse_complexity)]
    pub complexity: Vec<(u32, u32)>,
}

impl SimulationArgs {
    fn apply(&self, config: &mut ClientConfig) {
        if let Some(limit) = self.wip_limit {
            config.simulation.wip_limit = limit;
        }
        if let Some(speed) = self.speed {
            config.simulation.speed = speed;
        }
        for &(lane, value) in &self.complexity {
            config.simulation.set_complexity(lane, value);
        }
    }
}

fn parse_complexity(raw: &str) -> std::result::Result<(u32, u32), String> {
    let (lane, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected LANE=VALUE, got {raw:?}"))?;
    let lane = lane
        .trim()
        .parse()
        .map_err(|_| format!("lane {lane:?} is not a number"))?;
    let value = value
        .trim()
        .parse()
        .map_err(|_| format!("complexity {value:?} is not a number"))?;
    Ok((lane, value))
}

/// Builds the server client for a resolved config.
pub type Connect = dyn Fn(&ClientConfig) -> Result<Arc<dyn SimulationApi>>;

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json);
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let connect = |config: &ClientConfig| -> Result<Arc<dyn SimulationApi>> {
        Ok(Arc::new(HttpApi::new(config.base_url(), config.request_timeout())?))
    };
    run_with(cli, &connect, &mut io::stdout())
}

/// Run `cli` against the server built by `connect`, writing command output
/// to `out`. `watch` always renders to stdout.
pub fn run_with(cli: Cli, connect: &Connect, out: &mut dyn Write) -> Result<()> {
    let config = resolve_config(&cli)?;
    tracing::debug!(target: "flowboard.cli", api = %config.base_url(), "configuration resolved");

    match cli.command {
        Commands::Watch(args) => {
            let client = connect(&config)?;
            let mut model = FlowBoard::new(client, &config).autostart(args.start);
            if !args.no_input {
                model = model.with_input(LineInput::stdin());
            }
            let program_config = ProgramConfig::default()
                .with_frame_interval(config.frame_interval())
                .with_clear_screen(!args.no_clear)
                .with_max_runtime(args.seconds.map(Duration::from_secs));
            let mut program = Program::with_config(model, program_config, io::stdout());
            program.run()?;
        }
        Commands::Status => {
            let client = connect(&config)?;
            let board = client.fetch_board()?;
            let metrics = client.fetch_metrics();
            let mut app = FlowBoard::new(client, &config);
            let _ = app.update(Msg::Poll(PollEvent::Board(Ok(board))));
            let _ = app.update(Msg::Poll(PollEvent::Metrics(metrics)));
            write!(out, "{}", app.view())?;
        }
        Commands::Start(_) => {
            let client = connect(&config)?;
            let request = config.simulation.to_request();
            match api::start_with_config(client.as_ref(), &request)? {
                StartOutcome::Started => writeln!(out, "Simulation started.")?,
                StartOutcome::AlreadyRunning => writeln!(out, "Simulation is already running.")?,
            }
        }
        Commands::Stop => {
            connect(&config)?.stop()?;
            writeln!(out, "Simulation stopped.")?;
        }
        Commands::Clear => {
            connect(&config)?.clear_metrics()?;
            writeln!(out, "Metrics cleared.")?;
        }
        Commands::Config(_) => {
            write!(out, "{}", toml::to_string_pretty(&config)?)?;
        }
    }
    Ok(())
}

/// Defaults, file, environment, then command-line overrides; validated.
pub fn resolve_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.api_url {
        config.api_base_url.clone_from(url);
    }
    match &cli.command {
        Commands::Watch(WatchArgs { simulation, .. })
        | Commands::Start(StartArgs { simulation })
        | Commands::Config(simulation) => simulation.apply(&mut config),
        Commands::Status | Commands::Stop | Commands::Clear => {}
    }
    config.ensure_valid()?;
    Ok(config)
}
