#![forbid(unsafe_code)]

//! Line commands typed while `watch` runs.
//!
//! [`LineInput`] reads one command per line from a [`BufRead`] source (stdin
//! in the binary) on its own subscription thread and forwards each parsed
//! [`Command`] as a message. End of input only ends the subscription: a
//! watch started with stdin closed keeps polling.
//!
//! ```text
//! start | stop | clear | wip N | speed S | complexity L=V | quit
//! ```

use std::fmt;
use std::io::{self, BufRead, BufReader};
use std::sync::{Arc, mpsc};

use crate::cancellation::CancellationToken;
use crate::subscription::{SubId, Subscription};

const INPUT_ID: SubId = 0x696e_7075;

/// Usage line shown to the user.
pub const HELP: &str = "Commands: start, stop, clear, wip N, speed S, complexity L=V, quit";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Clear,
    WipLimit(u32),
    Speed(f64),
    Complexity { lane: u32, value: u32 },
    Quit,
    /// A line that is not a command; carries the reason.
    Invalid(String),
}

impl Command {
    /// Parse one line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next()?.to_ascii_lowercase();
        let arg = words.next();
        let extra = words.next();

        let command = match (verb.as_str(), arg, extra) {
            ("start", None, _) => Self::Start,
            ("stop", None, _) => Self::Stop,
            ("clear", None, _) => Self::Clear,
            ("quit" | "q" | "exit", None, _) => Self::Quit,
            ("wip", Some(n), None) => match n.parse() {
                Ok(limit) => Self::WipLimit(limit),
                Err(_) => Self::Invalid(format!("WIP limit {n:?} is not a whole number")),
            },
            ("speed", Some(s), None) => match s.parse() {
                Ok(speed) => Self::Speed(speed),
                Err(_) => Self::Invalid(format!("speed {s:?} is not a number")),
            },
            ("complexity", Some(pair), None) => parse_complexity(pair),
            _ => Self::Invalid(format!("unknown command {:?}", line.trim())),
        };
        Some(command)
    }
}

fn parse_complexity(pair: &str) -> Command {
    let Some((lane, value)) = pair.split_once('=') else {
        return Command::Invalid(format!("expected LANE=VALUE, got {pair:?}"));
    };
    match (lane.parse(), value.parse()) {
        (Ok(lane), Ok(value)) => Command::Complexity { lane, value },
        _ => Command::Invalid(format!("complexity {pair:?} needs two whole numbers")),
    }
}

type OpenReader = dyn Fn() -> Box<dyn BufRead + Send> + Send + Sync;

/// Subscription that turns input lines into messages.
#[derive(Clone)]
pub struct LineInput {
    open: Arc<OpenReader>,
}

impl LineInput {
    /// Read commands from the process's stdin.
    #[must_use]
    pub fn stdin() -> Self {
        Self::from_reader(|| Box::new(BufReader::new(io::stdin())))
    }

    /// Read commands from whatever `open` returns when the subscription starts.
    pub fn from_reader<F>(open: F) -> Self
    where
        F: Fn() -> Box<dyn BufRead + Send> + Send + Sync + 'static,
    {
        Self { open: Arc::new(open) }
    }
}

impl fmt::Debug for LineInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LineInput")
    }
}

impl<M> Subscription<M> for LineInput
where
    M: From<Command> + Send + 'static,
{
    fn id(&self) -> SubId {
        INPUT_ID
    }

    fn run(&self, sender: mpsc::Sender<M>, stop: CancellationToken) {
        let mut reader = (self.open)();
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => {
                    tracing::debug!(target: "flowboard.input", "input closed");
                    break;
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(target: "flowboard.input", error = %error, "input read failed");
                    break;
                }
            }
            if stop.is_cancelled() {
                break;
            }
            let Some(command) = Command::parse(&line) else {
                continue;
            };
            tracing::debug!(target: "flowboard.input", command = ?command, "command read");
            if sender.send(command.into()).is_err() {
                break;
            }
        }
    }
}
