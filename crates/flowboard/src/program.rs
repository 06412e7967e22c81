#![forbid(unsafe_code)]

//! Elm-style runtime for the terminal client.
//!
//! The program owns the model and a message channel. Each loop iteration
//! drains messages until the next frame is due, calls [`Model::frame`] with
//! the monotonic time since start, and re-renders when the model changed or
//! is animating.
//!
//! Side effects are expressed as [`Cmd`]s. Blocking work (HTTP control
//! actions) is a [`Cmd::Task`]: it runs on its own thread and its result comes
//! back through the same channel as subscription messages, so every response
//! is applied in arrival order.
//!
//! # Example
//!
//! ```ignore
//! use flowboard::program::{Cmd, Model, Program, ProgramConfig};
//!
//! struct Clock { frames: u64 }
//!
//! impl Model for Clock {
//!     type Message = ();
//!     fn update(&mut self, _msg: ()) -> Cmd<()> { Cmd::none() }
//!     fn frame(&mut self, _now: Duration) -> Cmd<()> { self.frames += 1; Cmd::none() }
//!     fn view(&self) -> String { format!("{} frames\n", self.frames) }
//! }
//!
//! Program::with_config(Clock { frames: 0 }, ProgramConfig::default(), std::io::stdout()).run()?;
//! ```

use std::fmt;
use std::io::{self, Stdout, Write};
use std::sync::mpsc;
use std::thread;

use web_time::{Duration, Instant};

use crate::subscription::{Subscription, SubscriptionManager};

/// Application state and behavior.
pub trait Model: Sized {
    /// Messages that update the model.
    type Message: Send + 'static;

    /// Startup commands.
    fn init(&mut self) -> Cmd<Self::Message> {
        Cmd::none()
    }

    /// State transition for one message.
    fn update(&mut self, msg: Self::Message) -> Cmd<Self::Message>;

    /// Frame boundary; `now` is monotonic time since the program started.
    fn frame(&mut self, _now: Duration) -> Cmd<Self::Message> {
        Cmd::none()
    }

    /// Render the current state.
    fn view(&self) -> String;

    /// Background sources to run while the program runs.
    fn subscriptions(&self) -> Vec<Box<dyn Subscription<Self::Message>>> {
        Vec::new()
    }

    /// Whether frames should re-render even without new messages.
    fn is_animating(&self) -> bool {
        false
    }

    /// Release resources; called once when the program stops.
    fn teardown(&mut self) {}
}

/// Blocking work whose result is fed back as a message.
pub type Task<M> = Box<dyn FnOnce() -> M + Send + 'static>;

/// Side effects to be executed by the runtime.
pub enum Cmd<M> {
    /// No operation.
    None,
    /// Stop the program.
    Quit,
    /// Execute multiple commands, in order.
    Batch(Vec<Cmd<M>>),
    /// Send a message to the model.
    Msg(M),
    /// Run a named task off the UI thread.
    Task(&'static str, Task<M>),
    /// Emit a log line.
    Log(String),
}

impl<M> Cmd<M> {
    #[inline]
    pub fn none() -> Self {
        Self::None
    }

    #[inline]
    pub fn quit() -> Self {
        Self::Quit
    }

    #[inline]
    pub fn msg(m: M) -> Self {
        Self::Msg(m)
    }

    #[inline]
    pub fn log(msg: impl Into<String>) -> Self {
        Self::Log(msg.into())
    }

    /// Run `f` on a worker thread and deliver its result.
    pub fn task(name: &'static str, f: impl FnOnce() -> M + Send + 'static) -> Self {
        Self::Task(name, Box::new(f))
    }

    /// Create a batch of commands, dropping no-ops.
    pub fn batch(cmds: Vec<Self>) -> Self {
        let mut cmds: Vec<Self> = cmds.into_iter().filter(|c| !c.is_none()).collect();
        match cmds.len() {
            0 => Self::None,
            1 => cmds.pop().unwrap_or(Self::None),
            _ => Self::Batch(cmds),
        }
    }

    /// Whether this is a no-op.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl<M> Default for Cmd<M> {
    fn default() -> Self {
        Self::None
    }
}

impl<M: fmt::Debug> fmt::Debug for Cmd<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Quit => f.write_str("Quit"),
            Self::Batch(cmds) => f.debug_tuple("Batch").field(cmds).finish(),
            Self::Msg(m) => f.debug_tuple("Msg").field(m).finish(),
            Self::Task(name, _) => f.debug_tuple("Task").field(name).finish(),
            Self::Log(text) => f.debug_tuple("Log").field(text).finish(),
        }
    }
}

/// Runtime parameters.
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    /// Delay between frames.
    pub frame_interval: Duration,
    /// Clear the screen before each render (interactive terminals).
    pub clear_screen: bool,
    /// Stop after this much time.
    pub max_runtime: Option<Duration>,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            clear_screen: true,
            max_runtime: None,
        }
    }
}

impl ProgramConfig {
    #[must_use]
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    #[must_use]
    pub fn with_clear_screen(mut self, clear: bool) -> Self {
        self.clear_screen = clear;
        self
    }

    #[must_use]
    pub fn with_max_runtime(mut self, limit: Option<Duration>) -> Self {
        self.max_runtime = limit;
        self
    }
}

const CLEAR_SCREEN: &str = "\x1b[H\x1b[2J";

/// The runtime that drives a [`Model`].
pub struct Program<M: Model, W: Write = Stdout> {
    model: M,
    writer: W,
    config: ProgramConfig,
    sender: mpsc::Sender<M::Message>,
    receiver: mpsc::Receiver<M::Message>,
    subscriptions: SubscriptionManager<M::Message>,
    running: bool,
    dirty: bool,
    torn_down: bool,
    epoch: Instant,
    last_view: String,
    frames: u64,
}

impl<M: Model, W: Write> Program<M, W> {
    pub fn with_config(model: M, config: ProgramConfig, writer: W) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            model,
            writer,
            config,
            subscriptions: SubscriptionManager::new(sender.clone()),
            sender,
            receiver,
            running: true,
            dirty: true,
            torn_down: false,
            epoch: Instant::now(),
            last_view: String::new(),
            frames: 0,
        }
    }

    /// Run until the model quits or the runtime limit is reached.
    pub fn run(&mut self) -> io::Result<()> {
        let cmd = self.model.init();
        self.execute_cmd(cmd)?;
        self.subscriptions.reconcile(self.model.subscriptions());
        self.epoch = Instant::now();
        self.render_frame()?;

        let mut next_frame = self.config.frame_interval;
        while self.running {
            self.pump_messages(next_frame)?;
            if !self.running {
                break;
            }

            let now = self.epoch.elapsed();
            let cmd = self.model.frame(now);
            self.execute_cmd(cmd)?;
            if self.dirty || self.model.is_animating() {
                self.render_frame()?;
            }

            if self.config.max_runtime.is_some_and(|limit| now >= limit) {
                tracing::debug!(target: "flowboard.program", frames = self.frames, "runtime limit reached");
                self.running = false;
            }
            next_frame = now.saturating_add(self.config.frame_interval);
        }

        self.shutdown();
        self.writer.flush()
    }

    /// Apply messages until `deadline` (time since start) passes.
    fn pump_messages(&mut self, deadline: Duration) -> io::Result<()> {
        while self.running {
            let remaining = deadline.saturating_sub(self.epoch.elapsed());
            match self.receiver.recv_timeout(remaining) {
                Ok(msg) => self.dispatch(msg)?,
                Err(mpsc::RecvTimeoutError::Timeout | mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(())
    }

    /// Feed one message to the model.
    pub fn dispatch(&mut self, msg: M::Message) -> io::Result<()> {
        let cmd = self.model.update(msg);
        self.dirty = true;
        self.execute_cmd(cmd)
    }

    fn execute_cmd(&mut self, cmd: Cmd<M::Message>) -> io::Result<()> {
        match cmd {
            Cmd::None => {}
            Cmd::Quit => self.running = false,
            Cmd::Msg(m) => self.dispatch(m)?,
            Cmd::Batch(cmds) => {
                for c in cmds {
                    self.execute_cmd(c)?;
                }
            }
            Cmd::Task(name, task) => {
                tracing::debug!(target: "flowboard.program", task = name, "task started");
                let sender = self.sender.clone();
                thread::Builder::new()
                    .name(format!("flowboard-{name}"))
                    .spawn(move || {
                        // The program may already be gone; dropping the result is fine.
                        let _ = sender.send(task());
                    })?;
            }
            Cmd::Log(text) => {
                tracing::info!(target: "flowboard.program", "{text}");
            }
        }
        Ok(())
    }

    fn render_frame(&mut self) -> io::Result<()> {
        let view = self.model.view();
        if view != self.last_view {
            if self.config.clear_screen {
                self.writer.write_all(CLEAR_SCREEN.as_bytes())?;
            }
            self.writer.write_all(view.as_bytes())?;
            self.writer.flush()?;
            self.last_view = view;
        }
        self.frames += 1;
        self.dirty = false;
        Ok(())
    }

    /// Stop subscriptions and tear the model down. Idempotent.
    pub fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.running = false;
        let detached = self.subscriptions.stop_all();
        self.model.teardown();
        tracing::debug!(target: "flowboard.program", frames = self.frames, detached, "program stopped");
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

impl<M: Model, W: Write> Drop for Program<M, W> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    enum Msg {
        Bump,
        Done(u32),
        Quit,
    }

    #[derive(Default)]
    struct Counter {
        value: u32,
        frames: u32,
        quit_after_frames: Option<u32>,
        teardowns: Arc<AtomicUsize>,
        ticker: bool,
    }

    struct Ticker;

    impl Subscription<Msg> for Ticker {
        fn id(&self) -> u64 {
            7
        }

        fn run(&self, sender: mpsc::Sender<Msg>, stop: CancellationToken) {
            while !stop.wait_timeout(Duration::from_millis(1)) {
                if sender.send(Msg::Bump).is_err() {
                    break;
                }
            }
        }
    }

    impl Model for Counter {
        type Message = Msg;

        fn update(&mut self, msg: Msg) -> Cmd<Msg> {
            match msg {
                Msg::Bump => {
                    self.value += 1;
                    Cmd::none()
                }
                Msg::Done(n) => {
                    self.value += n;
                    Cmd::quit()
                }
                Msg::Quit => Cmd::quit(),
            }
        }

        fn frame(&mut self, _now: Duration) -> Cmd<Msg> {
            self.frames += 1;
            match self.quit_after_frames {
                Some(limit) if self.frames >= limit => Cmd::msg(Msg::Quit),
                _ => Cmd::none(),
            }
        }

        fn view(&self) -> String {
            format!("value={}\n", self.value)
        }

        fn subscriptions(&self) -> Vec<Box<dyn Subscription<Msg>>> {
            if self.ticker {
                vec![Box::new(Ticker)]
            } else {
                Vec::new()
            }
        }

        fn teardown(&mut self) {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config() -> ProgramConfig {
        ProgramConfig::default()
            .with_frame_interval(Duration::from_millis(1))
            .with_clear_screen(false)
            .with_max_runtime(Some(Duration::from_secs(5)))
    }

    #[test]
    fn batch_collapses() {
        assert!(Cmd::<Msg>::batch(vec![]).is_none());
        assert!(matches!(Cmd::batch(vec![Cmd::<Msg>::none(), Cmd::quit()]), Cmd::Quit));
        assert!(matches!(
            Cmd::batch(vec![Cmd::<Msg>::log("a"), Cmd::quit()]),
            Cmd::Batch(ref v) if v.len() == 2
        ));
    }

    #[test]
    fn task_debug_shows_name_only() {
        let cmd: Cmd<Msg> = Cmd::task("fetch", || Msg::Bump);
        assert_eq!(format!("{cmd:?}"), "Task(\"fetch\")");
    }

    #[test]
    fn task_result_is_delivered() {
        struct Init(Counter);
        impl Model for Init {
            type Message = Msg;
            fn init(&mut self) -> Cmd<Msg> {
                Cmd::task("work", || Msg::Done(41))
            }
            fn update(&mut self, msg: Msg) -> Cmd<Msg> {
                self.0.update(msg)
            }
            fn view(&self) -> String {
                self.0.view()
            }
        }

        let mut program = Program::with_config(Init(Counter::default()), config(), Vec::new());
        program.run().unwrap();
        assert_eq!(program.model().0.value, 41);
        let out = String::from_utf8(program.writer().clone()).unwrap();
        assert!(out.ends_with("value=41\n"));
    }

    #[test]
    fn identical_views_are_written_once() {
        let model = Counter {
            quit_after_frames: Some(5),
            ..Counter::default()
        };
        let mut program = Program::with_config(model, config(), Vec::new());
        program.run().unwrap();
        let out = String::from_utf8(program.writer().clone()).unwrap();
        assert_eq!(out.matches("value=0").count(), 1);
    }

    #[test]
    fn subscriptions_feed_messages_and_stop_on_shutdown() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let model = Counter {
            ticker: true,
            teardowns: Arc::clone(&teardowns),
            ..Counter::default()
        };
        let cfg = config().with_max_runtime(Some(Duration::from_millis(50)));
        let mut program = Program::with_config(model, cfg, Vec::new());
        program.run().unwrap();
        assert!(program.model().value > 0);
        assert!(!program.is_running());
        program.shutdown();
        drop(program);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }
}
