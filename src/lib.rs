//! oscsend: typed OSC messages and fades from loosely-typed text
//!
//! oscsend turns user-supplied text parameters into OSC messages: a path
//! plus a list of typed arguments. A numeric value can also be sent as a
//! fade, a run of messages that steps from a start value to an end value
//! over a given time.
//!
//! ## Features
//!
//! - **Argument parsing**: `1 "two words" 2.5 {"type":"T"}` becomes
//!   `[Int(1), String("two words"), Float(2.5), Bool(true)]`
//! - **Fades**: integer fades step by one, float fades by `10^-granularity`
//! - **Injected timers**: tokio in production, a manual clock in tests
//! - **UDP transport**: OSC 1.0 framing over a tokio socket
//!
//! ## Quick Start
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use oscsend::{CommandRequest, IntOptions, OscClient, OscConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OscClient::connect(OscConfig::default()).await?;
//!
//!     // Fade /volume from 0 to 100 over two seconds
//!     client.execute(&CommandRequest::SendInt(IntOptions {
//!         path: "/volume".to_string(),
//!         enable_fade: true,
//!         start: "0".to_string(),
//!         end: "100".to_string(),
//!         fade: "2000".to_string(),
//!         ..Default::default()
//!     }))?;
//!
//!     client.idle().await;
//!     Ok(())
//! }
//! ```
//!
//! ### As a Command-Line Tool
//!
//! ```bash
//! # Send a single integer
//! oscsend --host 10.0.0.5 --port 53000 int /cue/go 1
//!
//! # Fade a float from 0 to 1 over 3 seconds in 0.01 steps
//! oscsend float /fader --fade-from 0 --fade-to 1 --fade-ms 3000 --granularity 2
//!
//! # Send several arguments
//! oscsend multi /label '3 "hello world" 0.5'
//! ```
//!
//! ## Architecture
//!
//! ```text
//! text ──▶ args::tokenize ──▶ [OscArg] ─────────────────────┐
//!                                                           ▼
//! fade ──▶ ramp::plan_*_ramp ──▶ RampPlan ──▶ Scheduler ──▶ Sink
//! ```

pub mod args;
pub mod codec;
pub mod command;
pub mod config;
pub mod ramp;
pub mod scheduler;
pub mod sink;
pub mod value;

// Re-export core types
pub use args::tokenize;
pub use codec::OscMessage;
pub use command::{
    Action, BoolOptions, Command, CommandRequest, Dispatch, FloatOptions, IntOptions,
    MultipleOptions, NoVariables, PathOptions, StaticVariables, StringOptions, VariableResolver,
};
pub use config::{FadeConfig, OscConfig, TargetConfig};
pub use ramp::{plan_float_ramp, plan_integer_ramp, RampKind, RampPlan};
pub use scheduler::{ManualClock, ScheduledEmission, Scheduler, Timer, TokioTimer};
pub use sink::{LogSink, RecordingSink, Sink, UdpSink};
pub use value::OscArg;

use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// Executes commands against a sink
///
/// # Example
///
/// ```rust
/// use oscsend::{Action, Command, ManualClock, OscClient, OscConfig, RecordingSink};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(ManualClock::new());
/// let sink = Arc::new(RecordingSink::new());
/// let client = OscClient::new(OscConfig::default(), sink.clone(), clock.clone());
///
/// let horizon = client.dispatch(&Command::new(
///     "/fader",
///     Action::IntFade { start: 0, end: 5, duration_ms: 1000 },
/// ));
/// assert_eq!(horizon, Duration::from_secs(1));
///
/// clock.advance(horizon);
/// assert_eq!(sink.messages().len(), 6);
/// ```
pub struct OscClient {
    config: OscConfig,
    sink: Arc<dyn Sink>,
    scheduler: Scheduler,
    resolver: Arc<dyn VariableResolver>,
    timer: Option<TokioTimer>,
    udp: Option<Arc<UdpSink>>,
}

impl OscClient {
    /// Create a client over an existing sink and timer
    pub fn new(config: OscConfig, sink: Arc<dyn Sink>, timer: Arc<dyn Timer>) -> Self {
        Self {
            config,
            sink,
            scheduler: Scheduler::new(timer),
            resolver: Arc::new(NoVariables),
            timer: None,
            udp: None,
        }
    }

    /// Create a client sending over UDP to the configured target
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration is invalid
    /// - The target cannot be resolved or the local socket cannot be bound
    /// - Called outside a tokio runtime
    pub async fn connect(config: OscConfig) -> Result<Self, OscError> {
        config.validate().map_err(OscError::InvalidConfig)?;

        let sink = Arc::new(
            UdpSink::connect(config.bind, &config.target.host, config.target.port).await?,
        );
        let timer = TokioTimer::new()?;

        let mut client = Self::new(config, sink.clone(), Arc::new(timer.clone()));
        client.timer = Some(timer);
        client.udp = Some(sink);
        Ok(client)
    }

    /// Use `resolver` for variables in request text
    pub fn with_resolver(mut self, resolver: Arc<dyn VariableResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Resolve and send a request
    ///
    /// Returns how long until the last message of the command is due.
    ///
    /// # Errors
    ///
    /// Returns an error if the request has an invalid path or numeric option;
    /// nothing is sent in that case.
    pub fn execute(&self, request: &CommandRequest) -> Result<Duration, OscError> {
        let command = request.resolve(self.resolver.as_ref())?;
        Ok(self.dispatch(&command))
    }

    /// Send a resolved command: single messages go out now, fades are
    /// scheduled
    pub fn dispatch(&self, command: &Command) -> Duration {
        match command.plan() {
            Dispatch::Now(args) => {
                self.sink.send(&command.path, &args);
                Duration::ZERO
            }
            Dispatch::Fade(plan) => {
                debug!(
                    "Fading {} over {} step(s), {:.3}ms apart",
                    command.path,
                    plan.step_count(),
                    plan.step_delay_ms()
                );
                self.scheduler
                    .schedule(&command.path, plan.emissions(), Arc::clone(&self.sink))
            }
        }
    }

    /// Wait until every scheduled message has been handed to the socket
    ///
    /// Returns immediately for clients not created by
    /// [`connect`](Self::connect).
    pub async fn idle(&self) {
        if let Some(timer) = &self.timer {
            timer.idle().await;
        }
        if let Some(udp) = &self.udp {
            udp.flush().await;
        }
    }

    /// Get reference to the configuration
    pub fn config(&self) -> &OscConfig {
        &self.config
    }
}

/// oscsend error types
#[derive(Debug, thiserror::Error)]
pub enum OscError {
    /// Non-numeric text in a numeric option
    #[error("Invalid numeric parameter {field}: '{text}'")]
    InvalidNumeric { field: &'static str, text: String },

    /// OSC address not starting with `/`
    #[error("Invalid OSC path: '{0}'")]
    InvalidPath(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed OSC packet
    #[error("OSC decode error: {0}")]
    Decode(String),

    /// No async runtime available
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
