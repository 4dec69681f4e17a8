//! Remote program session controller
//!
//! Mediates between user intent (run, stop, send input), the streamed output
//! of the remote executor, and the presentation layer. The controller owns
//! its [`Session`] outright and is driven by one task: user actions are
//! method calls, transport events and timers are pulled through
//! [`RemoteSessionController::next_event`] and applied with
//! [`RemoteSessionController::handle_event`]. Handlers never interleave, so
//! session state needs no locking.
//!
//! # Lifecycle
//!
//! ```text
//!  Idle ──run (connected)──────────────▶ Running ──stop──▶ Stopping
//!   │                                     ▲  │                │
//!   └─run (disconnected)─▶ Connecting ────┘  │ completion     │ grace delay
//!                            │ retry failed  ▼                ▼
//!                            └─────────────▶ Idle ◀───────────┘
//! ```
//!
//! A mid-run disconnect does not leave `Running`: whether the remote process
//! survived is unknown and is not reconciled on reconnect.

use tokio::time::Instant;

use cl_core::config::{ClientConfig, SessionTimings};
use cl_core::traits::{Presentation, Transport, TransportEvent, TransportEvents};
use cl_core::{Controls, SessionState};
use cl_protocol::{ClientMessage, ConnectionId};

use crate::detect::{looks_like_prompt, CompletionDetector, MarkerCompletionDetector};
use crate::session::Session;
use crate::timer::{SessionTimers, Timer, TimerKind};

/// Something the controller must react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Event from the current transport connection
    Transport(TransportEvent),
    /// A timer came due
    Timer(Timer),
}

/// Owns the lifecycle of remote program runs for one client
pub struct RemoteSessionController<T, P> {
    transport: T,
    presentation: P,
    detector: Box<dyn CompletionDetector>,
    session: Session,
    timings: SessionTimings,
    max_connect_failures: u32,
    events: Option<TransportEvents>,
    timers: SessionTimers,
}

impl<T: Transport, P: Presentation> RemoteSessionController<T, P> {
    /// Create a controller in the idle, disconnected state
    ///
    /// Nothing is connected until [`connect`](Self::connect) is called.
    pub fn new(transport: T, presentation: P, config: &ClientConfig) -> Self {
        Self {
            transport,
            presentation,
            detector: Box::new(MarkerCompletionDetector::new()),
            session: Session::new(),
            timings: config.timings,
            max_connect_failures: config.max_connect_failures,
            events: None,
            timers: SessionTimers::new(),
        }
    }

    /// Replace the completion heuristic
    pub fn with_detector(mut self, detector: impl CompletionDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    /// Read-only view of the session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.session.state
    }

    /// The presentation sink
    pub fn presentation(&self) -> &P {
        &self.presentation
    }

    /// The presentation sink, mutably
    pub fn presentation_mut(&mut self) -> &mut P {
        &mut self.presentation
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Tear down any connection and open a fresh one
    ///
    /// Calling this while connected forces a clean reconnect; there is never
    /// more than one live connection.
    pub fn connect(&mut self) {
        tracing::debug!(
            previous = ?self.session.connection_id,
            "Opening transport connection"
        );
        self.session.connection_id = None;
        self.events = Some(self.transport.connect());
    }

    /// Manual reconnect requested by the user
    pub fn reconnect(&mut self) {
        self.presentation.output_append("\nManually reconnecting...\n");
        self.presentation.controls_changed(Controls::DISCONNECTED);
        self.session.retry_count = 0;
        self.connect();
    }

    /// Run whatever the editor currently holds
    pub async fn run_from_editor(&mut self) {
        let source = self.presentation.source_text();
        self.submit_run(&source).await;
    }

    /// Run action: start a run, or stop the current one
    pub async fn submit_run(&mut self, source: &str) {
        match self.session.state {
            SessionState::Running => {
                tracing::debug!("Run requested while running, stopping instead");
                return self.request_stop().await;
            }
            SessionState::Stopping => {
                self.presentation
                    .transient_notice("Program is stopping, please wait");
                return;
            }
            SessionState::Connecting => {
                self.presentation
                    .transient_notice("Still waiting for the server connection");
                return;
            }
            SessionState::Idle => {}
        }

        let code = source.trim();
        if code.is_empty() {
            self.presentation.recoverable_error("No code to run");
            return;
        }

        if !self.session.is_connected() {
            self.presentation
                .output_append("Not connected to server. Attempting to reconnect...\n");
            self.connect();
            let epoch = self.session.advance_epoch();
            self.timers.schedule(
                TimerKind::RunRetry {
                    source: code.to_string(),
                },
                epoch,
                self.timings.run_retry_delay,
            );
            self.set_state(SessionState::Connecting);
            return;
        }

        self.dispatch_run(code.to_string()).await;
    }

    /// Stop the running program
    ///
    /// Sends one kill and forces the session idle once the stop grace delay
    /// has elapsed, whether or not the executor confirms.
    pub async fn request_stop(&mut self) {
        match self.session.state {
            SessionState::Idle => {
                self.presentation.transient_notice("No running program to stop");
                return;
            }
            SessionState::Connecting => {
                self.session.advance_epoch();
                self.set_state(SessionState::Idle);
                self.presentation.transient_notice("Pending run cancelled");
                return;
            }
            SessionState::Stopping => {
                tracing::debug!("Stop already in progress");
                return;
            }
            SessionState::Running => {}
        }

        if !self.session.is_connected() {
            self.presentation.recoverable_error("Not connected to server");
            self.reconnect();
            return;
        }

        self.set_state(SessionState::Stopping);
        if let Err(e) = self.transport.send(ClientMessage::Kill {}).await {
            tracing::warn!(error = %e, "Failed to send kill");
            self.presentation
                .recoverable_error(&format!("Failed to send stop request: {}", e));
        }
        self.presentation.output_append("\nStopping program...\n");
        self.timers.schedule(
            TimerKind::StopGrace,
            self.session.epoch,
            self.timings.stop_grace,
        );
    }

    /// Forward one line of input to the running program
    pub async fn submit_input(&mut self, text: &str) {
        if !self.session.is_connected() {
            self.presentation.recoverable_error("Not connected to server");
            return;
        }
        if self.session.state != SessionState::Running {
            tracing::debug!(state = %self.session.state, "No program running, dropping input");
            return;
        }

        let data = format!("{}\n", text);
        if let Err(e) = self.transport.send(ClientMessage::Input { data }).await {
            tracing::warn!(error = %e, "Failed to send input");
            self.presentation
                .recoverable_error(&format!("Failed to send input: {}", e));
        }
    }

    /// Wait for the next transport event or due timer
    ///
    /// Returns `None` once nothing further can happen: no connection stream
    /// is open and no timer is armed. Cancel-safe.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if self.events.is_none() && self.timers.is_empty() {
                return None;
            }

            tokio::select! {
                event = recv_event(&mut self.events), if self.events.is_some() => match event {
                    Some(event) => return Some(SessionEvent::Transport(event)),
                    None => {
                        tracing::debug!("Transport event stream ended");
                        self.events = None;
                    }
                },
                Some(timer) = self.timers.next_due(), if !self.timers.is_empty() => {
                    return Some(SessionEvent::Timer(timer));
                }
                else => return None,
            }
        }
    }

    /// Apply one event to the session
    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Transport(event) => self.on_transport_event(event),
            SessionEvent::Timer(timer) => self.on_timer(timer).await,
        }
    }

    /// Wait for and apply the next event; false when nothing is left
    pub async fn step(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.handle_event(event).await;
                true
            }
            None => false,
        }
    }

    async fn dispatch_run(&mut self, code: String) {
        self.presentation.output_clear();
        self.presentation
            .output_append("Compiling and running your code...\n");

        tracing::debug!(bytes = code.len(), "Sending run");
        if let Err(e) = self.transport.send(ClientMessage::Run { code }).await {
            tracing::warn!(error = %e, "Failed to send run");
            self.presentation
                .recoverable_error(&format!("Failed to start program: {}", e));
            self.set_state(SessionState::Idle);
            return;
        }

        let epoch = self.session.advance_epoch();
        self.detector.reset();
        self.session.failsafe_deadline = Some(Instant::now() + self.timings.failsafe);
        self.timers
            .schedule(TimerKind::Failsafe, epoch, self.timings.failsafe);
        self.set_state(SessionState::Running);
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { id } => self.on_connected(id),
            TransportEvent::Disconnected { reason } => self.on_disconnect(&reason),
            TransportEvent::ConnectError { error } => self.on_connect_error(&error),
            TransportEvent::Reconnected { attempt } => self.on_reconnect(attempt),
            TransportEvent::Output(chunk) => self.on_output(&chunk),
            TransportEvent::Exited { code } => self.on_exit(code),
        }
    }

    fn on_connected(&mut self, id: ConnectionId) {
        tracing::info!(connection = %id, "Connected to executor");
        self.session.retry_count = 0;
        self.session.connection_id = Some(id);
        self.presentation.controls_changed(Controls::CONNECTED);
        self.presentation.transient_notice("Connected");
    }

    fn on_disconnect(&mut self, reason: &str) {
        tracing::warn!(reason, state = %self.session.state, "Disconnected from executor");
        self.session.connection_id = None;
        if self.session.retry_count < self.max_connect_failures {
            self.presentation
                .recoverable_error(&format!("Connection lost ({}), reconnecting...", reason));
        }
        self.presentation.controls_changed(Controls::DISCONNECTED);
        self.session.retry_count += 1;
    }

    fn on_connect_error(&mut self, error: &str) {
        self.session.connection_id = None;
        self.session.retry_count += 1;
        tracing::warn!(error, attempts = self.session.retry_count, "Connection attempt failed");

        if self.session.retry_count >= self.max_connect_failures {
            self.presentation.fatal_connection_error(&format!(
                "Failed to connect after {} attempts. Reconnect to try again.",
                self.max_connect_failures
            ));
            self.presentation
                .controls_changed(Controls::RECONNECT_REQUIRED);
        } else {
            self.presentation.transient_notice(&format!(
                "Connection attempt {} failed, retrying...",
                self.session.retry_count
            ));
        }
    }

    fn on_reconnect(&mut self, attempt: u32) {
        tracing::info!(attempt, "Reconnected to executor");
        self.session.retry_count = 0;
        self.presentation.controls_changed(Controls::CONNECTED);
        if self.session.state != SessionState::Running {
            self.presentation.transient_notice("Reconnected successfully!");
        }
    }

    fn on_output(&mut self, chunk: &str) {
        self.presentation.output_append(chunk);

        if self.session.state == SessionState::Running && looks_like_prompt(chunk) {
            tracing::debug!("Program appears to be waiting for input");
            self.presentation.input_requested();
        }

        if self.session.state.is_active() && self.detector.observe(chunk) {
            tracing::debug!("Completion marker seen in output");
            self.declare_completion();
        }
    }

    fn on_exit(&mut self, code: Option<i32>) {
        tracing::debug!(?code, "Executor reported program exit");
        if self.session.state.is_active() {
            self.declare_completion();
        }
    }

    fn declare_completion(&mut self) {
        if self.session.completion_pending {
            return;
        }
        self.session.completion_pending = true;
        self.timers.schedule(
            TimerKind::CompletionReset,
            self.session.epoch,
            self.timings.completion_debounce,
        );
    }

    async fn on_timer(&mut self, timer: Timer) {
        if timer.epoch != self.session.epoch {
            tracing::trace!(
                kind = ?timer.kind,
                timer_epoch = timer.epoch,
                epoch = self.session.epoch,
                "Ignoring stale timer"
            );
            return;
        }

        match timer.kind {
            TimerKind::RunRetry { source } => {
                if self.session.state != SessionState::Connecting {
                    return;
                }
                if self.session.is_connected() {
                    self.dispatch_run(source).await;
                } else {
                    self.set_state(SessionState::Idle);
                    self.presentation.fatal_connection_error(
                        "Failed to reconnect. Reconnect manually and try again.",
                    );
                    self.presentation
                        .controls_changed(Controls::RECONNECT_REQUIRED);
                }
            }
            TimerKind::Failsafe => {
                if self.session.state == SessionState::Running {
                    tracing::warn!("Run exceeded failsafe duration");
                    self.session.failsafe_deadline = None;
                    self.presentation.long_running(self.timings.failsafe);
                }
            }
            TimerKind::CompletionReset | TimerKind::StopGrace => self.settle_idle(),
        }
    }

    fn settle_idle(&mut self) {
        if self.session.state == SessionState::Idle {
            return;
        }
        self.session.failsafe_deadline = None;
        self.set_state(SessionState::Idle);
    }

    fn set_state(&mut self, state: SessionState) {
        if self.session.state == state {
            return;
        }
        tracing::debug!(from = %self.session.state, to = %state, "Session state change");
        self.session.state = state;
        self.presentation.state_changed(state);
    }
}

async fn recv_event(events: &mut Option<TransportEvents>) -> Option<TransportEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}
