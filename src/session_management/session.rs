use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

use crate::configuration::Config;
use crate::error_handling::types::SessionError;
use crate::session_management::{OutputStream, SessionState};

/// Default combined stdout+stderr cap, in bytes.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1 << 20;
/// Default inactivity window before a session is reclaimed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
/// Default grace period after the last observer detaches.
pub const DEFAULT_DETACH_GRACE: Duration = Duration::from_secs(60);

/// Per-session limits, fixed at creation.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub max_output_bytes: usize,
    pub idle_timeout: Duration,
    pub detach_grace: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            detach_grace: DEFAULT_DETACH_GRACE,
        }
    }
}

impl SessionLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_output_bytes: config.max_output_bytes,
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            detach_grace: Duration::from_secs(config.detach_grace_secs),
        }
    }
}

/// Read-only snapshot of a session, suitable for serialization by a polling
/// transport.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub sandbox_id: Option<String>,
    pub observers: usize,
    pub stdout_bytes: usize,
    pub stderr_bytes: usize,
}

/// State, buffers and timer bookkeeping form a single mutual-exclusion
/// domain: a reader can never observe a torn combination such as a terminal
/// state with buffers still being appended to.
struct Inner {
    state: SessionState,
    sandbox_id: Option<String>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    last_activity: Instant,
    observer_count: usize,
    /// Bumped whenever a pending grace timer is superseded (reattach or a new
    /// detach cycle); a timer that wakes up with a stale epoch does nothing.
    grace_epoch: u64,
}

/// One code execution, observable through its state, buffers and completion
/// signal.
///
/// # Fields Overview
///
/// - `id`: opaque identifier, generated at creation, immutable.
/// - `started_at`: wall-clock creation timestamp.
/// - the state machine, output buffers and timer bookkeeping live behind one
///   internal lock.
/// - the sandbox stdin half sits behind a separate async lock so no lock is
///   ever held across an await point.
///
/// Sessions are created in `Pending` by the admission controller, bound to a
/// sandbox by the executor, and mutated concurrently by output pumps, timers
/// and transport-driven calls. Every mutating entry point is safe under
/// arbitrary concurrent invocation.
pub struct Session {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    limits: SessionLimits,
    /// Self-handle for the timer tasks this session spawns.
    weak: Weak<Session>,
    inner: Mutex<Inner>,
    stdin: tokio::sync::Mutex<Option<Box<dyn AsyncWrite + Send + Unpin>>>,
    cancel_tx: watch::Sender<bool>,
    done_tx: watch::Sender<bool>,
}

impl Session {
    /// Creates a new session in `Pending` state.
    pub fn new(limits: SessionLimits) -> Arc<Self> {
        let (cancel_tx, _) = watch::channel(false);
        let (done_tx, _) = watch::channel(false);
        let session = Arc::new_cyclic(|weak| Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            limits,
            weak: weak.clone(),
            inner: Mutex::new(Inner {
                state: SessionState::Pending,
                sandbox_id: None,
                stdout: Vec::new(),
                stderr: Vec::new(),
                last_activity: Instant::now(),
                observer_count: 0,
                grace_epoch: 0,
            }),
            stdin: tokio::sync::Mutex::new(None),
            cancel_tx,
            done_tx,
        });
        debug!("session {}: created", session.id);
        session
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().unwrap().state
    }

    pub fn sandbox_id(&self) -> Option<String> {
        self.inner.lock().unwrap().sandbox_id.clone()
    }

    pub fn observer_count(&self) -> usize {
        self.inner.lock().unwrap().observer_count
    }

    /// Returns a consistent snapshot of the session.
    pub fn view(&self) -> SessionView {
        let inner = self.inner.lock().unwrap();
        SessionView {
            id: self.id,
            state: inner.state,
            started_at: self.started_at,
            sandbox_id: inner.sandbox_id.clone(),
            observers: inner.observer_count,
            stdout_bytes: inner.stdout.len(),
            stderr_bytes: inner.stderr.len(),
        }
    }

    /// Binds the sandbox and its stdin stream to this session, transitioning
    /// `Pending` → `Running` and arming the idle watcher.
    ///
    /// At most one sandbox is ever bound: a second call is refused and leaves
    /// the first binding untouched. If the session reached a terminal state
    /// before the sandbox came up, the binding is recorded (so teardown can
    /// be attributed) but the state does not move and no watcher is armed;
    /// the executor's cancellation race will tear the sandbox down
    /// immediately.
    pub async fn bind_sandbox(
        &self,
        sandbox_id: &str,
        stdin: Box<dyn AsyncWrite + Send + Unpin>,
    ) -> bool {
        let started = {
            let mut inner = self.inner.lock().unwrap();
            if inner.sandbox_id.is_some() {
                warn!(
                    "session {}: refusing to bind sandbox {}, one is already bound",
                    self.id, sandbox_id
                );
                return false;
            }
            inner.sandbox_id = Some(sandbox_id.to_string());
            if inner.state == SessionState::Pending {
                inner.state = SessionState::Running;
                inner.last_activity = Instant::now();
                true
            } else {
                false
            }
        };

        if started {
            info!("session {}: running in sandbox {}", self.id, sandbox_id);
            *self.stdin.lock().await = Some(stdin);
            self.spawn_idle_watcher();
        } else {
            debug!(
                "session {}: sandbox {} bound after terminal state",
                self.id, sandbox_id
            );
        }
        true
    }

    /// Writes caller-supplied bytes to the sandbox's standard input.
    ///
    /// Allowed only while the session accepts input; a rejected write names
    /// the current state. A write error is surfaced to the caller but does
    /// not by itself terminate the session.
    pub async fn write_input(&self, data: &[u8]) -> Result<(), SessionError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.state.accepts_input() {
                return Err(SessionError::NotAcceptingInput(inner.state));
            }
            inner.last_activity = Instant::now();
        }

        let mut stdin = self.stdin.lock().await;
        let writer = stdin.as_mut().ok_or(SessionError::InputClosed)?;
        writer.write_all(data).await.map_err(SessionError::InputIo)?;
        writer.flush().await.map_err(SessionError::InputIo)?;
        debug!("session {}: wrote {} input bytes", self.id, data.len());
        Ok(())
    }

    /// Closes the sandbox's standard input, transitioning `Running` →
    /// `WaitingForInput`. Idempotent; the stream is shut down exactly once.
    pub async fn close_input(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == SessionState::Running {
                info!("session {}: input closed by caller", self.id);
                inner.state = SessionState::WaitingForInput;
            }
        }
        if let Some(mut writer) = self.stdin.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("session {}: stdin shutdown error: {}", self.id, e);
            }
        }
    }

    /// Appends sandbox output to the named buffer.
    ///
    /// Side effects: refreshes the activity timestamp, and if the combined
    /// buffer size now exceeds the cap, synchronously forces termination.
    /// Appends to a session already in a terminal state are dropped.
    pub fn append_output(&self, stream: OutputStream, data: &[u8]) {
        let overflow = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state.is_terminal() {
                debug!(
                    "session {}: dropped {} late bytes on {}",
                    self.id,
                    data.len(),
                    stream
                );
                return;
            }
            match stream {
                OutputStream::Stdout => inner.stdout.extend_from_slice(data),
                OutputStream::Stderr => inner.stderr.extend_from_slice(data),
            }
            inner.last_activity = Instant::now();
            inner.stdout.len() + inner.stderr.len() > self.limits.max_output_bytes
        };

        if overflow {
            warn!(
                "session {}: output limit of {} bytes exceeded, terminating",
                self.id, self.limits.max_output_bytes
            );
            self.stop();
        }
    }

    /// Returns the bytes appended to `stream` since `cursor`, plus the new
    /// cursor value. A cursor past the end of the buffer reads as empty.
    pub fn read_output_since(&self, stream: OutputStream, cursor: usize) -> (Vec<u8>, usize) {
        let inner = self.inner.lock().unwrap();
        let buf = match stream {
            OutputStream::Stdout => &inner.stdout,
            OutputStream::Stderr => &inner.stderr,
        };
        let start = cursor.min(buf.len());
        (buf[start..].to_vec(), buf.len())
    }

    /// Full accumulated stdout as lossy UTF-8, for polling consumers.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().unwrap().stdout).into_owned()
    }

    /// Full accumulated stderr as lossy UTF-8, for polling consumers.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().unwrap().stderr).into_owned()
    }

    /// Marks the session finished (sandbox exited on its own). No-op once
    /// terminal.
    pub fn mark_finished(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state.is_terminal() {
            return;
        }
        info!("session {}: finished", self.id);
        inner.state = SessionState::Finished;
        self.done_tx.send_replace(true);
    }

    /// Marks the session terminated (force-stopped). No-op once terminal.
    pub fn mark_terminated(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state.is_terminal() {
            return;
        }
        info!("session {}: terminated", self.id);
        inner.state = SessionState::Terminated;
        self.done_tx.send_replace(true);
    }

    /// Administrative close. No-op once terminal.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state.is_terminal() {
            return;
        }
        info!("session {}: closed", self.id);
        inner.state = SessionState::Closed;
        self.done_tx.send_replace(true);
    }

    /// Forces termination from any non-terminal state: marks the session
    /// `Terminated` and fires the cancellation signal that drives the
    /// executor's kill-and-reclaim path. Safe to call repeatedly and from any
    /// task; only the first call has an effect.
    pub fn stop(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state.is_terminal() {
                return;
            }
            info!("session {}: stopping (was {})", self.id, inner.state);
            inner.state = SessionState::Terminated;
            self.done_tx.send_replace(true);
        }
        self.cancel_tx.send_replace(true);
    }

    /// Resolves once the session's cancellation signal has fired.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Resolves once the session has reached a terminal state. The signal
    /// fires exactly once; any number of concurrent waiters are released
    /// together, and late waiters resolve immediately.
    pub async fn done(&self) {
        let mut rx = self.done_tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Registers a live observer (e.g. a streaming consumer), cancelling any
    /// pending detach-grace timer.
    pub fn attach_observer(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.observer_count += 1;
        inner.grace_epoch += 1;
        debug!(
            "session {}: observer attached ({} active)",
            self.id, inner.observer_count
        );
        inner.observer_count
    }

    /// Unregisters an observer. When the count drops to zero on a live
    /// session, a grace timer is armed: unless an observer reattaches within
    /// the grace period, the session is stopped. An observer disconnecting is
    /// not by itself a reason to kill an execution, but an abandoned session
    /// must not hold a concurrency slot forever.
    pub fn detach_observer(&self) -> usize {
        let (count, armed) = {
            let mut inner = self.inner.lock().unwrap();
            inner.observer_count = inner.observer_count.saturating_sub(1);
            let armed = if inner.observer_count == 0 && !inner.state.is_terminal() {
                inner.grace_epoch += 1;
                Some(inner.grace_epoch)
            } else {
                None
            };
            (inner.observer_count, armed)
        };

        if let Some(epoch) = armed {
            if let Some(session) = self.weak.upgrade() {
                info!(
                    "session {}: last observer detached, reclaiming in {:?} unless one returns",
                    self.id, self.limits.detach_grace
                );
                let grace = self.limits.detach_grace;
                tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    let fire = {
                        let inner = session.inner.lock().unwrap();
                        inner.grace_epoch == epoch
                            && inner.observer_count == 0
                            && !inner.state.is_terminal()
                    };
                    if fire {
                        info!(
                            "session {}: no observer returned within the grace period, stopping",
                            session.id
                        );
                        session.stop();
                    }
                });
            }
        }
        count
    }

    /// Arms the inactivity watcher. A session that neither produces output
    /// nor receives input for the idle window is presumed stuck or abandoned
    /// and must not hold a concurrency slot indefinitely.
    ///
    /// The watcher re-reads the activity timestamp after every wakeup, so a
    /// wakeup scheduled before an activity refresh simply reschedules itself
    /// instead of firing stale.
    fn spawn_idle_watcher(&self) {
        let session = match self.weak.upgrade() {
            Some(session) => session,
            None => return,
        };
        let idle = self.limits.idle_timeout;
        tokio::spawn(async move {
            loop {
                let deadline = {
                    let inner = session.inner.lock().unwrap();
                    if inner.state.is_terminal() {
                        return;
                    }
                    inner.last_activity + idle
                };
                tokio::time::sleep_until(deadline).await;
                let expired = {
                    let inner = session.inner.lock().unwrap();
                    if inner.state.is_terminal() {
                        return;
                    }
                    Instant::now() >= inner.last_activity + idle
                };
                if expired {
                    info!("session {}: idle for {:?}, stopping", session.id, idle);
                    session.stop();
                    return;
                }
            }
        });
    }
}
