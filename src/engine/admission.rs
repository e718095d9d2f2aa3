use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::configuration::Config;
use crate::container_management::SandboxExecutor;
use crate::error_handling::types::EngineError;
use crate::language::LanguageRegistry;
use crate::session_management::session::{Session, SessionLimits};
use crate::session_management::SessionRegistry;

/// One execution request as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub language: String,
    pub source: String,
    /// Input lines written to the sandbox right after launch, each
    /// newline-terminated. Interactive input still flows through
    /// `Session::write_input` afterwards.
    pub inputs: Vec<String>,
}

impl StartRequest {
    pub fn new(language: &str, source: &str) -> Self {
        Self {
            language: language.to_string(),
            source: source.to_string(),
            inputs: Vec::new(),
        }
    }
}

/// Admission controller: bounds concurrent sandbox count and owns the live
/// session registry.
///
/// # Fields Overview
///
/// - `executor`: launches sandboxes for admitted sessions.
/// - `languages`: used to reject unknown languages before a session is
///   created (the executor resolves again at launch).
/// - `sessions`: the live session registry; entries are removed as soon as a
///   session reaches a terminal state.
/// - `slots`: the concurrency budget; one running sandbox holds exactly one
///   permit.
/// - `tasks`: one supervised task per admitted session, so shutdown can
///   deterministically wait for all of them.
///
/// Both the slot pool and the registry are process-scoped services owned by
/// this struct — initialized at startup, drained at shutdown, no globals.
pub struct Engine {
    executor: Arc<dyn SandboxExecutor>,
    languages: Arc<dyn LanguageRegistry>,
    sessions: Arc<SessionRegistry>,
    slots: Arc<Semaphore>,
    admission_timeout: Duration,
    limits: SessionLimits,
    tasks: tokio::sync::Mutex<JoinSet<()>>,
}

impl Engine {
    pub fn new(
        config: &Config,
        executor: Arc<dyn SandboxExecutor>,
        languages: Arc<dyn LanguageRegistry>,
    ) -> Self {
        info!(
            "engine initialized with {} execution slots, {:?} admission timeout",
            config.max_sessions,
            config.admission_timeout()
        );
        Self {
            executor,
            languages,
            sessions: Arc::new(SessionRegistry::new()),
            slots: Arc::new(Semaphore::new(config.max_sessions)),
            admission_timeout: config.admission_timeout(),
            limits: SessionLimits::from_config(config),
            tasks: tokio::sync::Mutex::new(JoinSet::new()),
        }
    }

    /// Admits an execution request.
    ///
    /// The session is created in `Pending` state and registered before this
    /// returns, so the caller can start polling or streaming against the id
    /// immediately — launching happens in a supervised background task once a
    /// concurrency slot frees up. Failures past this point (admission
    /// timeout, launch failure) are recorded as terminal session state, not
    /// returned here.
    pub async fn start_session(&self, request: StartRequest) -> Result<Uuid, EngineError> {
        if request.language.trim().is_empty() {
            return Err(EngineError::InvalidRequest(
                "language must not be empty".to_string(),
            ));
        }
        if request.source.trim().is_empty() {
            return Err(EngineError::InvalidRequest(
                "source must not be empty".to_string(),
            ));
        }
        if self.languages.resolve(&request.language).is_none() {
            return Err(EngineError::UnknownLanguage(request.language.clone()));
        }

        let session = Session::new(self.limits);
        let id = session.id;
        self.sessions.add(Arc::clone(&session));
        info!("session {}: admitted ({})", id, request.language);

        let executor = Arc::clone(&self.executor);
        let sessions = Arc::clone(&self.sessions);
        let slots = Arc::clone(&self.slots);
        let admission_timeout = self.admission_timeout;
        self.tasks.lock().await.spawn(async move {
            run_admitted_session(session, request, executor, sessions, slots, admission_timeout)
                .await;
        });

        Ok(id)
    }

    /// Looks up a live session. Sessions disappear from here once they reach
    /// a terminal state.
    pub fn get_session(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.get(id)
    }

    /// Number of currently registered sessions (pending and running).
    pub fn active_sessions(&self) -> usize {
        self.sessions.count()
    }

    /// Waits for every in-flight session task to complete, bounded by
    /// `deadline`. The transport layer is expected to have stopped accepting
    /// new work before this is called; force-killing whatever is still
    /// running after a timeout is the process owner's call, not ours.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), EngineError> {
        let mut tasks = self.tasks.lock().await;
        info!(
            "engine shutdown: draining {} in-flight session tasks",
            tasks.len()
        );
        match tokio::time::timeout(deadline, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        {
            Ok(()) => {
                info!("engine shutdown complete");
                Ok(())
            }
            Err(_) => {
                error!(
                    "engine shutdown deadline of {:?} elapsed with sessions still active",
                    deadline
                );
                Err(EngineError::ShutdownTimeout)
            }
        }
    }
}

/// Drives one admitted session from slot wait to unregistration.
async fn run_admitted_session(
    session: Arc<Session>,
    request: StartRequest,
    executor: Arc<dyn SandboxExecutor>,
    sessions: Arc<SessionRegistry>,
    slots: Arc<Semaphore>,
    admission_timeout: Duration,
) {
    let id = session.id;

    let permit =
        match tokio::time::timeout(admission_timeout, Arc::clone(&slots).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                // The pool only closes when the engine is torn down.
                warn!("session {}: slot pool closed before admission", id);
                session.mark_terminated();
                sessions.remove(&id);
                return;
            }
            Err(_) => {
                warn!(
                    "session {}: no execution slot freed up within {:?}, terminating",
                    id, admission_timeout
                );
                session.mark_terminated();
                sessions.remove(&id);
                return;
            }
        };

    match executor
        .launch(Arc::clone(&session), &request.language, &request.source)
        .await
    {
        Ok(()) => {
            for input in &request.inputs {
                let mut line = input.clone();
                line.push('\n');
                if let Err(e) = session.write_input(line.as_bytes()).await {
                    warn!("session {}: pre-supplied input not delivered: {}", id, e);
                    break;
                }
            }
            session.done().await;
        }
        Err(e) => {
            error!("session {}: sandbox launch failed: {}", id, e);
            session.mark_terminated();
        }
    }

    drop(permit);
    sessions.remove(&id);
    debug!("session {}: slot released, unregistered", id);
}
