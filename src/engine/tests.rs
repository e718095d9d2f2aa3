#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::io::AsyncReadExt;
    use uuid::Uuid;

    use crate::container_management::SandboxExecutor;
    use crate::engine::{Engine, StartRequest};
    use crate::error_handling::types::{ContainerError, EngineError};
    use crate::language::{ExecutionSpec, StaticLanguageRegistry};
    use crate::session_management::session::Session;
    use crate::session_management::{OutputStream, SessionState};

    /// Executor double. The "language" selects the sandbox behavior:
    /// - `hello`: prints `hi` and exits immediately.
    /// - `sleepy`: runs until the session is cancelled.
    /// - `echo`: copies one chunk of stdin to stdout, then exits.
    /// - `boom`: fails to launch.
    struct MockExecutor {
        launched: AtomicUsize,
    }

    impl MockExecutor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                launched: AtomicUsize::new(0),
            })
        }

        fn launched(&self) -> usize {
            self.launched.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SandboxExecutor for MockExecutor {
        async fn launch(
            &self,
            session: Arc<Session>,
            language: &str,
            _source: &str,
        ) -> Result<(), ContainerError> {
            if language == "boom" {
                return Err(ContainerError::CreateFailed("image unavailable".to_string()));
            }

            let (stdin, mut peer) = tokio::io::duplex(4096);
            session
                .bind_sandbox(&format!("mock-{}", session.id), Box::new(stdin))
                .await;
            self.launched.fetch_add(1, Ordering::SeqCst);

            let behavior = language.to_string();
            tokio::spawn(async move {
                match behavior.as_str() {
                    "hello" => {
                        session.append_output(OutputStream::Stdout, b"hi");
                        session.mark_finished();
                    }
                    "sleepy" => {
                        session.cancelled().await;
                        session.mark_terminated();
                    }
                    "echo" => {
                        let mut buf = [0u8; 256];
                        if let Ok(n) = peer.read(&mut buf).await {
                            session.append_output(OutputStream::Stdout, &buf[..n]);
                        }
                        session.mark_finished();
                    }
                    other => panic!("unexpected mock behavior: {}", other),
                }
            });
            Ok(())
        }
    }

    fn dummy_spec(name: &str) -> ExecutionSpec {
        ExecutionSpec {
            image: format!("mock-{}", name),
            entry_filename: "main.txt".to_string(),
            run_command: vec![name.to_string()],
        }
    }

    fn mock_languages() -> Arc<StaticLanguageRegistry> {
        let mut registry = StaticLanguageRegistry::new();
        for name in ["hello", "sleepy", "echo", "boom"] {
            registry.register(name, dummy_spec(name));
        }
        Arc::new(registry)
    }

    fn build_engine(config: &crate::configuration::Config) -> (Engine, Arc<MockExecutor>) {
        let mock = MockExecutor::new();
        let engine = Engine::new(config, mock.clone(), mock_languages());
        (engine, mock)
    }

    fn config(max_sessions: usize) -> crate::configuration::Config {
        crate::configuration::Config {
            max_sessions,
            ..Default::default()
        }
    }

    async fn wait_for(mut cond: impl FnMut() -> bool, what: &str) {
        for _ in 0..500 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for: {}", what);
    }

    #[tokio::test]
    async fn start_session_rejects_invalid_requests() {
        let (engine, mock) = build_engine(&config(4));

        let err = engine
            .start_session(StartRequest::new("", "print('hi')"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));

        let err = engine
            .start_session(StartRequest::new("hello", "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));

        let err = engine
            .start_session(StartRequest::new("cobol", "DISPLAY 'hi'."))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownLanguage(_)));

        assert_eq!(engine.active_sessions(), 0, "rejections must have no side effects");
        assert_eq!(mock.launched(), 0);
    }

    #[tokio::test]
    async fn start_session_registers_before_the_sandbox_exists() {
        let (engine, _mock) = build_engine(&config(4));

        let id = engine
            .start_session(StartRequest::new("hello", "print('hi')"))
            .await
            .unwrap();

        // The id is live immediately, before the launch task has run.
        let session = engine.get_session(&id).expect("registered synchronously");
        assert_eq!(session.state(), SessionState::Pending);

        wait_for(|| engine.active_sessions() == 0, "session drained").await;
        assert_eq!(session.state(), SessionState::Finished);
        assert_eq!(session.stdout_text(), "hi");
        assert!(engine.get_session(&id).is_none(), "terminal sessions are unregistered");
    }

    #[tokio::test]
    async fn launch_failure_terminates_the_session() {
        let (engine, mock) = build_engine(&config(4));

        let id = engine
            .start_session(StartRequest::new("boom", "whatever"))
            .await
            .unwrap();
        let session = engine.get_session(&id).expect("registered synchronously");

        wait_for(|| engine.active_sessions() == 0, "failed session drained").await;
        assert_eq!(session.state(), SessionState::Terminated);
        assert!(session.sandbox_id().is_none());
        assert_eq!(mock.launched(), 0);
    }

    #[tokio::test]
    async fn pre_supplied_inputs_reach_the_sandbox() {
        let (engine, _mock) = build_engine(&config(4));

        let mut request = StartRequest::new("echo", "cat");
        request.inputs.push("ping".to_string());

        let id = engine.start_session(request).await.unwrap();
        let session = engine.get_session(&id).expect("registered synchronously");

        wait_for(|| engine.active_sessions() == 0, "echo session drained").await;
        assert_eq!(session.state(), SessionState::Finished);
        assert_eq!(session.stdout_text(), "ping\n");
    }

    #[tokio::test]
    async fn slot_pool_bounds_concurrent_sandboxes() {
        let (engine, mock) = build_engine(&config(2));

        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(
                engine
                    .start_session(StartRequest::new("sleepy", "loop forever"))
                    .await
                    .unwrap(),
            );
        }

        let count_in = |ids: &[Uuid], state: SessionState| {
            ids.iter()
                .filter(|id| {
                    engine
                        .get_session(id)
                        .map(|s| s.state() == state)
                        .unwrap_or(false)
                })
                .count()
        };

        wait_for(
            || count_in(&ids, SessionState::Running) == 2,
            "first two sessions bound",
        )
        .await;
        assert_eq!(
            count_in(&ids, SessionState::Pending),
            3,
            "excess sessions must queue in PENDING"
        );

        // Stop running sessions one at a time; a freed slot admits the next
        // queued session, but never more than two run at once.
        for _ in 0..500 {
            if engine.active_sessions() == 0 {
                break;
            }
            assert!(
                count_in(&ids, SessionState::Running) <= 2,
                "slot budget exceeded"
            );
            for id in &ids {
                if let Some(session) = engine.get_session(id) {
                    if session.state() == SessionState::Running {
                        session.stop();
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(engine.active_sessions(), 0, "all sessions must drain");
        assert_eq!(mock.launched(), 5);
        for id in &ids {
            assert!(engine.get_session(id).is_none());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn admission_times_out_without_consuming_a_slot() {
        let config = crate::configuration::Config {
            max_sessions: 1,
            admission_timeout_secs: 120,
            // Keep the occupant alive well past the admission window.
            idle_timeout_secs: 3600,
            ..Default::default()
        };
        let (engine, mock) = build_engine(&config);

        let first = engine
            .start_session(StartRequest::new("sleepy", "loop forever"))
            .await
            .unwrap();
        wait_for(
            || {
                engine
                    .get_session(&first)
                    .map(|s| s.state() == SessionState::Running)
                    .unwrap_or(false)
            },
            "first session running",
        )
        .await;

        let second = engine
            .start_session(StartRequest::new("sleepy", "loop forever"))
            .await
            .unwrap();
        let queued = engine.get_session(&second).expect("registered synchronously");
        assert_eq!(queued.state(), SessionState::Pending);

        tokio::time::advance(Duration::from_secs(121)).await;
        wait_for(
            || engine.get_session(&second).is_none(),
            "queued session reclaimed",
        )
        .await;

        assert_eq!(queued.state(), SessionState::Terminated);
        assert!(queued.sandbox_id().is_none(), "a timed-out session never binds a sandbox");
        assert_eq!(mock.launched(), 1);

        // The occupant was never disturbed.
        let occupant = engine.get_session(&first).expect("still running");
        assert_eq!(occupant.state(), SessionState::Running);
        occupant.stop();
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_sessions() {
        let (engine, _mock) = build_engine(&config(4));

        engine
            .start_session(StartRequest::new("hello", "print('hi')"))
            .await
            .unwrap();

        engine.shutdown(Duration::from_secs(5)).await.unwrap();
        assert_eq!(engine.active_sessions(), 0);
    }

    #[tokio::test]
    async fn shutdown_reports_timeout_with_sessions_still_active() {
        let (engine, _mock) = build_engine(&config(4));

        let id = engine
            .start_session(StartRequest::new("sleepy", "loop forever"))
            .await
            .unwrap();

        let err = engine.shutdown(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, EngineError::ShutdownTimeout));

        // Once the stuck session is stopped, the drain completes.
        engine.get_session(&id).expect("still registered").stop();
        engine.shutdown(Duration::from_secs(5)).await.unwrap();
        assert_eq!(engine.active_sessions(), 0);
    }
}
