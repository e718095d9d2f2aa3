//! kiln — a sandboxed code-execution session engine.
//!
//! kiln runs untrusted, user-submitted code inside short-lived, resource-capped
//! containers and exposes each execution as a stateful *session*: callers feed
//! standard input, read standard output/error incrementally, and observe the
//! terminal outcome. The crate is transport-agnostic; HTTP or WebSocket layers
//! are expected to sit on top of [`engine::Engine`] and the session handles it
//! hands out.
//!
//! Subsystems:
//! - [`session_management`]: the per-execution state machine, bounded output
//!   buffers, and lifecycle timers.
//! - [`container_management`]: the sandbox executor that creates, attaches and
//!   tears down isolated containers.
//! - [`engine`]: admission control — slot-bounded concurrency, registration,
//!   and shutdown draining.
//! - [`language`]: the language lookup table interface consumed by the
//!   executor.
//! - [`configuration`]: TOML-backed runtime configuration.
//! - [`error_handling`]: error types shared across subsystems.

pub mod configuration;
pub mod container_management;
pub mod engine;
pub mod error_handling;
pub mod language;
pub mod session_management;

pub use configuration::Config;
pub use container_management::{DockerExecutor, SandboxExecutor};
pub use engine::{Engine, StartRequest};
pub use error_handling::types::{ConfigError, ContainerError, EngineError, SessionError};
pub use language::{ExecutionSpec, LanguageRegistry, StaticLanguageRegistry};
pub use session_management::{
    OutputStream, Session, SessionLimits, SessionRegistry, SessionState, SessionView,
};
