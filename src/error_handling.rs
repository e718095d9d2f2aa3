//! Error types shared across the crate.
//!
//! Each subsystem owns one error enum; conversions between them are explicit
//! so a caller can always tell which layer a failure came from.

pub mod types;

pub use types::{ConfigError, ContainerError, EngineError, SessionError};
