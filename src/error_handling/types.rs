use std::fmt;

use crate::session_management::state::SessionState;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    LanguagesEmpty(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::LanguagesEmpty(e) => write!(f, "Language table error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Errors surfaced through a session handle.
///
/// Input write failures are deliberately non-fatal: a failed write leaves the
/// session running and observable, only the write itself is reported.
#[derive(Debug)]
pub enum SessionError {
    NotAcceptingInput(SessionState),
    InputClosed,
    InputIo(std::io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotAcceptingInput(state) => {
                write!(f, "session not accepting input (state={})", state)
            }
            SessionError::InputClosed => write!(f, "session input stream already closed"),
            SessionError::InputIo(e) => write!(f, "session input write failed: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug)]
pub enum ContainerError {
    RuntimeNotAvailable,
    UnknownLanguage(String),
    CreateFailed(String),
    AttachFailed(String),
    IoError(std::io::Error),
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::RuntimeNotAvailable => write!(f, "Container runtime not available"),
            ContainerError::UnknownLanguage(lang) => write!(f, "Unknown language: {}", lang),
            ContainerError::CreateFailed(e) => write!(f, "Container creation failed: {}", e),
            ContainerError::AttachFailed(e) => write!(f, "Container attach failed: {}", e),
            ContainerError::IoError(e) => write!(f, "Container IO error: {}", e),
        }
    }
}

impl std::error::Error for ContainerError {}

impl From<std::io::Error> for ContainerError {
    fn from(err: std::io::Error) -> Self {
        ContainerError::IoError(err)
    }
}

#[derive(Debug)]
pub enum EngineError {
    InvalidRequest(String),
    UnknownLanguage(String),
    SessionNotFound,
    ShutdownTimeout,
    ContainerError(ContainerError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidRequest(e) => write!(f, "Invalid request: {}", e),
            EngineError::UnknownLanguage(lang) => write!(f, "Unknown language: {}", lang),
            EngineError::SessionNotFound => write!(f, "Session not found"),
            EngineError::ShutdownTimeout => {
                write!(f, "Shutdown deadline elapsed with sessions still active")
            }
            EngineError::ContainerError(e) => write!(f, "Container error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ContainerError> for EngineError {
    fn from(err: ContainerError) -> Self {
        EngineError::ContainerError(err)
    }
}
