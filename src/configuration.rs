//! Engine configuration subsystem.
//!
//! Runtime parameters are read from a TOML file (or built from [`Config`]'s
//! defaults), validated once at startup, and passed by reference to the
//! components that consume them. The language table — which image, entry
//! filename and run command serve each language name — is part of the
//! configuration so it can be supplied and changed without touching code.

pub mod config;
pub mod types;
#[cfg(test)]
pub mod tests;

pub use config::Config;
pub use types::LanguageConfig;
