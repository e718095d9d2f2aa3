//! Language lookup table consumed by the sandbox executor.
//!
//! The mapping from a language name to a container image, entry filename and
//! run command is supplied externally; the executor only depends on the
//! [`LanguageRegistry`] trait. [`StaticLanguageRegistry`] is the stock
//! implementation, built from the `[languages]` section of the configuration
//! file.

pub mod registry;

pub use registry::{ExecutionSpec, LanguageRegistry, StaticLanguageRegistry};
