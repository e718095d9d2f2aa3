use std::collections::HashMap;

use log::debug;

use crate::configuration::Config;

/// Everything the executor needs to run one language: which image to boot,
/// what filename the source is staged under, and the command that runs it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSpec {
    pub image: String,
    pub entry_filename: String,
    pub run_command: Vec<String>,
}

/// Resolves a language name to its execution spec. Lookup misses return
/// `None`; the table itself is immutable once the engine is running.
pub trait LanguageRegistry: Send + Sync {
    fn resolve(&self, language: &str) -> Option<ExecutionSpec>;
}

/// In-memory language table, typically built from the configuration file.
pub struct StaticLanguageRegistry {
    entries: HashMap<String, ExecutionSpec>,
}

impl StaticLanguageRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, spec: ExecutionSpec) {
        self.entries.insert(name.to_string(), spec);
    }

    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for (name, lang) in &config.languages {
            registry.register(
                name,
                ExecutionSpec {
                    image: lang.image.clone(),
                    entry_filename: lang.entry_filename.clone(),
                    run_command: lang.run_command.clone(),
                },
            );
        }
        debug!("language registry built with {} entries", registry.entries.len());
        registry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StaticLanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageRegistry for StaticLanguageRegistry {
    fn resolve(&self, language: &str) -> Option<ExecutionSpec> {
        self.entries.get(language).cloned()
    }
}
