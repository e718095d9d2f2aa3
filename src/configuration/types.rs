use serde::{Deserialize, Serialize};

/// Execution recipe for one language, as written in the configuration file:
///
/// ```toml
/// [languages.python]
/// image = "python:3.12-alpine"
/// entry_filename = "main.py"
/// run_command = ["python", "main.py"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Container image the language runs in.
    pub image: String,
    /// Filename the submitted source is materialized under.
    pub entry_filename: String,
    /// Command executed inside the sandbox workspace.
    pub run_command: Vec<String>,
}
