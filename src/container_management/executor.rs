use std::sync::Arc;

use async_trait::async_trait;

use crate::error_handling::types::ContainerError;
use crate::session_management::session::Session;

/// Launches sandboxes on behalf of admitted sessions.
///
/// `launch` returns once the sandbox is up and bound to the session; the
/// implementation keeps pumping output and watching for exit or cancellation
/// in background tasks of its own. A launch error must leave nothing behind:
/// any partially-created sandbox is removed (best effort) before the error is
/// returned, and no handle is ever bound to the session on the error path.
#[async_trait]
pub trait SandboxExecutor: Send + Sync {
    async fn launch(
        &self,
        session: Arc<Session>,
        language: &str,
        source: &str,
    ) -> Result<(), ContainerError>;
}
