use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::configuration::Config;
use crate::container_management::types::ResourceProfile;
use crate::container_management::SandboxExecutor;
use crate::error_handling::types::ContainerError;
use crate::language::{ExecutionSpec, LanguageRegistry};
use crate::session_management::session::Session;
use crate::session_management::OutputStream;

/// Mount point of the staged source inside the sandbox.
pub const WORKSPACE_DIR: &str = "/workspace";

/// Output is pumped in small chunks so partial lines reach observers as they
/// are produced instead of sitting in a line buffer.
const OUTPUT_CHUNK_SIZE: usize = 4096;

fn short_id(id: &str) -> &str {
    &id[..id.len().min(12)]
}

/// Sandbox executor backed by the `docker` CLI.
///
/// Containers are created with a fixed security profile: no network, a
/// read-only root filesystem with a small writable `/tmp`, all capabilities
/// dropped, no privilege escalation, and hard memory/CPU/process ceilings.
/// The submitted source is staged into a host scratch directory bound at
/// `/workspace`. Stdio stays attached for the session's lifetime: the caller
/// writes the container's stdin, two pump tasks copy its stdout and stderr
/// into the session's buffers, and a watch task races container exit against
/// session cancellation before reclaiming everything.
#[derive(Clone)]
pub struct DockerExecutor {
    docker_binary: String,
    profile: ResourceProfile,
    languages: Arc<dyn LanguageRegistry>,
}

impl DockerExecutor {
    /// Creates a new `DockerExecutor`.
    ///
    /// Returns an error if the configured container runtime is not available
    /// on the host.
    pub fn new(
        config: &Config,
        languages: Arc<dyn LanguageRegistry>,
    ) -> Result<Self, ContainerError> {
        if !Self::is_runtime_available(&config.docker_binary) {
            error!(
                "container runtime '{}' is not available on this system",
                config.docker_binary
            );
            return Err(ContainerError::RuntimeNotAvailable);
        }
        info!("DockerExecutor initialized (runtime: {})", config.docker_binary);
        Ok(Self::with_runtime(
            &config.docker_binary,
            ResourceProfile::from_config(config),
            languages,
        ))
    }

    /// Creates an executor without probing the runtime.
    pub fn with_runtime(
        docker_binary: &str,
        profile: ResourceProfile,
        languages: Arc<dyn LanguageRegistry>,
    ) -> Self {
        Self {
            docker_binary: docker_binary.to_string(),
            profile,
            languages,
        }
    }

    /// Checks whether the container runtime responds on this host.
    fn is_runtime_available(binary: &str) -> bool {
        let available = std::process::Command::new(binary)
            .arg("version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false);
        debug!("runtime availability check ({}): {}", binary, available);
        available
    }

    /// Arguments for `docker create`, carrying the full security and resource
    /// profile. Kept as a separate builder so the profile can be asserted on
    /// without a runtime present.
    pub(crate) fn create_args(&self, spec: &ExecutionSpec, scratch: &Path, name: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "create".into(),
            "--interactive".into(),
            "--name".into(),
            name.into(),
            "--network".into(),
            "none".into(),
            "--read-only".into(),
            "--cap-drop".into(),
            "ALL".into(),
            "--security-opt".into(),
            "no-new-privileges".into(),
            format!("--memory={}m", self.profile.memory_limit_mb),
            format!("--cpus={}", self.profile.cpu_limit),
            format!("--pids-limit={}", self.profile.pids_limit),
            format!(
                "--tmpfs=/tmp:rw,size={}m,noexec,nosuid",
                self.profile.scratch_tmpfs_mb
            ),
            "--volume".into(),
            format!("{}:{}", scratch.display(), WORKSPACE_DIR),
            "--workdir".into(),
            WORKSPACE_DIR.into(),
            spec.image.clone(),
        ];
        args.extend(spec.run_command.iter().cloned());
        args
    }

    /// Creates the container and returns its id.
    async fn create_container(
        &self,
        spec: &ExecutionSpec,
        scratch: &Path,
        name: &str,
    ) -> Result<String, ContainerError> {
        let output = Command::new(&self.docker_binary)
            .args(self.create_args(spec, scratch, name))
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("container create failed for image {}: {}", spec.image, stderr);
            return Err(ContainerError::CreateFailed(stderr));
        }

        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if container_id.is_empty() {
            return Err(ContainerError::CreateFailed(
                "runtime returned no container id".to_string(),
            ));
        }
        debug!("created container {} ({})", short_id(&container_id), name);
        Ok(container_id)
    }

    /// Starts the container with stdio attached, returning the piped child.
    fn spawn_attached(&self, container_id: &str) -> Result<Child, ContainerError> {
        Command::new(&self.docker_binary)
            .arg("start")
            .arg("--attach")
            .arg("--interactive")
            .arg(container_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ContainerError::AttachFailed(format!("failed to spawn attach process: {}", e))
            })
    }

    /// Sends a hard kill to the container. The payload is untrusted and
    /// cannot be relied on to honor a graceful-shutdown request.
    async fn kill_container(&self, container_id: &str) {
        match Command::new(&self.docker_binary)
            .arg("kill")
            .arg(container_id)
            .output()
            .await
        {
            Ok(output) if !output.status.success() => debug!(
                "docker kill {}: {}",
                short_id(container_id),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Ok(_) => debug!("killed container {}", short_id(container_id)),
            Err(e) => warn!(
                "failed to run docker kill for {}: {}",
                short_id(container_id),
                e
            ),
        }
    }

    /// Best-effort container removal. Errors are logged, never propagated: a
    /// session must always be able to reach its terminal state even if
    /// cleanup is imperfect.
    async fn remove_container(&self, container_id: &str) {
        match Command::new(&self.docker_binary)
            .arg("rm")
            .arg("--force")
            .arg(container_id)
            .output()
            .await
        {
            Ok(output) if !output.status.success() => warn!(
                "failed to remove container {}: {}",
                short_id(container_id),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Ok(_) => debug!("removed container {}", short_id(container_id)),
            Err(e) => warn!(
                "failed to run docker rm for {}: {}",
                short_id(container_id),
                e
            ),
        }
    }

    /// Races container exit against session cancellation, then reclaims the
    /// container and the scratch directory unconditionally.
    async fn watch_sandbox(
        &self,
        session: Arc<Session>,
        mut child: Child,
        container_id: String,
        scratch: TempDir,
        pump_out: JoinHandle<()>,
        pump_err: JoinHandle<()>,
    ) {
        let exited;
        tokio::select! {
            status = child.wait() => {
                match status {
                    Ok(code) => info!(
                        "session {}: sandbox {} exited ({})",
                        session.id,
                        short_id(&container_id),
                        code
                    ),
                    Err(e) => warn!(
                        "session {}: error waiting for sandbox {}: {}",
                        session.id,
                        short_id(&container_id),
                        e
                    ),
                }
                exited = true;
            }
            _ = session.cancelled() => {
                info!(
                    "session {}: cancelled, killing sandbox {}",
                    session.id,
                    short_id(&container_id)
                );
                exited = false;
            }
        }

        if !exited {
            self.kill_container(&container_id).await;
            if let Err(e) = child.kill().await {
                debug!("session {}: attach process kill: {}", session.id, e);
            }
        }

        // Let the pumps drain the pipes (they end at EOF, which the container
        // exit or kill above guarantees) so buffered output is in the session
        // before the terminal transition.
        let _ = pump_out.await;
        let _ = pump_err.await;

        if exited {
            session.mark_finished();
        } else {
            session.mark_terminated();
        }

        self.remove_container(&container_id).await;
        if let Err(e) = scratch.close() {
            warn!(
                "session {}: failed to remove scratch directory: {}",
                session.id, e
            );
        }
    }
}

/// Copies sandbox output into the owning session as it arrives. Reads are
/// chunked and never wait for a full buffer or a newline.
fn spawn_output_pump<R>(
    session: Arc<Session>,
    stream: OutputStream,
    mut reader: R,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; OUTPUT_CHUNK_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    debug!("session {}: {} stream closed", session.id, stream);
                    break;
                }
                Ok(n) => session.append_output(stream, &buf[..n]),
                Err(e) => {
                    debug!("session {}: {} read error: {}", session.id, stream, e);
                    break;
                }
            }
        }
    })
}

#[async_trait]
impl SandboxExecutor for DockerExecutor {
    async fn launch(
        &self,
        session: Arc<Session>,
        language: &str,
        source: &str,
    ) -> Result<(), ContainerError> {
        let spec = self
            .languages
            .resolve(language)
            .ok_or_else(|| ContainerError::UnknownLanguage(language.to_string()))?;

        // Stage the source in a process-exclusive scratch directory that the
        // sandbox sees as its workspace.
        let scratch = tempfile::Builder::new().prefix("kiln-").tempdir()?;
        let entry_path = scratch.path().join(&spec.entry_filename);
        std::fs::write(&entry_path, source)?;
        debug!(
            "session {}: staged {} source bytes at {}",
            session.id,
            source.len(),
            entry_path.display()
        );

        let container_name = format!("kiln-{}", session.id);
        let container_id = self
            .create_container(&spec, scratch.path(), &container_name)
            .await?;

        let mut child = match self.spawn_attached(&container_id) {
            Ok(child) => child,
            Err(e) => {
                self.remove_container(&container_id).await;
                return Err(e);
            }
        };

        let (stdin, stdout, stderr) =
            match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
                (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
                _ => {
                    if let Err(e) = child.start_kill() {
                        debug!("session {}: attach process kill: {}", session.id, e);
                    }
                    self.remove_container(&container_id).await;
                    return Err(ContainerError::AttachFailed(
                        "attach process came up without piped stdio".to_string(),
                    ));
                }
            };

        session.bind_sandbox(&container_id, Box::new(stdin)).await;

        let pump_out =
            spawn_output_pump(Arc::clone(&session), OutputStream::Stdout, stdout);
        let pump_err =
            spawn_output_pump(Arc::clone(&session), OutputStream::Stderr, stderr);

        let executor = self.clone();
        tokio::spawn(async move {
            executor
                .watch_sandbox(session, child, container_id, scratch, pump_out, pump_err)
                .await;
        });

        Ok(())
    }
}
