/// Isolated runtime provisioning.
///
/// One fresh Docker container per test case: no network, a memory
/// ceiling, the scratch workspace bind-mounted read-write as the
/// working directory, stdin fed then closed, wait bounded by the
/// per-test deadline. Whatever happens, the container is force-removed
/// before the call returns; a drop guard backstops panics and task
/// cancellation.
use crate::language::Language;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bollard::container::{
    AttachContainerOptions, Config, CreateContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Mount point of the scratch workspace inside the container.
const SANDBOX_WORKDIR: &str = "/app";

/// What one isolated run produced, before any judging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The process terminated on its own within the deadline.
    Completed {
        exit_code: i64,
        stdout: String,
        stderr: String,
    },
    /// The deadline expired; the instance was forcibly reclaimed.
    TimedOut,
    /// The sandbox reported an execution failure attributable to the
    /// submitted program.
    Crashed { detail: String },
    /// The sandbox itself failed; not a property of the program.
    Infrastructure { detail: String },
}

/// Provisions one isolated runtime instance per call.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    async fn run(&self, language: Language, workdir: &Path, stdin: &str) -> ExecutionOutcome;
}

pub struct DockerSandbox {
    docker: Docker,
    memory_limit_bytes: i64,
    time_limit: Duration,
}

impl DockerSandbox {
    pub fn new(memory_limit_bytes: i64, time_limit: Duration) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("failed to connect to Docker daemon")?;
        Ok(Self {
            docker,
            memory_limit_bytes,
            time_limit,
        })
    }

    async fn run_container(
        &self,
        language: Language,
        workdir: &Path,
        stdin: &str,
    ) -> Result<ExecutionOutcome> {
        let name = format!("gavel-{}", uuid::Uuid::new_v4());

        let config = Config {
            image: Some(language.image().to_string()),
            cmd: Some(language.run_command()),
            working_dir: Some(SANDBOX_WORKDIR.to_string()),
            attach_stdin: Some(true),
            open_stdin: Some(true),
            stdin_once: Some(true),
            network_disabled: Some(true),
            host_config: Some(HostConfig {
                memory: Some(self.memory_limit_bytes),
                binds: Some(vec![format!(
                    "{}:{}:rw",
                    workdir.display(),
                    SANDBOX_WORKDIR
                )]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.as_str(),
                    platform: None,
                }),
                config,
            )
            .await
            .context("failed to create container")?;
        let id = created.id;

        let mut guard = ContainerGuard::new(&self.docker, id.clone());

        self.docker
            .start_container(&id, None::<StartContainerOptions<String>>)
            .await
            .context("failed to start container")?;

        self.feed_stdin(&id, stdin).await;

        let started = Instant::now();
        let mut wait_stream = self
            .docker
            .wait_container(&id, Some(WaitContainerOptions { condition: "not-running" }));

        let exit_code = match tokio::time::timeout(self.time_limit, wait_stream.next()).await {
            Err(_) => {
                debug!(container = %id, deadline_ms = self.time_limit.as_millis() as u64,
                    "deadline expired, reclaiming container");
                drop(wait_stream);
                self.remove(&id).await;
                guard.disarm();
                return Ok(ExecutionOutcome::TimedOut);
            }
            Ok(Some(Ok(response))) => response.status_code,
            // bollard surfaces non-zero exits from the wait endpoint as
            // errors; the code is still the process exit status.
            Ok(Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. }))) => code,
            Ok(Some(Err(e))) => {
                drop(wait_stream);
                self.remove(&id).await;
                guard.disarm();
                return Ok(ExecutionOutcome::Crashed {
                    detail: e.to_string(),
                });
            }
            Ok(None) => {
                drop(wait_stream);
                self.remove(&id).await;
                guard.disarm();
                return Ok(ExecutionOutcome::Crashed {
                    detail: "wait stream ended without a status".to_string(),
                });
            }
        };
        drop(wait_stream);

        let (stdout, stderr) = self.collect_logs(&id).await;
        debug!(container = %id, exit_code,
            elapsed_ms = started.elapsed().as_millis() as u64, "container finished");

        self.remove(&id).await;
        guard.disarm();

        Ok(ExecutionOutcome::Completed {
            exit_code,
            stdout,
            stderr,
        })
    }

    /// Write the test input to the container's stdin and close it. A
    /// program that exits without reading its input produces a broken
    /// pipe here; that is its own business, not a sandbox failure.
    async fn feed_stdin(&self, id: &str, input: &str) {
        let options = AttachContainerOptions::<String> {
            stdin: Some(true),
            stream: Some(true),
            ..Default::default()
        };

        match self.docker.attach_container(id, Some(options)).await {
            Ok(mut attached) => {
                if let Err(e) = attached.input.write_all(input.as_bytes()).await {
                    debug!(container = %id, error = %e, "stdin write cut short");
                }
                if let Err(e) = attached.input.shutdown().await {
                    debug!(container = %id, error = %e, "stdin close failed");
                }
            }
            Err(e) => warn!(container = %id, error = %e, "failed to attach stdin"),
        }
    }

    async fn collect_logs(&self, id: &str) -> (String, String) {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let mut stream = self.docker.logs(id, Some(options));
        let mut stdout = String::new();
        let mut stderr = String::new();

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) => {
                    stdout.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(LogOutput::StdErr { message }) => {
                    stderr.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(container = %id, error = %e, "error reading container logs");
                    break;
                }
            }
        }

        (stdout, stderr)
    }

    /// Force-remove, tolerating an already-gone container.
    async fn remove(&self, id: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        if let Err(e) = self.docker.remove_container(id, Some(options)).await {
            warn!(container = %id, error = %e, "failed to remove container");
        }
    }
}

#[async_trait]
impl SandboxRunner for DockerSandbox {
    async fn run(&self, language: Language, workdir: &Path, stdin: &str) -> ExecutionOutcome {
        match self.run_container(language, workdir, stdin).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "sandbox infrastructure failure");
                ExecutionOutcome::Infrastructure {
                    detail: format!("{:#}", e),
                }
            }
        }
    }
}

/// Removes the container on drop unless the normal path already did.
/// Backstop for panics and task cancellation; removal is spawned
/// because `Drop` cannot await.
struct ContainerGuard<'a> {
    docker: &'a Docker,
    id: String,
    armed: bool,
}

impl<'a> ContainerGuard<'a> {
    fn new(docker: &'a Docker, id: String) -> Self {
        Self {
            docker,
            id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let docker = self.docker.clone();
        let id = self.id.clone();
        tokio::spawn(async move {
            let options = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };
            if let Err(e) = docker.remove_container(&id, Some(options)).await {
                warn!(container = %id, error = %e, "guard failed to remove container");
            }
        });
    }
}
