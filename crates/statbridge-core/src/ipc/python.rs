//! Interpreter-process backend.
//!
//! Spawns the configured Python interpreter running the embedded bootstrap
//! host loop and speaks the frame protocol over its stdin/stdout. The
//! interpreter handles one command at a time, so the session serializes
//! requests behind a mutex. The child process sits behind its own lock so
//! shutdown never waits for a request in flight.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::registry::WorkerSpec;
use crate::runtime::{Backend, CallEnvelope};

use super::protocol::{HostCommand, HostResponse, read_message, write_message};

/// Host loop executed inside the interpreter.
pub const BOOTSTRAP: &str = include_str!("bootstrap.py");

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Backend that runs worker modules in a Python child process.
#[derive(Debug, Clone)]
pub struct PythonBackend {
    config: RuntimeConfig,
}

impl PythonBackend {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

/// Live interpreter process.
pub struct PythonSession {
    io: tokio::sync::Mutex<SessionIo>,
    child: tokio::sync::Mutex<Child>,
    /// Set while an exchange is outstanding and left set if it never
    /// completed: the stream is no longer frame-aligned.
    broken: AtomicBool,
    /// Set by shutdown.
    closed: AtomicBool,
    pid: Option<u32>,
}

struct SessionIo {
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl PythonSession {
    /// Process ID of the interpreter, if it is still running.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn is_usable(&self) -> bool {
        !self.broken.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    async fn request(&self, cmd: &HostCommand, limit: Duration) -> Result<HostResponse> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Ipc("interpreter session is closed".to_string()));
        }

        let mut io = self.io.lock().await;
        let SessionIo { stdin, stdout } = &mut *io;
        let result = exchange(stdin, stdout, &self.broken, cmd, limit).await;
        drop(io);

        if result.is_err() {
            self.kill().await;
        }
        result
    }

    /// Mark the stream unusable and stop the process.
    async fn poison(&self) {
        self.broken.store(true, Ordering::SeqCst);
        self.kill().await;
    }

    async fn kill(&self) {
        if let Err(e) = self.child.lock().await.start_kill() {
            tracing::debug!("Failed to kill interpreter: {}", e);
        }
    }
}

/// One request/response round trip over a frame stream.
///
/// `broken` is raised before the request is written and lowered only once a
/// full response has been read, so a dropped or failed exchange leaves it
/// raised and every later exchange is refused.
async fn exchange<W, R>(
    writer: &mut W,
    reader: &mut R,
    broken: &AtomicBool,
    cmd: &HostCommand,
    limit: Duration,
) -> Result<HostResponse>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    if broken.swap(true, Ordering::SeqCst) {
        return Err(Error::Ipc("interpreter session is no longer usable".to_string()));
    }

    let round_trip = async {
        write_message(writer, cmd).await?;
        read_message::<_, HostResponse>(reader).await
    };
    let response = match tokio::time::timeout(limit, round_trip).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(Error::Ipc(format!(
                "interpreter did not answer within {}s",
                limit.as_secs()
            )));
        }
    };

    broken.store(false, Ordering::SeqCst);
    Ok(response)
}

impl Backend for PythonBackend {
    type Session = PythonSession;

    async fn start(&self) -> Result<PythonSession> {
        let program = self
            .config
            .resolve_interpreter()
            .map_err(|e| Error::Initialization(e.to_string()))?;

        let mut child = Command::new(&program)
            .args(&self.config.interpreter_args)
            .arg("-u") // unbuffered
            .arg("-c")
            .arg(BOOTSTRAP)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()) // interpreter tracebacks pass through
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Initialization(format!(
                    "Failed to spawn interpreter '{}': {}",
                    program.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Initialization("Failed to get interpreter stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Initialization("Failed to get interpreter stdout".to_string()))?;
        let pid = child.id();

        let session = PythonSession {
            io: tokio::sync::Mutex::new(SessionIo {
                stdin: BufWriter::new(stdin),
                stdout: BufReader::new(stdout),
            }),
            child: tokio::sync::Mutex::new(child),
            broken: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            pid,
        };
        let limit = self.config.startup_timeout();

        match session.request(&HostCommand::Ping, limit).await {
            Ok(HostResponse::Pong) => {}
            Ok(other) => {
                session.poison().await;
                return Err(Error::Initialization(format!(
                    "Unexpected response from interpreter: {:?}",
                    other
                )));
            }
            Err(e) => return Err(Error::Initialization(e.to_string())),
        }

        let init = HostCommand::Init {
            packages: self.config.base_packages.clone(),
        };
        match session.request(&init, limit).await {
            Ok(HostResponse::Ready) => {}
            Ok(HostResponse::Failure { message }) => {
                session.poison().await;
                return Err(Error::Initialization(format!(
                    "base packages failed to import: {}",
                    message
                )));
            }
            Ok(other) => {
                session.poison().await;
                return Err(Error::Initialization(format!(
                    "Unexpected response during init: {:?}",
                    other
                )));
            }
            Err(e) => return Err(Error::Initialization(e.to_string())),
        }

        tracing::debug!(pid = ?pid, interpreter = %program.display(), "interpreter started");
        Ok(session)
    }

    async fn install_worker(&self, session: &PythonSession, worker: &WorkerSpec) -> Result<()> {
        let path = self.config.worker_module_path(worker.id);
        let source = tokio::fs::read_to_string(&path).await.map_err(|e| {
            Error::Ipc(format!("cannot read worker module {}: {}", path.display(), e))
        })?;

        let cmd = HostCommand::LoadWorker {
            worker_id: worker.id,
            packages: worker.packages.clone(),
            source,
        };
        let response = session.request(&cmd, self.config.startup_timeout()).await?;

        match response {
            HostResponse::Loaded { worker_id } if worker_id == worker.id => Ok(()),
            HostResponse::Failure { message } => Err(Error::Ipc(message)),
            other => {
                session.poison().await;
                Err(Error::Ipc(format!(
                    "Unexpected response when loading worker: {:?}",
                    other
                )))
            }
        }
    }

    async fn call(&self, session: &PythonSession, envelope: &CallEnvelope) -> Result<Option<Value>> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let cmd = HostCommand::Call {
            request_id: request_id.clone(),
            worker_id: envelope.worker_id,
            function: envelope.method_id.clone(),
            args: envelope.args.clone(),
        };
        let response = session.request(&cmd, self.config.call_timeout()).await?;

        match response {
            HostResponse::Value {
                request_id: answered,
                value,
            } if answered == request_id => Ok(Some(value)),
            // a raised exception is reported the same way as a returned error map
            HostResponse::Failure { message } => Ok(Some(json!({ "error": message }))),
            other => {
                session.poison().await;
                Err(Error::Ipc(format!(
                    "Unexpected response when calling '{}': {:?}",
                    envelope.method_id, other
                )))
            }
        }
    }

    fn is_alive(&self, session: &PythonSession) -> bool {
        session.is_usable()
    }

    async fn shutdown(&self, session: &PythonSession) {
        session.closed.store(true, Ordering::SeqCst);

        // Ask politely only when no request holds the stream.
        let graceful = match session.io.try_lock() {
            Ok(mut io) if !session.broken.load(Ordering::SeqCst) => {
                let SessionIo { stdin, stdout } = &mut *io;
                matches!(
                    exchange(stdin, stdout, &session.broken, &HostCommand::Shutdown, SHUTDOWN_GRACE)
                        .await,
                    Ok(HostResponse::ShuttingDown)
                )
            }
            _ => false,
        };
        session.broken.store(true, Ordering::SeqCst);

        let mut child = session.child.lock().await;
        if graceful && matches!(tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await, Ok(Ok(_))) {
            return;
        }
        if let Err(e) = child.kill().await {
            tracing::warn!("Failed to kill interpreter: {}", e);
        }
    }
}
