// ABOUTME: Child process bridge to an out-of-process sandbox worker
// ABOUTME: Manages IPC with the worker via newline-delimited JSON on stdin/stdout

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SandboxError};
use crate::protocol::{WorkerEvent, WorkerRequest};
use crate::session::{SandboxEventSink, SandboxFactory, SandboxSession};

type ReadySignal = Arc<StdMutex<Option<oneshot::Sender<()>>>>;

/// One worker process and the task reading its events
pub struct WorkerBridge {
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    reader: StdMutex<Option<JoinHandle<()>>>,
}

impl WorkerBridge {
    /// Spawn the worker and wait for it to answer the ping handshake
    pub async fn spawn(
        command: &[String],
        sink: Arc<dyn SandboxEventSink>,
        boot_timeout: Duration,
    ) -> Result<Self> {
        let (program, args) = command.split_first().ok_or_else(|| {
            SandboxError::InvalidConfiguration("worker command is empty".to_string())
        })?;

        info!("Starting sandbox worker: {}", command.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandboxError::WorkerStartFailed(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SandboxError::WorkerStartFailed("Failed to capture stdin".to_string()))?;
        let stdout = child.stdout.take().ok_or_else(|| {
            SandboxError::WorkerStartFailed("Failed to capture stdout".to_string())
        })?;

        let (ready_tx, ready_rx) = oneshot::channel();
        let ready: ReadySignal = Arc::new(StdMutex::new(Some(ready_tx)));
        let reader = tokio::spawn(Self::read_events(stdout, sink, ready));

        let bridge = Self {
            child: Mutex::new(Some(child)),
            stdin: Mutex::new(Some(stdin)),
            reader: StdMutex::new(Some(reader)),
        };

        bridge.send(WorkerRequest::Ping).await?;
        match tokio::time::timeout(boot_timeout, ready_rx).await {
            Ok(Ok(())) => {
                debug!("Sandbox worker is ready");
                Ok(bridge)
            }
            Ok(Err(_)) => {
                bridge.kill().await;
                Err(SandboxError::WorkerStartFailed(
                    "worker exited before answering the handshake".to_string(),
                ))
            }
            Err(_) => {
                bridge.kill().await;
                Err(SandboxError::BootTimeout {
                    seconds: boot_timeout.as_secs(),
                })
            }
        }
    }

    /// Check if the worker process is still attached
    pub async fn is_running(&self) -> bool {
        self.child.lock().await.is_some()
    }

    async fn send(&self, request: WorkerRequest) -> Result<()> {
        let mut message = serde_json::to_string(&request)?;
        message.push('\n');

        let mut stdin = self.stdin.lock().await;
        let stdin = stdin.as_mut().ok_or(SandboxError::WorkerNotRunning)?;
        stdin
            .write_all(message.as_bytes())
            .await
            .map_err(|e| SandboxError::Communication(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| SandboxError::Communication(e.to_string()))
    }

    async fn kill(&self) {
        *self.stdin.lock().await = None;

        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill sandbox worker: {}", e);
            }
        }

        let reader = self
            .reader
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(reader) = reader {
            reader.abort();
        }
    }

    /// Read events from worker stdout until it closes
    async fn read_events(stdout: ChildStdout, sink: Arc<dyn SandboxEventSink>, ready: ReadySignal) {
        let mut lines = BufReader::new(stdout).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<WorkerEvent>(&line) {
                        Ok(WorkerEvent::Pong) => {
                            let sender = ready
                                .lock()
                                .unwrap_or_else(|poisoned| poisoned.into_inner())
                                .take();
                            if let Some(sender) = sender {
                                let _ = sender.send(());
                            }
                        }
                        Ok(event) => {
                            event.dispatch(sink.as_ref());
                        }
                        Err(e) => {
                            error!("Failed to parse worker event: {} - Line: {}", e, line);
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read from worker stdout: {}", e);
                    break;
                }
            }
        }

        debug!("Sandbox worker reader task ended");
    }
}

#[async_trait]
impl SandboxSession for WorkerBridge {
    async fn preload(&self, packages: &[String]) -> Result<()> {
        self.send(WorkerRequest::Preload {
            packages: packages.to_vec(),
        })
        .await
    }

    async fn run(&self, code: &str) -> Result<()> {
        self.send(WorkerRequest::Run {
            code: code.to_string(),
        })
        .await
    }

    async fn stop(&self) -> Result<()> {
        self.send(WorkerRequest::Stop).await
    }

    async fn put_file(&self, path: &str, content: &[u8]) -> Result<()> {
        self.send(WorkerRequest::put_file(path, content)).await
    }

    async fn submit_input(&self, text: &str) -> Result<()> {
        self.send(WorkerRequest::Input {
            text: text.to_string(),
        })
        .await
    }

    async fn cancel_input(&self) -> Result<()> {
        self.send(WorkerRequest::CancelInput).await
    }

    async fn clear_output(&self) -> Result<()> {
        self.send(WorkerRequest::ClearOutput).await
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Stopping sandbox worker");
        self.kill().await;
        Ok(())
    }
}

impl Drop for WorkerBridge {
    fn drop(&mut self) {
        // kill_on_drop reaps the child; only the reader needs stopping
        if let Some(reader) = self
            .reader
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            reader.abort();
        }
    }
}

/// Spawns one [`WorkerBridge`] per requested session
#[derive(Debug, Clone)]
pub struct WorkerBridgeFactory {
    command: Vec<String>,
    boot_timeout: Duration,
}

impl WorkerBridgeFactory {
    pub fn new(command: Vec<String>, boot_timeout: Duration) -> Self {
        Self {
            command,
            boot_timeout,
        }
    }
}

#[async_trait]
impl SandboxFactory for WorkerBridgeFactory {
    async fn create(&self, sink: Arc<dyn SandboxEventSink>) -> Result<Arc<dyn SandboxSession>> {
        let bridge = WorkerBridge::spawn(&self.command, sink, self.boot_timeout).await?;
        Ok(Arc::new(bridge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let sink = Arc::new(RecordingSink::default());
        let result = WorkerBridge::spawn(&[], sink, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(SandboxError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_start() {
        let sink = Arc::new(RecordingSink::default());
        let command = vec!["tutor-worker-that-does-not-exist".to_string()];
        let result = WorkerBridge::spawn(&command, sink, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(SandboxError::WorkerStartFailed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_worker_that_never_answers_is_killed() {
        let sink = Arc::new(RecordingSink::default());
        // `cat` echoes our ping back, which is not a valid event
        let command = vec!["cat".to_string()];
        let result = WorkerBridge::spawn(&command, sink, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(SandboxError::BootTimeout { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_events_are_dispatched_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let script = concat!(
            r#"read line; echo '{"type":"pong"}'; "#,
            r#"echo '{"type":"status","status":"ready"}'; "#,
            r#"echo '{"type":"output","text":"1"}'; "#,
            r#"echo '{"type":"terminated"}'; sleep 5"#
        );
        let command = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        let bridge = WorkerBridge::spawn(&command, sink.clone(), Duration::from_secs(5))
            .await
            .unwrap();

        for _ in 0..50 {
            if sink.events().len() >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(
            sink.events(),
            vec![
                "status:ready".to_string(),
                "output:1:true".to_string(),
                "terminated".to_string(),
            ]
        );

        bridge.shutdown().await.unwrap();
        assert!(!bridge.is_running().await);
    }
}
