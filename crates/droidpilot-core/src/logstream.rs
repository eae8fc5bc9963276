//! Live log-line streaming from a spawned log process.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::result::DeviceError;

/// A live sequence of log lines backed by a spawned subprocess.
///
/// A background task reads the process stdout line by line and pushes into
/// a channel. Dropping the stream kills both: the reader task is aborted in
/// `Drop` and the child carries `kill_on_drop`, so no subprocess outlives
/// its subscription. [`LogStream::close`] does the same teardown eagerly
/// and waits for the process to be reaped.
pub struct LogStream {
    rx: mpsc::UnboundedReceiver<String>,
    child: Child,
    reader: JoinHandle<()>,
}

impl LogStream {
    /// Spawn `command` and stream its stdout line by line.
    pub(crate) fn spawn(mut command: Command) -> Result<Self, DeviceError> {
        command.stdout(Stdio::piped()).stderr(Stdio::null()).kill_on_drop(true);
        let mut child = command
            .spawn()
            .map_err(|e| DeviceError::transport("spawn log process", e))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DeviceError::transport("spawn log process", "stdout not captured"))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).is_err() {
                    break;
                }
            }
            debug!("log stream reader finished");
        });

        Ok(Self { rx, child, reader })
    }

    /// Next log line, or `None` once the process has ended.
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Terminate the subprocess and reader task deterministically.
    pub async fn close(mut self) {
        self.reader.abort();
        if let Err(e) = self.child.kill().await {
            debug!("log process already gone: {}", e);
        }
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
