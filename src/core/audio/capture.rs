//! PCM capture devices.

use std::process::Stdio;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::AudioFormat;

const READ_CHUNK_SIZE: usize = 4096;
const CHUNK_CHANNEL_CAPACITY: usize = 256;
/// Tail of the recorder's stderr kept for error reports.
const MAX_DIAGNOSTIC_BYTES: usize = 2048;

/// Device-level capture failures.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture device could not be opened
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The device reported an error while streaming
    #[error("Capture stream error: {0}")]
    Stream(String),

    /// Writing the recording to disk failed
    #[error("Failed to persist recording: {0}")]
    Persist(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Chunks produced by a started device. The channel closes when the device
/// stops producing audio.
pub type CaptureStream = mpsc::Receiver<Result<Bytes, CaptureError>>;

/// A microphone-like source of PCM16 audio.
#[async_trait]
pub trait CaptureDevice: Send {
    /// Open the device and start producing chunks in `format`.
    async fn start(&mut self, format: AudioFormat) -> Result<CaptureStream, CaptureError>;

    /// Stop producing chunks and release the device. Stopping a device that
    /// is not running is a no-op.
    async fn stop(&mut self) -> Result<(), CaptureError>;
}

/// Captures audio from a child process writing raw PCM16 to stdout.
///
/// Defaults to SoX: `rec -q -t raw -r <rate> -c <channels> -e signed-integer -b 16 -L -`.
/// A recorder that exits with a failure status before `stop` ends the stream
/// with [`CaptureError::Stream`], carrying the tail of its stderr.
pub struct CommandCapture {
    program: String,
    args: Option<Vec<String>>,
    supervisor: Option<JoinHandle<std::io::Result<()>>>,
    shutdown: CancellationToken,
}

impl CommandCapture {
    /// SoX `rec` with arguments derived from the requested format.
    pub fn sox() -> Self {
        Self {
            program: "rec".to_string(),
            args: None,
            supervisor: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Arbitrary command, used verbatim. It must write raw PCM16 in the
    /// requested format to stdout.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args: Some(args),
            supervisor: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Parse a whitespace separated command line.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    fn command_args(&self, format: AudioFormat) -> Vec<String> {
        match &self.args {
            Some(args) => args.clone(),
            None => {
                let mut args = vec!["-q".to_string()];
                args.extend(format.sox_args());
                args.push("-".to_string());
                args
            }
        }
    }
}

impl Default for CommandCapture {
    fn default() -> Self {
        Self::sox()
    }
}

#[async_trait]
impl CaptureDevice for CommandCapture {
    async fn start(&mut self, format: AudioFormat) -> Result<CaptureStream, CaptureError> {
        if self.supervisor.is_some() {
            return Err(CaptureError::DeviceUnavailable(
                "capture already running".to_string(),
            ));
        }

        let args = self.command_args(format);
        tracing::debug!("Starting capture: {} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::DeviceUnavailable(format!("{}: {}", self.program, e)))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            CaptureError::DeviceUnavailable("capture process has no stdout".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            CaptureError::DeviceUnavailable("capture process has no stderr".to_string())
        })?;

        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        self.shutdown = CancellationToken::new();
        self.supervisor = Some(tokio::spawn(supervise(
            self.program.clone(),
            child,
            stdout,
            stderr,
            tx,
            self.shutdown.clone(),
        )));
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        let Some(supervisor) = self.supervisor.take() else {
            return Ok(());
        };

        self.shutdown.cancel();
        supervisor
            .await
            .map_err(|e| CaptureError::Stream(format!("capture task failed: {e}")))??;
        tracing::debug!("Capture process stopped");
        Ok(())
    }
}

/// Pump the recorder's stdout into `tx`, then report how it exited.
///
/// A shutdown request kills the process and is never reported as an error.
async fn supervise(
    program: String,
    mut child: Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
    tx: mpsc::Sender<Result<Bytes, CaptureError>>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let drained = tokio::select! {
        biased;

        _ = shutdown.cancelled() => None,
        (_, diagnostics) = async { tokio::join!(pump(stdout, &tx), collect_tail(stderr)) } => {
            Some(diagnostics)
        }
    };
    let Some(diagnostics) = drained else {
        return kill(&mut child).await;
    };

    let status = tokio::select! {
        biased;

        _ = shutdown.cancelled() => return kill(&mut child).await,
        status = child.wait() => status?,
    };

    if !status.success() {
        let diagnostics = String::from_utf8_lossy(&diagnostics);
        let diagnostics = diagnostics.trim();
        let mut message = format!("{program} exited with {status}");
        if !diagnostics.is_empty() {
            message.push_str(": ");
            message.push_str(diagnostics);
        }
        tracing::error!("Capture process failed: {}", message);
        let _ = tx.send(Err(CaptureError::Stream(message))).await;
    }
    Ok(())
}

async fn pump(mut stdout: ChildStdout, tx: &mpsc::Sender<Result<Bytes, CaptureError>>) {
    let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
    loop {
        buf.reserve(READ_CHUNK_SIZE);
        match stdout.read_buf(&mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(Ok(buf.split().freeze())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(CaptureError::Io(e))).await;
                break;
            }
        }
    }
}

/// Read `reader` to the end, keeping the last bytes only.
async fn collect_tail(mut reader: impl AsyncRead + Unpin) -> Vec<u8> {
    let mut tail = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > MAX_DIAGNOSTIC_BYTES {
                    tail.drain(..tail.len() - MAX_DIAGNOSTIC_BYTES);
                }
            }
        }
    }
    tail
}

async fn kill(child: &mut Child) -> std::io::Result<()> {
    if let Err(e) = child.start_kill() {
        tracing::debug!("Capture process already exited: {}", e);
    }
    child.wait().await.map(|_| ())
}
