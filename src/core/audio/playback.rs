//! PCM output devices.

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};

use super::AudioFormat;

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The output device could not be opened
    #[error("Output device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The device was already ended
    #[error("Output device already closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A speaker-like sink for PCM16 audio.
#[async_trait]
pub trait AudioOutput: Send {
    /// Queue one chunk for playback. Chunks play in the order written.
    async fn write(&mut self, pcm: &[u8]) -> Result<(), PlaybackError>;

    /// Flush queued audio and release the device.
    async fn end(&mut self) -> Result<(), PlaybackError>;
}

/// Plays audio by piping raw PCM16 into a child process.
///
/// Defaults to SoX: `play -q -t raw -r <rate> -c <channels> -e signed-integer -b 16 -L -`.
/// The process is started lazily on the first write.
pub struct CommandPlayback {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    ended: bool,
}

impl CommandPlayback {
    pub fn sox(format: AudioFormat) -> Self {
        let mut args = vec!["-q".to_string()];
        args.extend(format.sox_args());
        args.push("-".to_string());
        Self::new("play", args)
    }

    /// Arbitrary command reading raw PCM16 from stdin.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            child: None,
            stdin: None,
            ended: false,
        }
    }

    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    fn spawn(&mut self) -> Result<&mut ChildStdin, PlaybackError> {
        if self.stdin.is_none() {
            tracing::debug!("Starting playback: {} {}", self.program, self.args.join(" "));
            let mut child = Command::new(&self.program)
                .args(&self.args)
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| {
                    PlaybackError::DeviceUnavailable(format!("{}: {}", self.program, e))
                })?;

            self.stdin = child.stdin.take();
            self.child = Some(child);
        }

        self.stdin.as_mut().ok_or_else(|| {
            PlaybackError::DeviceUnavailable("playback process has no stdin".to_string())
        })
    }
}

#[async_trait]
impl AudioOutput for CommandPlayback {
    async fn write(&mut self, pcm: &[u8]) -> Result<(), PlaybackError> {
        if self.ended {
            return Err(PlaybackError::Closed);
        }
        let stdin = self.spawn()?;
        stdin.write_all(pcm).await?;
        Ok(())
    }

    async fn end(&mut self) -> Result<(), PlaybackError> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;

        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush().await?;
            drop(stdin);
        }
        if let Some(mut child) = self.child.take() {
            let status = child.wait().await?;
            tracing::debug!("Playback process exited: {}", status);
        }
        Ok(())
    }
}
