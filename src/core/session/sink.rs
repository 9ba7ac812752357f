//! Playback sink for decoded response audio

use crate::core::audio::{AudioOutput, PlaybackError};

/// Forwards decoded audio to the output device in submission order.
///
/// Adds no buffering of its own. `end` releases the device once; later calls
/// are no-ops.
pub struct AudioPlaybackSink {
    output: Box<dyn AudioOutput>,
    ended: bool,
    chunks_written: usize,
    bytes_written: usize,
}

impl AudioPlaybackSink {
    pub fn new(output: impl AudioOutput + 'static) -> Self {
        Self::from_boxed(Box::new(output))
    }

    pub fn from_boxed(output: Box<dyn AudioOutput>) -> Self {
        Self {
            output,
            ended: false,
            chunks_written: 0,
            bytes_written: 0,
        }
    }

    pub async fn write(&mut self, pcm: &[u8]) -> Result<(), PlaybackError> {
        if self.ended {
            return Err(PlaybackError::Closed);
        }
        self.output.write(pcm).await?;
        self.chunks_written += 1;
        self.bytes_written += pcm.len();
        Ok(())
    }

    pub async fn end(&mut self) -> Result<(), PlaybackError> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;
        tracing::debug!(
            chunks = self.chunks_written,
            bytes = self.bytes_written,
            "Ending playback"
        );
        self.output.end().await
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }
}
