//! Utterance capture and transcription

use std::path::PathBuf;
use std::sync::Arc;

use bytes::BytesMut;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::SessionResult;
use crate::core::audio::{AudioFormat, CaptureDevice, CaptureError};
use crate::core::moderation::Moderator;
use crate::core::stt::{Recording, Transcriber};

/// Records one utterance and turns it into text.
pub struct CaptureSession {
    device: Box<dyn CaptureDevice>,
    transcriber: Arc<dyn Transcriber>,
    moderator: Option<Arc<dyn Moderator>>,
    format: AudioFormat,
    recording_path: Option<PathBuf>,
    device_running: bool,
}

impl CaptureSession {
    pub fn new(device: impl CaptureDevice + 'static, transcriber: Arc<dyn Transcriber>) -> Self {
        Self::from_boxed(Box::new(device), transcriber)
    }

    pub fn from_boxed(device: Box<dyn CaptureDevice>, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            device,
            transcriber,
            moderator: None,
            format: AudioFormat::capture_default(),
            recording_path: None,
            device_running: false,
        }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    /// Advisory moderation of the transcript.
    pub fn with_moderator(mut self, moderator: Arc<dyn Moderator>) -> Self {
        self.moderator = Some(moderator);
        self
    }

    /// Keep a WAV copy of the recording at `path`.
    pub fn with_recording_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.recording_path = Some(path.into());
        self
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Record until `stop` fires (or the device ends its stream), then
    /// transcribe.
    ///
    /// Chunks still in flight when `stop` fires are not part of the recording.
    pub async fn run(&mut self, stop: &CancellationToken) -> SessionResult<String> {
        let recording = self.record(stop).await?;
        info!(
            "Recorded {} bytes ({} ms)",
            recording.pcm().len(),
            recording.duration_ms()
        );

        if let Some(path) = &self.recording_path {
            recording
                .save_wav(path)
                .map_err(|e| CaptureError::Persist(format!("{}: {}", path.display(), e)))?;
            debug!("Recording saved to {}", path.display());
        }

        let text = self.transcriber.transcribe(&recording).await?;
        info!("Transcribed text: {}", text);

        self.moderate(&text).await;
        Ok(text)
    }

    async fn record(&mut self, stop: &CancellationToken) -> SessionResult<Recording> {
        let mut stream = self.device.start(self.format).await?;
        self.device_running = true;
        info!("Recording started");

        let mut buffer = BytesMut::new();
        let outcome = loop {
            tokio::select! {
                biased;

                _ = stop.cancelled() => {
                    info!("Recording stopped");
                    break Ok(());
                }
                chunk = stream.recv() => match chunk {
                    Some(Ok(bytes)) => buffer.extend_from_slice(&bytes),
                    Some(Err(e)) => break Err(e),
                    None => {
                        info!("Capture stream ended");
                        break Ok(());
                    }
                },
            }
        };
        drop(stream);

        let released = self.release().await;
        outcome?;
        released?;

        Ok(Recording::new(buffer.freeze(), self.format))
    }

    /// Stop the capture device if it is still running.
    pub async fn release(&mut self) -> Result<(), CaptureError> {
        if !self.device_running {
            return Ok(());
        }
        self.device_running = false;
        self.device.stop().await
    }

    async fn moderate(&self, text: &str) {
        let Some(moderator) = &self.moderator else {
            return;
        };

        match moderator.classify(text).await {
            Ok(result) => info!(
                flagged = result.flagged,
                categories = ?result.categories,
                "Moderation result"
            ),
            Err(e) => warn!("Moderation check failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::CaptureStream;
    use crate::core::moderation::{ModerationError, ModerationResult};
    use crate::core::session::SessionError;
    use crate::core::stt::TranscriptionError;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Emits `chunks`, then closes the stream.
    struct FiniteDevice {
        chunks: Vec<Result<Bytes, CaptureError>>,
        stops: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl CaptureDevice for FiniteDevice {
        async fn start(&mut self, _format: AudioFormat) -> Result<CaptureStream, CaptureError> {
            let (tx, rx) = mpsc::channel(16);
            for chunk in self.chunks.drain(..) {
                tx.send(chunk).await.unwrap();
            }
            Ok(rx)
        }

        async fn stop(&mut self) -> Result<(), CaptureError> {
            *self.stops.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct LengthTranscriber {
        seen: Arc<Mutex<Option<Recording>>>,
    }

    #[async_trait]
    impl Transcriber for LengthTranscriber {
        async fn transcribe(&self, recording: &Recording) -> Result<String, TranscriptionError> {
            *self.seen.lock().unwrap() = Some(recording.clone());
            Ok(format!("{} bytes", recording.pcm().len()))
        }
    }

    struct FailingTranscriber;

    #[async_trait]
    impl Transcriber for FailingTranscriber {
        async fn transcribe(&self, _recording: &Recording) -> Result<String, TranscriptionError> {
            Err(TranscriptionError::Network("offline".to_string()))
        }
    }

    struct FailingModerator;

    #[async_trait]
    impl Moderator for FailingModerator {
        async fn classify(&self, _text: &str) -> Result<ModerationResult, ModerationError> {
            Err(ModerationError::Network("offline".to_string()))
        }
    }

    fn device(chunks: Vec<Result<Bytes, CaptureError>>) -> (FiniteDevice, Arc<Mutex<usize>>) {
        let stops = Arc::new(Mutex::new(0));
        (
            FiniteDevice {
                chunks,
                stops: stops.clone(),
            },
            stops,
        )
    }

    #[tokio::test]
    async fn test_stream_end_finishes_capture() {
        let (device, stops) = device(vec![
            Ok(Bytes::from_static(&[1, 2])),
            Ok(Bytes::from_static(&[3, 4])),
        ]);
        let seen = Arc::new(Mutex::new(None));
        let mut capture = CaptureSession::new(
            device,
            Arc::new(LengthTranscriber { seen: seen.clone() }),
        );

        let text = capture.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(text, "4 bytes");
        assert_eq!(
            seen.lock().unwrap().as_ref().unwrap().pcm().as_ref(),
            &[1, 2, 3, 4]
        );
        assert_eq!(*stops.lock().unwrap(), 1);

        capture.release().await.unwrap();
        assert_eq!(*stops.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_device_error_is_capture_error() {
        let (device, stops) = device(vec![
            Ok(Bytes::from_static(&[1, 2])),
            Err(CaptureError::Stream("unplugged".to_string())),
        ]);
        let mut capture = CaptureSession::new(
            device,
            Arc::new(LengthTranscriber {
                seen: Arc::new(Mutex::new(None)),
            }),
        );

        let err = capture.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::Capture(CaptureError::Stream(_))));
        assert_eq!(*stops.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_transcription_error_propagates() {
        let (device, _) = device(vec![Ok(Bytes::from_static(&[0, 0]))]);
        let mut capture = CaptureSession::new(device, Arc::new(FailingTranscriber));

        let err = capture.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::Transcription(_)));
    }

    #[tokio::test]
    async fn test_moderation_failure_does_not_alter_text() {
        let (device, _) = device(vec![Ok(Bytes::from_static(&[0, 0]))]);
        let mut capture = CaptureSession::new(
            device,
            Arc::new(LengthTranscriber {
                seen: Arc::new(Mutex::new(None)),
            }),
        )
        .with_moderator(Arc::new(FailingModerator));

        assert_eq!(capture.run(&CancellationToken::new()).await.unwrap(), "2 bytes");
    }

    #[tokio::test]
    async fn test_recording_persisted_as_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        let (device, _) = device(vec![Ok(Bytes::from(vec![0u8; 320]))]);
        let mut capture = CaptureSession::new(
            device,
            Arc::new(LengthTranscriber {
                seen: Arc::new(Mutex::new(None)),
            }),
        )
        .with_recording_path(&path);

        capture.run(&CancellationToken::new()).await.unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.duration(), 160);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_recorder_is_capture_error() {
        use crate::core::audio::CommandCapture;

        let recorder = CommandCapture::new(
            "sh",
            vec![
                "-c".to_string(),
                "printf abcd; echo 'no such device' >&2; exit 2".to_string(),
            ],
        );
        let seen = Arc::new(Mutex::new(None));
        let mut capture = CaptureSession::new(
            recorder,
            Arc::new(LengthTranscriber { seen: seen.clone() }),
        );

        let err = capture.run(&CancellationToken::new()).await.unwrap_err();
        match err {
            SessionError::Capture(CaptureError::Stream(message)) => {
                assert!(message.contains("no such device"), "{message}");
            }
            other => panic!("expected capture error, got {other:?}"),
        }
        // Nothing was transcribed from the partial recording
        assert!(seen.lock().unwrap().is_none());
    }
}
