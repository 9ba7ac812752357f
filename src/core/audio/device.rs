//! System audio devices via cpal.
//!
//! cpal streams are not `Send`, so each stream lives on its own thread and
//! talks to the async side through channels.

use std::collections::VecDeque;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::{AudioFormat, AudioOutput, CaptureDevice, CaptureError, CaptureStream, PlaybackError};

const CHUNK_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Capture
// =============================================================================

/// Default input device, converted to mono and resampled to the requested rate.
#[derive(Default)]
pub struct CpalCapture {
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalCapture {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CaptureDevice for CpalCapture {
    async fn start(&mut self, format: AudioFormat) -> Result<CaptureStream, CaptureError> {
        if self.thread.is_some() {
            return Err(CaptureError::DeviceUnavailable(
                "capture already running".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let thread = std::thread::spawn(move || {
            let stream = match open_input(format, tx) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            // Hold the stream alive until stopped
            let _ = stop_rx.recv();
            drop(stream);
            info!("audio capture stopped");
        });

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(CaptureError::DeviceUnavailable(
                    "capture thread exited".to_string(),
                ));
            }
        }

        self.stop_tx = Some(stop_tx);
        self.thread = Some(thread);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            tokio::task::spawn_blocking(move || thread.join())
                .await
                .map_err(|e| CaptureError::Stream(e.to_string()))?
                .map_err(|_| CaptureError::Stream("capture thread panicked".to_string()))?;
        }
        Ok(())
    }
}

fn open_input(
    format: AudioFormat,
    tx: mpsc::Sender<Result<Bytes, CaptureError>>,
) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| CaptureError::DeviceUnavailable("no default input device".into()))?;

    let default_config = device
        .default_input_config()
        .map_err(|e| CaptureError::DeviceUnavailable(format!("no default input config: {e}")))?;

    let native_rate = default_config.sample_rate();
    let native_channels = default_config.channels();
    let stream_config = StreamConfig {
        channels: native_channels,
        sample_rate: native_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    info!(
        "native input config: {}Hz, {} channels -> {}Hz",
        native_rate, native_channels, format.sample_rate
    );

    let data_tx = tx.clone();
    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = to_mono(data, native_channels);
                let samples = resample(&mono, native_rate, format.sample_rate);
                let pcm = encode_pcm16(&samples, format.channels);
                if data_tx.try_send(Ok(Bytes::from(pcm))).is_err() {
                    debug!("audio channel full, dropping chunk");
                }
            },
            move |err| {
                error!("audio input stream error: {err}");
                let _ = tx.try_send(Err(CaptureError::Stream(err.to_string())));
            },
            None,
        )
        .map_err(|e| CaptureError::DeviceUnavailable(format!("failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| CaptureError::DeviceUnavailable(format!("failed to start input stream: {e}")))?;

    Ok(stream)
}

// =============================================================================
// Playback
// =============================================================================

#[derive(Default)]
struct PlaybackBuffer {
    samples: VecDeque<f32>,
    ended: bool,
    drained: bool,
}

/// Default output device. Opened on the first write.
pub struct CpalPlayback {
    format: AudioFormat,
    buffer: Arc<Mutex<PlaybackBuffer>>,
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    ended: bool,
}

impl CpalPlayback {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            buffer: Arc::new(Mutex::new(PlaybackBuffer::default())),
            stop_tx: None,
            thread: None,
            ended: false,
        }
    }

    async fn open(&mut self) -> Result<(), PlaybackError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let buffer = Arc::clone(&self.buffer);
        let format = self.format;

        let thread = std::thread::spawn(move || {
            let stream = match open_output(format, buffer) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));
            let _ = stop_rx.recv();
            drop(stream);
        });

        ready_rx
            .await
            .map_err(|_| PlaybackError::DeviceUnavailable("playback thread exited".to_string()))??;

        self.stop_tx = Some(stop_tx);
        self.thread = Some(thread);
        Ok(())
    }
}

#[async_trait]
impl AudioOutput for CpalPlayback {
    async fn write(&mut self, pcm: &[u8]) -> Result<(), PlaybackError> {
        if self.ended {
            return Err(PlaybackError::Closed);
        }
        if self.thread.is_none() {
            self.open().await?;
        }

        let mut buf = self
            .buffer
            .lock()
            .map_err(|e| PlaybackError::DeviceUnavailable(format!("playback buffer lock poisoned: {e}")))?;
        buf.samples.extend(decode_pcm16(pcm));
        Ok(())
    }

    async fn end(&mut self) -> Result<(), PlaybackError> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;

        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        let buffer = Arc::clone(&self.buffer);
        let stop_tx = self.stop_tx.take();
        tokio::task::spawn_blocking(move || {
            if let Ok(mut buf) = buffer.lock() {
                buf.ended = true;
            }
            // Wait for playback to finish
            loop {
                std::thread::sleep(Duration::from_millis(10));
                match buffer.lock() {
                    Ok(buf) if buf.drained => break,
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
            drop(stop_tx);
            let _ = thread.join();
        })
        .await
        .map_err(|e| PlaybackError::DeviceUnavailable(e.to_string()))?;

        info!("audio playback finished");
        Ok(())
    }
}

fn open_output(
    format: AudioFormat,
    buffer: Arc<Mutex<PlaybackBuffer>>,
) -> Result<cpal::Stream, PlaybackError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PlaybackError::DeviceUnavailable("no default output device".into()))?;

    let stream_config = StreamConfig {
        channels: format.channels,
        sample_rate: format.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut buf = match buffer.lock() {
                    Ok(b) => b,
                    Err(_) => return,
                };
                for sample in data.iter_mut() {
                    *sample = buf.samples.pop_front().unwrap_or(0.0);
                }
                if buf.ended && buf.samples.is_empty() {
                    buf.drained = true;
                }
            },
            move |err| {
                error!("audio output stream error: {err}");
            },
            None,
        )
        .map_err(|e| PlaybackError::DeviceUnavailable(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| PlaybackError::DeviceUnavailable(format!("failed to start output stream: {e}")))?;

    Ok(stream)
}

// =============================================================================
// Sample conversion
// =============================================================================

fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels.max(1) as usize;
    if ch == 1 {
        return data.to_vec();
    }
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Linear-interpolation resampler, adequate for speech.
fn resample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() || dst_rate == 0 {
        return samples.to_vec();
    }

    let ratio = src_rate as f64 / dst_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(samples.len() - 1)];
            let b = samples[(idx + 1).min(samples.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

fn encode_pcm16(samples: &[f32], channels: u16) -> Vec<u8> {
    let channels = channels.max(1) as usize;
    let mut out = Vec::with_capacity(samples.len() * 2 * channels);
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        for _ in 0..channels {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out
}

fn decode_pcm16(pcm: &[u8]) -> impl Iterator<Item = f32> + '_ {
    pcm.chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
}
