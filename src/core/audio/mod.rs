//! Audio device adapters.
//!
//! Audio crossing these seams is always raw PCM 16-bit signed little-endian,
//! interleaved when more than one channel is used.
//!
//! - [`CaptureDevice`] produces a stream of PCM chunks until stopped
//! - [`AudioOutput`] consumes PCM chunks and is ended exactly once
//!
//! The default backend drives SoX (`rec` / `play`) as a child process. The
//! `device-audio` feature adds a cpal backend talking to the system devices
//! directly.

mod capture;
#[cfg(feature = "device-audio")]
mod device;
mod playback;

pub use capture::{CaptureDevice, CaptureError, CaptureStream, CommandCapture};
#[cfg(feature = "device-audio")]
pub use device::{CpalCapture, CpalPlayback};
pub use playback::{AudioOutput, CommandPlayback, PlaybackError};

/// Bytes per sample of PCM16.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Capture rate used for speech recognition.
pub const DEFAULT_CAPTURE_SAMPLE_RATE: u32 = 16000;

/// Rate of the realtime model's audio output.
pub const DEFAULT_OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Shape of a PCM16 stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub const fn pcm16(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// 16kHz mono, what the transcription model expects.
    pub const fn capture_default() -> Self {
        Self::pcm16(DEFAULT_CAPTURE_SAMPLE_RATE, 1)
    }

    /// 24kHz mono, what `response.audio.delta` carries.
    pub const fn output_default() -> Self {
        Self::pcm16(DEFAULT_OUTPUT_SAMPLE_RATE, 1)
    }

    pub fn bytes_per_frame(&self) -> usize {
        BYTES_PER_SAMPLE * self.channels as usize
    }

    /// Playback duration of `len` bytes, in milliseconds.
    pub fn duration_ms(&self, len: usize) -> u64 {
        let frames = (len / self.bytes_per_frame().max(1)) as u64;
        frames * 1000 / u64::from(self.sample_rate.max(1))
    }

    /// SoX arguments describing this format on a raw stream.
    pub(crate) fn sox_args(&self) -> Vec<String> {
        vec![
            "-t".to_string(),
            "raw".to_string(),
            "-r".to_string(),
            self.sample_rate.to_string(),
            "-c".to_string(),
            self.channels.to_string(),
            "-e".to_string(),
            "signed-integer".to_string(),
            "-b".to_string(),
            "16".to_string(),
            "-L".to_string(),
        ]
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::capture_default()
    }
}
