//! Captured PCM recordings and their WAV encoding

use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;

use crate::core::audio::{AudioFormat, BYTES_PER_SAMPLE};

/// A finished capture: concatenated PCM16 chunks plus their format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pcm: Bytes,
    format: AudioFormat,
}

impl Recording {
    pub fn new(pcm: impl Into<Bytes>, format: AudioFormat) -> Self {
        Self {
            pcm: pcm.into(),
            format,
        }
    }

    pub fn pcm(&self) -> &Bytes {
        &self.pcm
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        self.format.duration_ms(self.pcm.len())
    }

    /// Encode as a RIFF/WAV file in memory. A trailing odd byte is dropped.
    pub fn to_wav(&self) -> Result<Vec<u8>, hound::Error> {
        let spec = hound::WavSpec {
            channels: self.format.channels,
            sample_rate: self.format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut out = Vec::with_capacity(self.pcm.len() + 44);
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut out), spec)?;
            for sample in self.pcm.chunks_exact(BYTES_PER_SAMPLE) {
                writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
            }
            writer.finalize()?;
        }
        Ok(out)
    }

    /// Write the WAV encoding to `path`.
    pub fn save_wav(&self, path: &Path) -> Result<(), hound::Error> {
        let wav = self.to_wav()?;
        std::fs::write(path, wav)?;
        Ok(())
    }
}
