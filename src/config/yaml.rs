//! YAML configuration file schema
//!
//! Every section is optional. Values present in the file override the
//! environment.

use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// openai:
///   api_key: "sk-..."
///   api_base: "https://api.openai.com/v1"
///
/// realtime:
///   url: "wss://api.openai.com/v1/realtime?model=gpt-4o-mini-realtime-preview-2024-12-17"
///   model: "gpt-4o-mini-realtime-preview-2024-12-17"
///   voice: "alloy"
///   instructions: "Please assist the user. Keep answers concise."
///
/// transcription:
///   model: "whisper-1"
///
/// moderation:
///   enabled: true
///   model: "omni-moderation-latest"
///
/// audio:
///   capture_sample_rate: 16000
///   capture_channels: 1
///   output_sample_rate: 24000
///   output_channels: 1
///   capture_command: "rec -q -t raw -r 16000 -c 1 -e signed-integer -b 16 -L -"
///   playback_command: "play -q -t raw -r 24000 -c 1 -e signed-integer -b 16 -L -"
///   recording_path: "./audio.wav"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub openai: Option<OpenAIYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub transcription: Option<TranscriptionYaml>,
    pub moderation: Option<ModerationYaml>,
    pub audio: Option<AudioYaml>,
}

/// OpenAI credentials from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAIYaml {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
}

/// Realtime connection settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TranscriptionYaml {
    pub model: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ModerationYaml {
    pub enabled: Option<bool>,
    pub model: Option<String>,
}

/// Audio device settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioYaml {
    pub capture_sample_rate: Option<u32>,
    pub capture_channels: Option<u16>,
    pub output_sample_rate: Option<u32>,
    pub output_channels: Option<u16>,
    pub capture_command: Option<String>,
    pub playback_command: Option<String>,
    pub recording_path: Option<PathBuf>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
