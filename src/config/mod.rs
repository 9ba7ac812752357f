//! Configuration module for the voice session client
//!
//! Settings come from .env files, environment variables and an optional YAML
//! file. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Example
//! ```rust,no_run
//! use waav_talk::config::SessionSettings;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let settings = SessionSettings::from_env()?;
//!
//! // Load from YAML file with environment variables as the base
//! let settings = SessionSettings::from_file(&PathBuf::from("config.yaml"))?;
//! println!("Connecting to {}", settings.realtime_endpoint());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use url::Url;

mod yaml;

pub use yaml::YamlConfig;

use crate::core::audio::AudioFormat;
use crate::core::moderation::DEFAULT_MODERATION_MODEL;
use crate::core::realtime::{OPENAI_REALTIME_URL, OpenAIRealtimeModel, OpenAIRealtimeVoice};
use crate::core::session::DEFAULT_INSTRUCTIONS;
use crate::core::stt::DEFAULT_TRANSCRIPTION_MODEL;
use crate::core::stt::openai::OPENAI_API_BASE;

/// Where the capture WAV is written when nothing else is configured.
pub const DEFAULT_RECORDING_PATH: &str = "./audio.wav";

/// Session configuration
///
/// Contains everything needed to run one voice session:
/// - OpenAI credentials and REST base URL
/// - Realtime endpoint, model, voice and response instructions
/// - Transcription and moderation models
/// - Capture/output audio formats and device commands
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub openai_api_key: String,
    /// Base URL of the REST APIs (transcription, moderation)
    pub api_base: String,

    /// Full realtime URL; derived from `realtime_model` when unset
    pub realtime_url: Option<String>,
    pub realtime_model: OpenAIRealtimeModel,
    pub voice: Option<OpenAIRealtimeVoice>,
    pub instructions: String,

    pub transcription_model: String,
    /// ISO-639-1 hint for transcription; auto-detected when unset
    pub transcription_language: Option<String>,
    pub moderation_model: String,
    pub moderation_enabled: bool,

    pub capture_format: AudioFormat,
    pub output_format: AudioFormat,
    /// Command line writing raw PCM16 to stdout (default: SoX `rec`)
    pub capture_command: Option<String>,
    /// Command line reading raw PCM16 from stdin (default: SoX `play`)
    pub playback_command: Option<String>,
    pub recording_path: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            api_base: OPENAI_API_BASE.to_string(),
            realtime_url: None,
            realtime_model: OpenAIRealtimeModel::default(),
            voice: None,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            transcription_language: None,
            moderation_model: DEFAULT_MODERATION_MODEL.to_string(),
            moderation_enabled: true,
            capture_format: AudioFormat::capture_default(),
            output_format: AudioFormat::output_default(),
            capture_command: None,
            playback_command: None,
            recording_path: Some(PathBuf::from(DEFAULT_RECORDING_PATH)),
        }
    }
}

/// Implement Drop to zeroize the API key when the settings are dropped.
impl Drop for SessionSettings {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.openai_api_key.zeroize();
    }
}

impl SessionSettings {
    /// Load settings from environment variables.
    ///
    /// `.env` values are expected to be loaded into the environment already
    /// (see `main.rs`).
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let settings = Self::load_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a YAML file on top of environment variables.
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if the YAML file cannot be read or is malformed,
    /// environment variables have invalid formats, or validation fails.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = YamlConfig::from_file(path)?;

        let mut settings = Self::load_env()?;
        settings.apply_yaml(yaml_config)?;
        settings.validate()?;

        Ok(settings)
    }

    fn load_env() -> Result<Self, String> {
        let mut settings = Self::default();

        if let Some(key) = env_string("OPENAI_API_KEY") {
            settings.openai_api_key = key;
        }
        if let Some(base) = env_string("OPENAI_API_BASE") {
            settings.api_base = base;
        }
        if let Some(url) = env_string("REALTIME_URL") {
            settings.realtime_url = Some(url);
        }
        if let Some(model) = env_string("REALTIME_MODEL") {
            settings.realtime_model = OpenAIRealtimeModel::from_str_or_default(&model);
        }
        if let Some(voice) = env_string("REALTIME_VOICE") {
            settings.voice = Some(parse_voice(&voice)?);
        }
        if let Some(instructions) = env_string("RESPONSE_INSTRUCTIONS") {
            settings.instructions = instructions;
        }
        if let Some(model) = env_string("TRANSCRIPTION_MODEL") {
            settings.transcription_model = model;
        }
        settings.transcription_language = env_string("TRANSCRIPTION_LANGUAGE");
        if let Some(model) = env_string("MODERATION_MODEL") {
            settings.moderation_model = model;
        }
        if let Some(enabled) = env_string("MODERATION_ENABLED") {
            settings.moderation_enabled = parse_bool("MODERATION_ENABLED", &enabled)?;
        }

        if let Some(rate) = env_parse::<u32>("CAPTURE_SAMPLE_RATE")? {
            settings.capture_format.sample_rate = rate;
        }
        if let Some(channels) = env_parse::<u16>("CAPTURE_CHANNELS")? {
            settings.capture_format.channels = channels;
        }
        if let Some(rate) = env_parse::<u32>("OUTPUT_SAMPLE_RATE")? {
            settings.output_format.sample_rate = rate;
        }
        if let Some(channels) = env_parse::<u16>("OUTPUT_CHANNELS")? {
            settings.output_format.channels = channels;
        }
        settings.capture_command = env_string("CAPTURE_COMMAND");
        settings.playback_command = env_string("PLAYBACK_COMMAND");
        if let Some(path) = env_string("RECORDING_PATH") {
            settings.recording_path = Some(PathBuf::from(path));
        }

        Ok(settings)
    }

    fn apply_yaml(&mut self, yaml: YamlConfig) -> Result<(), String> {
        if let Some(openai) = yaml.openai {
            if let Some(key) = openai.api_key {
                self.openai_api_key = key;
            }
            if let Some(base) = openai.api_base {
                self.api_base = base;
            }
        }

        if let Some(realtime) = yaml.realtime {
            if realtime.url.is_some() {
                self.realtime_url = realtime.url;
            }
            if let Some(model) = realtime.model {
                self.realtime_model = OpenAIRealtimeModel::from_str_or_default(&model);
            }
            if let Some(voice) = realtime.voice {
                self.voice = Some(parse_voice(&voice)?);
            }
            if let Some(instructions) = realtime.instructions {
                self.instructions = instructions;
            }
        }

        if let Some(transcription) = yaml.transcription {
            if let Some(model) = transcription.model {
                self.transcription_model = model;
            }
            if transcription.language.is_some() {
                self.transcription_language = transcription.language;
            }
        }

        if let Some(moderation) = yaml.moderation {
            if let Some(enabled) = moderation.enabled {
                self.moderation_enabled = enabled;
            }
            if let Some(model) = moderation.model {
                self.moderation_model = model;
            }
        }

        if let Some(audio) = yaml.audio {
            if let Some(rate) = audio.capture_sample_rate {
                self.capture_format.sample_rate = rate;
            }
            if let Some(channels) = audio.capture_channels {
                self.capture_format.channels = channels;
            }
            if let Some(rate) = audio.output_sample_rate {
                self.output_format.sample_rate = rate;
            }
            if let Some(channels) = audio.output_channels {
                self.output_format.channels = channels;
            }
            if audio.capture_command.is_some() {
                self.capture_command = audio.capture_command;
            }
            if audio.playback_command.is_some() {
                self.playback_command = audio.playback_command;
            }
            if audio.recording_path.is_some() {
                self.recording_path = audio.recording_path;
            }
        }

        Ok(())
    }

    /// Check the settings for values that cannot work.
    pub fn validate(&self) -> Result<(), String> {
        if self.openai_api_key.trim().is_empty() {
            return Err("OPENAI_API_KEY is required".to_string());
        }
        for (name, format) in [
            ("capture", self.capture_format),
            ("output", self.output_format),
        ] {
            if format.sample_rate == 0 {
                return Err(format!("{name} sample rate must be greater than zero"));
            }
            if format.channels == 0 {
                return Err(format!("{name} channel count must be greater than zero"));
            }
        }
        let endpoint = self.realtime_endpoint();
        let url = Url::parse(&endpoint)
            .map_err(|e| format!("Invalid realtime URL '{endpoint}': {e}"))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(format!(
                "Realtime URL must use ws:// or wss://, got {endpoint}"
            ));
        }
        Ok(())
    }

    /// The realtime WebSocket URL to dial.
    pub fn realtime_endpoint(&self) -> String {
        match &self.realtime_url {
            Some(url) => url.clone(),
            None => format!(
                "{}?model={}",
                OPENAI_REALTIME_URL,
                self.realtime_model.as_str()
            ),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, String> {
    match env_string(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("Invalid {key} value: {value}")),
        None => Ok(None),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(format!("Invalid {key} value: {value}")),
    }
}

fn parse_voice(value: &str) -> Result<OpenAIRealtimeVoice, String> {
    OpenAIRealtimeVoice::parse(value).ok_or_else(|| format!("Unknown realtime voice: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const ENV_KEYS: &[&str] = &[
        "OPENAI_API_KEY",
        "OPENAI_API_BASE",
        "REALTIME_URL",
        "REALTIME_MODEL",
        "REALTIME_VOICE",
        "RESPONSE_INSTRUCTIONS",
        "TRANSCRIPTION_MODEL",
        "TRANSCRIPTION_LANGUAGE",
        "MODERATION_MODEL",
        "MODERATION_ENABLED",
        "RECORDING_PATH",
        "CAPTURE_SAMPLE_RATE",
        "CAPTURE_CHANNELS",
        "OUTPUT_SAMPLE_RATE",
        "OUTPUT_CHANNELS",
        "CAPTURE_COMMAND",
        "PLAYBACK_COMMAND",
    ];

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            for key in ENV_KEYS {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-env");
        }

        let settings = SessionSettings::from_env().unwrap();
        assert_eq!(settings.openai_api_key, "sk-env");
        assert_eq!(settings.api_base, "https://api.openai.com/v1");
        assert_eq!(
            settings.realtime_endpoint(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-mini-realtime-preview-2024-12-17"
        );
        assert_eq!(settings.instructions, DEFAULT_INSTRUCTIONS);
        assert_eq!(settings.transcription_model, "whisper-1");
        assert_eq!(settings.transcription_language, None);
        assert_eq!(settings.moderation_model, "omni-moderation-latest");
        assert!(settings.moderation_enabled);
        assert_eq!(settings.capture_format, AudioFormat::pcm16(16000, 1));
        assert_eq!(settings.output_format, AudioFormat::pcm16(24000, 1));
        assert_eq!(
            settings.recording_path,
            Some(PathBuf::from(DEFAULT_RECORDING_PATH))
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_missing_api_key() {
        cleanup_env_vars();

        let err = SessionSettings::from_env().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("REALTIME_MODEL", "gpt-4o-realtime-preview");
            env::set_var("REALTIME_VOICE", "verse");
            env::set_var("MODERATION_ENABLED", "false");
            env::set_var("OUTPUT_SAMPLE_RATE", "48000");
            env::set_var("OUTPUT_CHANNELS", "2");
            env::set_var("PLAYBACK_COMMAND", "aplay -f S16_LE");
            env::set_var("TRANSCRIPTION_LANGUAGE", "de");
        }

        let settings = SessionSettings::from_env().unwrap();
        assert_eq!(
            settings.realtime_model,
            OpenAIRealtimeModel::Gpt4oRealtimePreview
        );
        assert!(settings.realtime_endpoint().ends_with("model=gpt-4o-realtime-preview"));
        assert_eq!(settings.voice, Some(OpenAIRealtimeVoice::Verse));
        assert!(!settings.moderation_enabled);
        assert_eq!(settings.output_format, AudioFormat::pcm16(48000, 2));
        assert_eq!(settings.playback_command.as_deref(), Some("aplay -f S16_LE"));
        assert_eq!(settings.transcription_language.as_deref(), Some("de"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_env_values() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("CAPTURE_SAMPLE_RATE", "fast");
        }
        let err = SessionSettings::from_env().unwrap_err();
        assert!(err.to_string().contains("CAPTURE_SAMPLE_RATE"));

        unsafe {
            env::set_var("CAPTURE_SAMPLE_RATE", "0");
        }
        let err = SessionSettings::from_env().unwrap_err();
        assert!(err.to_string().contains("sample rate"));

        unsafe {
            env::remove_var("CAPTURE_SAMPLE_RATE");
            env::set_var("REALTIME_VOICE", "robot");
        }
        assert!(SessionSettings::from_env().is_err());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("TRANSCRIPTION_MODEL", "env-model");
            env::set_var("MODERATION_MODEL", "env-moderation");
            env::set_var("TRANSCRIPTION_LANGUAGE", "de");
        }

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        let yaml_content = r#"
openai:
  api_key: "sk-yaml"
realtime:
  url: "ws://127.0.0.1:9000/v1/realtime"
  instructions: "Answer in one sentence."
transcription:
  model: "yaml-model"
  language: "fr"
audio:
  capture_command: "arecord -q -f S16_LE -r 16000 -c 1 -t raw"
"#;
        fs::write(&config_path, yaml_content).unwrap();

        let settings = SessionSettings::from_file(&config_path).unwrap();
        assert_eq!(settings.openai_api_key, "sk-yaml");
        assert_eq!(settings.realtime_endpoint(), "ws://127.0.0.1:9000/v1/realtime");
        assert_eq!(settings.instructions, "Answer in one sentence.");
        assert_eq!(settings.transcription_model, "yaml-model");
        assert_eq!(settings.transcription_language.as_deref(), Some("fr"));
        assert_eq!(settings.moderation_model, "env-moderation");
        assert!(settings.capture_command.as_deref().unwrap().starts_with("arecord"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_bad_url() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            "openai:\n  api_key: \"sk\"\nrealtime:\n  url: \"https://example.com\"\n",
        )
        .unwrap();

        let err = SessionSettings::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("ws://"));
    }

    #[test]
    fn test_validate_rejects_unparseable_url() {
        let mut settings = SessionSettings::default();
        settings.openai_api_key = "sk".to_string();
        settings.realtime_url = Some("not a url".to_string());
        assert!(settings.validate().unwrap_err().contains("Invalid realtime URL"));
    }

    #[test]
    fn test_from_file_missing() {
        let result = SessionSettings::from_file(&PathBuf::from("/nonexistent/config.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("K", "Yes"), Ok(true));
        assert_eq!(parse_bool("K", "0"), Ok(false));
        assert!(parse_bool("K", "maybe").is_err());
    }
}
