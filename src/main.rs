use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use waav_talk::core::audio::{AudioOutput, CaptureDevice, CommandCapture, CommandPlayback};
use waav_talk::{
    AudioPlaybackSink, CaptureSession, OpenAIModerator, SessionOrchestrator, SessionSettings,
    ToolRegistry, WebSocketConnector, WhisperTranscriber,
};

/// WaaV Talk - speak one question, hear the realtime model answer
#[derive(Parser, Debug)]
#[command(name = "waav-talk")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Audio backend used for the microphone and the speaker
    #[arg(long = "audio-backend", value_enum, default_value_t = AudioBackend::Command)]
    audio_backend: AudioBackend,

    /// Skip moderation of the transcript
    #[arg(long = "no-moderation")]
    no_moderation: bool,

    /// Where to keep the WAV copy of the recording
    #[arg(long = "recording", value_name = "PATH")]
    recording: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AudioBackend {
    /// External commands (SoX `rec`/`play` unless configured otherwise)
    Command,
    /// System devices through cpal (requires the `device-audio` feature)
    Cpal,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Must be installed before the first TLS connection
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let mut settings = if let Some(config_path) = &cli.config {
        info!("Loading configuration from {}", config_path.display());
        SessionSettings::from_file(config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        SessionSettings::from_env().map_err(|e| anyhow!(e.to_string()))?
    };
    if cli.no_moderation {
        settings.moderation_enabled = false;
    }
    if let Some(path) = cli.recording.clone() {
        settings.recording_path = Some(path);
    }

    let (device, output) = audio_devices(cli.audio_backend, &settings)?;

    let mut transcriber = WhisperTranscriber::new(settings.openai_api_key.clone())?
        .with_base_url(settings.api_base.clone())
        .with_model(settings.transcription_model.clone());
    if let Some(language) = &settings.transcription_language {
        transcriber = transcriber.with_language(language.clone());
    }

    let mut capture = CaptureSession::from_boxed(device, Arc::new(transcriber))
        .with_format(settings.capture_format);
    if settings.moderation_enabled {
        let moderator = OpenAIModerator::new(settings.openai_api_key.clone())?
            .with_base_url(settings.api_base.clone())
            .with_model(settings.moderation_model.clone());
        capture = capture.with_moderator(Arc::new(moderator));
    }
    if let Some(path) = &settings.recording_path {
        capture = capture.with_recording_path(path.clone());
    }

    let connector =
        WebSocketConnector::new(settings.realtime_endpoint(), settings.openai_api_key.clone());

    let mut orchestrator = SessionOrchestrator::from_parts(
        Box::new(connector),
        capture,
        AudioPlaybackSink::from_boxed(output),
        Arc::new(ToolRegistry::with_builtins()),
    )
    .with_instructions(settings.instructions.clone());
    if let Some(voice) = settings.voice {
        orchestrator = orchestrator.with_voice(voice.as_str());
    }
    drop(settings);

    let stop = CancellationToken::new();
    spawn_enter_listener(std::io::BufReader::new(std::io::stdin()), stop.clone())
        .map_err(|e| anyhow!("Failed to start stdin listener: {}", e))?;

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, shutting down");
            cancel.cancel();
        }
    });

    println!("Speak into the microphone. Press Enter when done.");
    orchestrator
        .start(stop)
        .await
        .map_err(|e| anyhow!("Session failed: {}", e))?;

    Ok(())
}

/// Fire `stop` on the first line read from `input`.
///
/// The read runs on a detached OS thread so a pending read never keeps the
/// runtime, and with it the process, alive after `main` returns.
fn spawn_enter_listener<R>(mut input: R, stop: CancellationToken) -> std::io::Result<()>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("stdin-listener".to_string())
        .spawn(move || {
            let mut line = String::new();
            if let Err(e) = input.read_line(&mut line) {
                warn!("Failed to read stdin: {}", e);
            }
            stop.cancel();
        })?;
    Ok(())
}

fn audio_devices(
    backend: AudioBackend,
    settings: &SessionSettings,
) -> anyhow::Result<(Box<dyn CaptureDevice>, Box<dyn AudioOutput>)> {
    match backend {
        AudioBackend::Command => {
            let capture = match &settings.capture_command {
                Some(command) => CommandCapture::from_command_line(command)
                    .ok_or_else(|| anyhow!("CAPTURE_COMMAND is empty"))?,
                None => CommandCapture::sox(),
            };
            let playback = match &settings.playback_command {
                Some(command) => CommandPlayback::from_command_line(command)
                    .ok_or_else(|| anyhow!("PLAYBACK_COMMAND is empty"))?,
                None => CommandPlayback::sox(settings.output_format),
            };
            Ok((Box::new(capture), Box::new(playback)))
        }
        #[cfg(feature = "device-audio")]
        AudioBackend::Cpal => {
            use waav_talk::core::audio::{CpalCapture, CpalPlayback};
            Ok((
                Box::new(CpalCapture::new()),
                Box::new(CpalPlayback::new(settings.output_format)),
            ))
        }
        #[cfg(not(feature = "device-audio"))]
        AudioBackend::Cpal => Err(anyhow!(
            "the cpal backend requires building with --features device-audio"
        )),
    }
}
