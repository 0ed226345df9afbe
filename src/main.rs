use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use realtime_bridge::{
    BridgeConfig, BridgeError, BridgeEvent, ConfigOverrides, Direction, Gateway, ParamsUpdate,
    TtsMode, WsConnector,
};

/// Realtime Bridge - JSONL bridge to DashScope realtime ASR and TTS
#[derive(Parser, Debug)]
#[command(name = "realtime-bridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream caller audio in, emit transcripts
    Asr(AsrArgs),

    /// Stream caller text in, emit synthesized audio
    Tts(TtsArgs),
}

/// Flags shared by both bridges
#[derive(Args, Debug)]
struct CommonArgs {
    /// Comma-separated endpoint candidates, tried in order
    #[arg(long = "ws-url", value_name = "URLS")]
    ws_url: Option<String>,

    /// Provider model name
    #[arg(long)]
    model: Option<String>,

    /// Per-endpoint connect timeout
    #[arg(long, value_name = "MS")]
    connect_timeout_ms: Option<u64>,

    /// How long content waits for session readiness
    #[arg(long, value_name = "MS")]
    gate_timeout_ms: Option<u64>,

    /// How long a graceful close waits for the provider
    #[arg(long, value_name = "MS")]
    finish_timeout_ms: Option<u64>,

    /// Also emit every provider frame as a `provider` event
    #[arg(long)]
    forward_raw: bool,
}

impl CommonArgs {
    fn overrides(&self, params: ParamsUpdate) -> ConfigOverrides {
        ConfigOverrides {
            ws_url: self.ws_url.clone(),
            model: self.model.clone(),
            connect_timeout_ms: self.connect_timeout_ms,
            gate_timeout_ms: self.gate_timeout_ms,
            finish_timeout_ms: self.finish_timeout_ms,
            forward_raw: self.forward_raw.then_some(true),
            params,
        }
    }
}

#[derive(Args, Debug)]
struct AsrArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Recognition language
    #[arg(long)]
    language: Option<String>,

    /// Input PCM sample rate
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Context text that biases recognition
    #[arg(long)]
    corpus_text: Option<String>,

    /// Let the provider detect turn boundaries
    #[arg(long)]
    enable_turn_detection: bool,

    #[arg(long)]
    turn_detection_threshold: Option<f32>,

    #[arg(long, value_name = "MS")]
    turn_detection_silence_ms: Option<u32>,
}

impl AsrArgs {
    fn params(&self) -> ParamsUpdate {
        ParamsUpdate {
            language: self.language.clone(),
            sample_rate: self.sample_rate,
            corpus_text: self.corpus_text.clone(),
            enable_turn_detection: self.enable_turn_detection.then_some(true),
            turn_detection_threshold: self.turn_detection_threshold,
            turn_detection_silence_ms: self.turn_detection_silence_ms,
            ..Default::default()
        }
    }
}

#[derive(Args, Debug)]
struct TtsArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Synthesis voice
    #[arg(long)]
    voice: Option<String>,

    /// Commit strategy: server_commit or commit
    #[arg(long, value_parser = parse_mode)]
    mode: Option<TtsMode>,

    /// Language of the input text
    #[arg(long)]
    language_type: Option<String>,

    #[arg(long)]
    sample_rate: Option<u32>,

    #[arg(long)]
    speech_rate: Option<f32>,

    #[arg(long)]
    pitch_rate: Option<f32>,

    #[arg(long)]
    volume: Option<u32>,

    /// Synthesize this text and exit instead of reading stdin
    #[arg(long)]
    text: Option<String>,
}

impl TtsArgs {
    fn params(&self) -> ParamsUpdate {
        ParamsUpdate {
            voice: self.voice.clone(),
            mode: self.mode,
            language_type: self.language_type.clone(),
            sample_rate: self.sample_rate,
            speech_rate: self.speech_rate,
            pitch_rate: self.pitch_rate,
            volume: self.volume,
            ..Default::default()
        }
    }
}

fn parse_mode(raw: &str) -> Result<TtsMode, String> {
    match raw {
        "server_commit" => Ok(TtsMode::ServerCommit),
        "commit" => Ok(TtsMode::Commit),
        other => Err(format!(
            "unknown mode '{other}' (expected server_commit or commit)"
        )),
    }
}

/// Input lines for a one-shot `--text` synthesis.
fn one_shot_input(text: &str, mode: TtsMode) -> String {
    let mut lines = vec![serde_json::json!({ "type": "text", "text": text }).to_string()];
    if mode == TtsMode::Commit {
        lines.push(serde_json::json!({ "type": "commit" }).to_string());
    }
    lines.push(serde_json::json!({ "type": "close" }).to_string());
    lines.join("\n") + "\n"
}

fn load_config(
    direction: Direction,
    path: Option<&PathBuf>,
    overrides: &ConfigOverrides,
) -> Result<BridgeConfig, BridgeError> {
    let mut config = match path {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path.display());
            BridgeConfig::from_file(direction, path)?
        }
        None => BridgeConfig::from_env(direction)?,
    };
    config.apply_overrides(overrides)?;
    config.validate()?;
    Ok(config)
}

/// Report a startup failure on the event stream, the only channel callers read.
fn report_startup_error(err: &BridgeError) {
    match BridgeEvent::error(err.to_string()).to_line() {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::error!("Failed to serialize error event: {}", e),
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let (direction, overrides, one_shot) = match cli.command {
        Commands::Asr(args) => (
            Direction::Asr,
            args.common.overrides(args.params()),
            None,
        ),
        Commands::Tts(args) => {
            let overrides = args.common.overrides(args.params());
            (Direction::Tts, overrides, args.text)
        }
    };

    let config = match load_config(direction, cli.config.as_ref(), &overrides) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            report_startup_error(&e);
            return Ok(e.exit_code());
        }
    };

    tracing::debug!(?config, "Configuration loaded");

    let connector = Arc::new(WsConnector::new(config.api_key.as_str(), config.model.as_str()));
    let gateway = Gateway::from_config(&config, connector);
    let output = tokio::io::stdout();

    let code = match one_shot {
        Some(text) => {
            let input = std::io::Cursor::new(one_shot_input(&text, config.params.mode));
            gateway.run(input, output).await
        }
        None => {
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            gateway.run(input, output).await
        }
    };
    Ok(code)
}

#[tokio::main]
async fn main() {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // stdout carries the event stream; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"));

    let code = match result {
        Ok(()) => match run(cli).await {
            Ok(code) => code,
            Err(e) => {
                tracing::error!("{:#}", e);
                realtime_bridge::errors::EXIT_SESSION_ERROR
            }
        },
        Err(e) => {
            tracing::error!("{:#}", e);
            realtime_bridge::errors::EXIT_SESSION_ERROR
        }
    };

    // Exit explicitly: a pending stdin read would otherwise keep the runtime alive.
    std::process::exit(code);
}
