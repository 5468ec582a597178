use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use booth_agent::{BoothController, BoothDeps, BoothEvent};
use booth_core::config::Config;
use booth_live::GeminiConnector;
use booth_media::{
    Camera, Microphone, NullSpeaker, SilentMicrophone, Speaker, SpoolCamera, SyntheticCamera,
};
use booth_tools::{HttpResolver, IdentityResolver, S3HttpStore, SpoolTv, StaticResolver};

#[derive(Parser)]
#[command(
    name = "booth",
    about = "Festival photobooth kiosk — QR check-in, live voice agent, photo tools",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the kiosk until interrupted
    Run {
        /// Use synthetic devices instead of hardware (rehearsal mode)
        #[arg(long)]
        synthetic: bool,

        /// QR payload the synthetic camera presents
        #[arg(long, default_value = "REHEARSAL", requires = "synthetic")]
        qr_payload: String,
    },

    /// Show the effective configuration
    Config,

    /// Show kiosk status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;

    // Precedence: RUST_LOG, then -v, then the config file.
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.log_level().unwrap_or_else(|| "info".to_string())
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    match cli.command {
        Commands::Run {
            synthetic,
            qr_payload,
        } => {
            let config = Arc::new(config);
            let deps = build_deps(&config, synthetic, &qr_payload)?;
            let (controller, events_rx) = BoothController::new(config, deps);

            tokio::spawn(log_events(events_rx));

            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received, shutting down");
                    interrupt.cancel();
                }
            });

            controller.run(cancel).await?;
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Commands::Status => {
            println!("booth v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            println!("Identity mode: {:?}", config.identity_mode());
            println!("Model: {}", config.live_model());
            println!("Bucket: {}", config.storage_bucket());
            println!("Camera spool: {}", config.camera_spool_path().display());
            println!("TV spool: {}", config.display_spool_path().display());
            println!(
                "API key: {}",
                if config.live_api_key().is_some() {
                    "configured"
                } else {
                    "missing"
                }
            );
        }
    }

    Ok(())
}

/// Wire the controller's devices and collaborators from the config.
fn build_deps(config: &Config, synthetic: bool, qr_payload: &str) -> anyhow::Result<BoothDeps> {
    let camera: Box<dyn Camera> = if synthetic {
        let qr = booth_tools::qr_generate::render_qr_png(qr_payload)?;
        Box::new(SyntheticCamera::new(vec![qr]))
    } else {
        Box::new(SpoolCamera::new(config.camera_spool_path()))
    };

    let (microphone, speaker) = if synthetic {
        silent_audio(config)
    } else {
        open_audio(config)?
    };

    let resolver: Arc<dyn IdentityResolver> = match config.identity_endpoint() {
        Some(endpoint) => Arc::new(HttpResolver::new(endpoint, config.identity_timeout())?),
        None => {
            tracing::info!("No identity endpoint configured, using the static resolver");
            Arc::new(StaticResolver::new(config.identity_fallback_name()))
        }
    };

    let api_key = config.live_api_key().ok_or_else(|| {
        anyhow::anyhow!("no API key: set GEMINI_API_KEY or live.api_key in the config")
    })?;
    let connector = Box::new(GeminiConnector {
        endpoint: config.live_endpoint(),
        api_key,
        model: config.live_model(),
        response_modalities: vec!["AUDIO".into(), "TEXT".into()],
        sample_rate: config.sample_rate(),
    });

    Ok(BoothDeps {
        camera,
        microphone,
        speaker,
        resolver,
        store: Arc::new(S3HttpStore::new(config.storage_url_base())),
        tv: Arc::new(SpoolTv::new(config.display_spool_path())),
        connector,
    })
}

fn silent_audio(config: &Config) -> (Box<dyn Microphone>, Box<dyn Speaker>) {
    (
        Box::new(SilentMicrophone::new(
            config.sample_rate(),
            config.audio_window(),
        )),
        Box::new(NullSpeaker),
    )
}

#[cfg(feature = "backend-cpal")]
fn open_audio(config: &Config) -> anyhow::Result<(Box<dyn Microphone>, Box<dyn Speaker>)> {
    Ok((
        Box::new(booth_media::CpalMicrophone::open(
            config.sample_rate(),
            config.audio_window(),
        )?),
        Box::new(booth_media::CpalSpeaker::open(
            config.playback_sample_rate(),
        )?),
    ))
}

#[cfg(not(feature = "backend-cpal"))]
fn open_audio(config: &Config) -> anyhow::Result<(Box<dyn Microphone>, Box<dyn Speaker>)> {
    tracing::warn!("Built without the cpal backend; audio devices are silent");
    Ok(silent_audio(config))
}

/// Operator console: surface controller progress in the logs.
async fn log_events(mut events: tokio::sync::mpsc::UnboundedReceiver<BoothEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            BoothEvent::Phase { phase } => tracing::info!(?phase, "Booth phase"),
            BoothEvent::QrDecoded { payload } => tracing::info!(%payload, "Ticket scanned"),
            BoothEvent::UserIdentified { name, code } => {
                tracing::info!(%name, %code, "Visitor identified")
            }
            BoothEvent::AgentText { text } => tracing::info!(%text, "Agent"),
            BoothEvent::ToolCall { tool } => tracing::debug!(%tool, "Tool call"),
            BoothEvent::ToolResult { tool, is_error } => {
                if is_error {
                    tracing::warn!(%tool, "Tool failed");
                } else {
                    tracing::debug!(%tool, "Tool completed");
                }
            }
            BoothEvent::Error { message } => tracing::warn!(%message, "Booth error"),
        }
    }
}
