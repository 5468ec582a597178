//! QR-gated session bootstrap.
//!
//! One camera, one owner: a single frame source owns the capture device
//! for the whole run and hands out subscriptions — the QR scanner taps it
//! during scanning, the snapshot capability and the session forwarder tap
//! it in steady state.

use std::sync::Arc;

use anyhow::Context as _;
use tokio::sync::{broadcast, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use booth_core::config::Config;
use booth_core::types::{AudioChunk, IdentityBinding, IdentityMode, SessionPhase, User};
use booth_live::{LiveConnector, LiveEvent, ToolDeclaration};
use booth_media::{AudioBridge, Camera, FrameSource, Microphone, QrScanner, Speaker};
use booth_tools::{
    CapabilityContext, CapabilityRegistry, DisplayCapability, IdentifyCapability,
    IdentityResolver, ObjectStore, QrCodeCapability, SnapshotCapability, TvSurface,
    UploadCapability,
};

use crate::dispatch::Dispatcher;
use crate::BoothEvent;

/// Devices and collaborators the controller orchestrates.
pub struct BoothDeps {
    pub camera: Box<dyn Camera>,
    pub microphone: Box<dyn Microphone>,
    pub speaker: Box<dyn Speaker>,
    pub resolver: Arc<dyn IdentityResolver>,
    pub store: Arc<dyn ObjectStore>,
    pub tv: Arc<dyn TvSurface>,
    pub connector: Box<dyn LiveConnector>,
}

pub struct BoothController {
    config: Arc<Config>,
    deps: BoothDeps,
    events: mpsc::UnboundedSender<BoothEvent>,
}

impl BoothController {
    pub fn new(
        config: Arc<Config>,
        deps: BoothDeps,
    ) -> (Self, mpsc::UnboundedReceiver<BoothEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                config,
                deps,
                events,
            },
            events_rx,
        )
    }

    /// Run the booth until the session closes or `cancel` fires.
    ///
    /// Fatal bootstrap errors (identification, session connect) propagate
    /// after teardown; the process exits on them.
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        let Self {
            config,
            deps,
            events,
        } = self;

        let tracker = TaskTracker::new();
        let result = drive(&config, deps, &events, &cancel, &tracker).await;

        emit(&events, BoothEvent::Phase {
            phase: SessionPhase::Terminated,
        });
        cancel.cancel();
        tracker.close();
        if tokio::time::timeout(config.shutdown_grace(), tracker.wait())
            .await
            .is_err()
        {
            warn!("Shutdown grace period elapsed with work still pending");
        }
        info!("Booth terminated");

        result
    }
}

fn emit(events: &mpsc::UnboundedSender<BoothEvent>, event: BoothEvent) {
    let _ = events.send(event);
}

/// The phase walk. Teardown is the caller's job, so every exit path (error
/// or normal) can simply return.
async fn drive(
    config: &Arc<Config>,
    deps: BoothDeps,
    events: &mpsc::UnboundedSender<BoothEvent>,
    cancel: &CancellationToken,
    tracker: &TaskTracker,
) -> anyhow::Result<()> {
    let mode = config.identity_mode();
    let binding = IdentityBinding::new();

    // The camera's single owner, alive for the whole run.
    let frames = FrameSource::spawn(
        deps.camera,
        config.camera_tick(),
        config.frame_capacity(),
        cancel.child_token(),
    );

    // --- Scanning -> Identified (scan-first mode) ---
    if mode == IdentityMode::ScanFirst {
        emit(events, BoothEvent::Phase {
            phase: SessionPhase::Scanning,
        });

        let scan_cancel = cancel.child_token();
        let payload_rx = QrScanner::spawn(frames.frames(), scan_cancel.clone());
        let payload = tokio::select! {
            _ = cancel.cancelled() => None,
            payload = payload_rx => payload.ok(),
        };
        scan_cancel.cancel();

        let Some(payload) = payload else {
            if cancel.is_cancelled() {
                info!("Interrupted while scanning");
                return Ok(());
            }
            anyhow::bail!("QR scan ended without a payload");
        };
        emit(events, BoothEvent::QrDecoded {
            payload: payload.clone(),
        });

        emit(events, BoothEvent::Phase {
            phase: SessionPhase::Identified,
        });
        // Deliberate fail-fast: without a user there is no session to run,
        // and the kiosk UI prompts a rescan on restart.
        let user = deps
            .resolver
            .resolve(&payload)
            .await
            .context("ticket identification failed")?;
        emit(events, BoothEvent::UserIdentified {
            name: user.name.clone(),
            code: user.code.clone(),
        });
        binding.bind(user);
    }

    // --- Streaming ---
    emit(events, BoothEvent::Phase {
        phase: SessionPhase::Streaming,
    });
    let AudioBridge { mut capture, playback } = AudioBridge::spawn(
        deps.microphone,
        deps.speaker,
        config.audio_capacity(),
        cancel.child_token(),
    );

    let mut registry = CapabilityRegistry::new();
    registry.register(Box::new(SnapshotCapability::new(
        frames.clone(),
        config.snapshot_timeout(),
    )));
    registry.register(Box::new(UploadCapability::new(deps.store.clone())));
    registry.register(Box::new(QrCodeCapability));
    registry.register(Box::new(DisplayCapability::new(
        deps.tv.clone(),
        config.display_dwell(),
    )));
    if mode == IdentityMode::OnDemand {
        registry.register(Box::new(IdentifyCapability::new(deps.resolver.clone())));
    }

    let declarations: Vec<ToolDeclaration> = registry
        .declarations()
        .into_iter()
        .map(|(name, description, parameters)| ToolDeclaration {
            name,
            description,
            parameters,
        })
        .collect();

    // --- Active ---
    let greeting = greeting_for(config, binding.user().as_ref());
    let (transport, mut live_rx) = deps
        .connector
        .connect(greeting, declarations)
        .await
        .context("failed to open live session")?;
    emit(events, BoothEvent::Phase {
        phase: SessionPhase::Active,
    });

    // Mic -> session forwarder.
    let mic_transport = transport.clone();
    let mic_cancel = cancel.child_token();
    tracker.spawn(async move {
        loop {
            tokio::select! {
                _ = mic_cancel.cancelled() => break,
                chunk = capture.recv() => match chunk {
                    Some(chunk) => {
                        if mic_transport.send_audio(chunk).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
        debug!("Mic forwarder stopped");
    });

    // Frames -> session forwarder; lag just skips to the live edge.
    let frame_transport = transport.clone();
    let mut frame_rx = frames.frames();
    let frame_cancel = cancel.child_token();
    tracker.spawn(async move {
        loop {
            tokio::select! {
                _ = frame_cancel.cancelled() => break,
                frame = frame_rx.recv() => match frame {
                    Ok(frame) => {
                        if frame_transport.send_frame(&frame).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
        debug!("Frame forwarder stopped");
    });

    if let Err(e) = transport.send_text(&config.kickoff_text()).await {
        warn!(%e, "Kickoff message failed");
        emit(events, BoothEvent::Error {
            message: format!("kickoff message failed: {e}"),
        });
    }

    let dispatcher = Dispatcher::new(
        Arc::new(registry),
        Arc::new(CapabilityContext {
            user: binding,
            config: config.clone(),
        }),
        transport.clone(),
        events.clone(),
        mode,
        config.tool_timeout(),
        tracker.clone(),
    );

    // --- Dispatch loop ---
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Interrupt received, closing session");
                break;
            }
            event = live_rx.recv() => match event {
                Some(LiveEvent::ToolCall(calls)) => dispatcher.dispatch(calls),
                Some(LiveEvent::Audio(bytes)) => {
                    match playback.try_send(AudioChunk::new(bytes)) {
                        Ok(()) => {}
                        // playback backlog: drop the newest, never block
                        Err(TrySendError::Full(_)) => {}
                        Err(TrySendError::Closed(_)) => break,
                    }
                }
                Some(LiveEvent::Text { content, .. }) => {
                    emit(events, BoothEvent::AgentText { text: content });
                }
                Some(LiveEvent::SetupComplete) => debug!("Session setup complete"),
                Some(LiveEvent::Closed(reason)) => {
                    info!(?reason, "Session closed by transport");
                    break;
                }
                None => break,
            }
        }
    }

    let _ = transport.close().await;
    Ok(())
}

fn greeting_for(config: &Config, user: Option<&User>) -> String {
    let name = user.map(|u| u.name.as_str()).unwrap_or("our next guest");
    config.greeting_template().replace("{name}", name)
}
