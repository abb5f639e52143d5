//! Audio session lifecycle behind the orchestrator's seam.
//!
//! [`AudioBackend`] is what the orchestrator drives; [`LiveAudioBackend`]
//! is the production implementation that owns the per-call Audio Channel
//! and the capture/playback pipelines as one scoped resource, acquired on
//! `open` and released on every exit path.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::audio::{
    AudioDevice, CapturePipeline, InboundFrame, InputConfig, PlaybackPipeline,
};
use crate::audio_link::{self, AudioLinkEvent, AudioLinkHandle};
use crate::config::Config;
use crate::protocol::AudioMetadata;

#[async_trait]
pub trait AudioBackend: Send {
    /// Open the audio channel for `call_id` and start the pipelines.
    /// A no-op when a session is already open, so repeated `connected`
    /// events cannot produce a second channel.
    async fn open(&mut self, call_id: &str) -> anyhow::Result<()>;

    /// Tear down capture, then playback, then the channel. Idempotent.
    async fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Hand an inbound frame to the playback pipeline; dropped when no
    /// session is open.
    fn play_frame(&mut self, frame: InboundFrame);

    fn set_muted(&mut self, muted: bool);

    fn is_muted(&self) -> bool;

    fn is_playing(&self) -> bool;
}

struct ActiveSession {
    link: AudioLinkHandle,
    capture: CapturePipeline,
    playback: PlaybackPipeline,
}

pub struct LiveAudioBackend {
    config: Config,
    device: Arc<dyn AudioDevice>,
    event_tx: mpsc::Sender<AudioLinkEvent>,
    active: Option<ActiveSession>,
    muted: bool,
}

impl LiveAudioBackend {
    pub fn new(
        config: Config,
        device: Arc<dyn AudioDevice>,
        event_tx: mpsc::Sender<AudioLinkEvent>,
    ) -> Self {
        Self {
            config,
            device,
            event_tx,
            active: None,
            muted: false,
        }
    }
}

#[async_trait]
impl AudioBackend for LiveAudioBackend {
    async fn open(&mut self, call_id: &str) -> anyhow::Result<()> {
        if self.active.is_some() {
            log::debug!("audio session already open, ignoring open for {}", call_id);
            return Ok(());
        }

        let metadata = AudioMetadata {
            sample_rate: self.config.capture_sample_rate,
            channels: 1,
            bits_per_sample: 16,
        };

        // Channel first: the pipelines must never run without it.
        let link = audio_link::open(
            &self.config.ws_base,
            call_id,
            metadata,
            self.event_tx.clone(),
        )
        .await?;

        let playback = match PlaybackPipeline::start(
            self.device.as_ref(),
            self.config.playback_sample_rate,
            self.config.fallback_sample_rate,
        ) {
            Ok(p) => p,
            Err(e) => {
                link.close().await;
                return Err(e.into());
            }
        };

        let input_config = InputConfig {
            sample_rate: self.config.capture_sample_rate,
            ..InputConfig::default()
        };
        let frame_tx = link
            .frame_sender()
            .ok_or_else(|| anyhow::anyhow!("audio channel closed before capture start"))?;
        let capture = match CapturePipeline::start(
            self.device.as_ref(),
            &input_config,
            self.config.capture_frame_samples,
            frame_tx,
            self.muted,
        ) {
            Ok(c) => c,
            Err(e) => {
                let mut playback = playback;
                playback.stop();
                link.close().await;
                return Err(e.into());
            }
        };

        log::info!("audio session open for call {}", call_id);
        self.active = Some(ActiveSession {
            link,
            capture,
            playback,
        });
        Ok(())
    }

    async fn close(&mut self) {
        let Some(mut session) = self.active.take() else {
            return;
        };
        // Capture stops before the channel closes so nothing sends on a
        // socket mid-close; playback stops before the close for the same
        // reason on the receive side.
        session.capture.stop();
        session.playback.stop();
        session.link.close().await;
        log::info!("audio session closed");
    }

    fn is_open(&self) -> bool {
        self.active.is_some()
    }

    fn play_frame(&mut self, frame: InboundFrame) {
        if let Some(session) = &self.active {
            session.playback.receive(frame);
        }
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if let Some(session) = &self.active {
            session.capture.set_muted(muted);
        }
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn is_playing(&self) -> bool {
        self.active
            .as_ref()
            .map(|s| s.playback.is_playing())
            .unwrap_or(false)
    }
}
