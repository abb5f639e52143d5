//! Playback pipeline for inbound audio frames.
//!
//! Each frame is an independent playback unit scheduled to start
//! immediately; frames are never stitched into one continuous stream, so
//! bursty arrival can produce audible gaps or overlaps. That per-frame
//! model is deliberate and matches the transport's framing (no sequence
//! numbers, no jitter buffer).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;

use super::device::AudioDevice;
use super::pcm;
use crate::error::Result;

/// One inbound audio payload plus its declared sample rate.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub payload: Vec<u8>,
    pub sample_rate: u32,
}

pub struct PlaybackPipeline {
    running: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
    frame_tx: Option<mpsc::Sender<InboundFrame>>,
    handle: Option<JoinHandle<()>>,
}

impl PlaybackPipeline {
    /// Acquire the output context and start the render thread.
    ///
    /// `fallback_sample_rate` is the fixed rate used when a payload turns
    /// out not to be container-wrapped and is replayed as raw PCM.
    pub fn start(
        device: &dyn AudioDevice,
        output_sample_rate: u32,
        fallback_sample_rate: u32,
    ) -> Result<Self> {
        let mut output = device.acquire_output(output_sample_rate)?;
        let (frame_tx, mut frame_rx) = mpsc::channel::<InboundFrame>(64);

        let running = Arc::new(AtomicBool::new(true));
        let playing = Arc::new(AtomicBool::new(false));

        let handle = {
            let running = running.clone();
            let playing = playing.clone();
            thread::Builder::new()
                .name("audio-play".into())
                .spawn(move || {
                    while running.load(Ordering::Relaxed) {
                        let Some(frame) = frame_rx.blocking_recv() else {
                            break;
                        };
                        match decode_frame(&frame, fallback_sample_rate) {
                            Ok((samples, rate)) => {
                                playing.store(true, Ordering::SeqCst);
                                if let Err(e) = output.play(&samples, rate) {
                                    log::error!("playback write error: {}", e);
                                }
                                playing.store(false, Ordering::SeqCst);
                            }
                            Err(e) => {
                                // Both decode paths failed; the frame is
                                // dropped and playback carries on.
                                log::warn!("dropping undecodable frame: {}", e);
                            }
                        }
                    }
                    log::info!("playback stopped");
                })
                .map_err(|e| crate::error::VoicelinkError::DeviceUnavailable {
                    message: format!("failed to spawn playback thread: {}", e),
                })?
        };

        Ok(Self {
            running,
            playing,
            frame_tx: Some(frame_tx),
            handle: Some(handle),
        })
    }

    /// Sender for inbound frames. The transport side holds only this
    /// capability, never the pipeline itself.
    pub fn sender(&self) -> Option<mpsc::Sender<InboundFrame>> {
        self.frame_tx.clone()
    }

    /// Hand one frame to the render thread. A full or closed queue drops
    /// the frame silently, consistent with the no-buffering model.
    pub fn receive(&self, frame: InboundFrame) {
        if let Some(tx) = &self.frame_tx
            && tx.try_send(frame).is_err()
        {
            log::debug!("playback queue unavailable, frame dropped");
        }
    }

    /// Raised while a frame is being rendered; clears when it finishes.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Release the output context. Idempotent; joins the render thread so
    /// no write is in flight once this returns.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.frame_tx.take();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for PlaybackPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Decode one frame: container first, raw PCM16 at the fallback rate second.
///
/// On the container path the frame's declared rate wins over the header's
/// (the transport metadata is authoritative); the header rate is only used
/// when no rate was declared.
fn decode_frame(frame: &InboundFrame, fallback_sample_rate: u32) -> Result<(Vec<f32>, u32)> {
    match pcm::parse_container(&frame.payload) {
        Ok(decoded) => {
            // A container header can carry rate 0 (the parser does not
            // validate it); rate 0 must never reach the output device.
            let rate = if frame.sample_rate > 0 {
                frame.sample_rate
            } else if decoded.sample_rate > 0 {
                decoded.sample_rate
            } else {
                fallback_sample_rate
            };
            Ok((pcm::pcm16_to_float(&decoded.samples), rate))
        }
        Err(e) => {
            log::debug!("container decode failed ({}), trying raw PCM", e);
            let samples = pcm::bytes_to_pcm16(&frame.payload)?;
            Ok((pcm::pcm16_to_float(&samples), fallback_sample_rate))
        }
    }
}
