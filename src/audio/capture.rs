//! Microphone capture pipeline.
//!
//! Runs on a dedicated OS thread (NOT a tokio task) so that blocking device
//! reads cannot stall the async network side. The tap reads fixed-size
//! frames, converts them through the PCM codec, and hands the encoded bytes
//! to the Audio Channel's sender. Mute suppresses transmission without
//! releasing the device, so toggling it has no acquisition latency; muted
//! frames are dropped, never queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;

use super::device::{AudioDevice, InputConfig};
use super::pcm;
use crate::error::Result;

#[derive(Debug)]
pub struct CapturePipeline {
    running: Arc<AtomicBool>,
    muted: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CapturePipeline {
    /// Acquire the microphone and start the capture tap.
    ///
    /// Exactly one device acquisition happens here; a denied or absent
    /// device surfaces as `DeviceUnavailable` and nothing is retried.
    /// Encoded frames are delivered through `frame_tx` until [`stop`] is
    /// called or the receiving side goes away.
    ///
    /// [`stop`]: CapturePipeline::stop
    /// `start_muted` carries the operator's mute choice across channel
    /// rebuilds, since the pipeline is torn down and recreated per call.
    pub fn start(
        device: &dyn AudioDevice,
        config: &InputConfig,
        frame_samples: usize,
        frame_tx: mpsc::Sender<Vec<u8>>,
        start_muted: bool,
    ) -> Result<Self> {
        let mut input = device.acquire_input(config)?;

        let running = Arc::new(AtomicBool::new(true));
        let muted = Arc::new(AtomicBool::new(start_muted));

        let handle = {
            let running = running.clone();
            let muted = muted.clone();
            thread::Builder::new()
                .name("audio-capture".into())
                .spawn(move || {
                    let mut frame = vec![0f32; frame_samples];
                    let mut filled = 0;
                    while running.load(Ordering::Relaxed) {
                        match input.read(&mut frame[filled..]) {
                            Ok(0) => break,
                            Ok(n) => {
                                filled += n;
                                if filled < frame_samples {
                                    continue;
                                }
                                filled = 0;
                                if muted.load(Ordering::Relaxed) {
                                    // Dropped, not queued: unmuting must not
                                    // emit a burst of stale audio.
                                    continue;
                                }
                                let encoded =
                                    pcm::pcm16_to_bytes(&pcm::float_to_pcm16(&frame));
                                if frame_tx.blocking_send(encoded).is_err() {
                                    log::debug!("capture frame receiver dropped");
                                    break;
                                }
                            }
                            Err(e) => {
                                log::error!("capture read error: {}", e);
                                break;
                            }
                        }
                    }
                    log::info!("capture stopped");
                })
                .map_err(|e| crate::error::VoicelinkError::DeviceUnavailable {
                    message: format!("failed to spawn capture thread: {}", e),
                })?
        };

        Ok(Self {
            running,
            muted,
            handle: Some(handle),
        })
    }

    /// Suppress or resume frame transmission. Capture keeps running either
    /// way so the device stays warm.
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Release the device. Idempotent; once this returns, no further frame
    /// is delivered (the tap thread has been joined).
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::testing::FakeDevice;

    fn frames(n: usize, len: usize, value: f32) -> Vec<Vec<f32>> {
        (0..n).map(|_| vec![value; len]).collect()
    }

    #[test]
    fn frames_are_encoded_little_endian() {
        let device = FakeDevice::new(frames(2, 4, 0.5));
        let (tx, mut rx) = mpsc::channel(8);
        let mut pipeline =
            CapturePipeline::start(&device, &InputConfig::default(), 4, tx, false).unwrap();

        let first = rx.blocking_recv().unwrap();
        assert_eq!(first.len(), 8);
        let samples = pcm::bytes_to_pcm16(&first).unwrap();
        assert_eq!(samples, vec![(0.5f32 * 32767.0) as i16; 4]);
        pipeline.stop();
    }

    #[test]
    fn short_reads_accumulate_into_full_frames() {
        // Device yields 3-sample chunks; pipeline frames are 6 samples.
        let device = FakeDevice::new(frames(4, 3, 0.25));
        let (tx, mut rx) = mpsc::channel(8);
        let mut pipeline =
            CapturePipeline::start(&device, &InputConfig::default(), 6, tx, false).unwrap();

        assert_eq!(rx.blocking_recv().unwrap().len(), 12);
        assert_eq!(rx.blocking_recv().unwrap().len(), 12);
        // The scripted input ends after four chunks, so the tap shuts down
        // and the sender is dropped.
        assert!(rx.blocking_recv().is_none());
        pipeline.stop();
    }

    #[test]
    fn muted_frames_are_never_delivered() {
        let device = FakeDevice::new(frames(5, 4, 0.5));
        let (tx, mut rx) = mpsc::channel(8);
        let mut pipeline =
            CapturePipeline::start(&device, &InputConfig::default(), 4, tx, true).unwrap();
        assert!(pipeline.is_muted());

        // The tap consumed every input frame, but nothing reached the channel.
        assert!(rx.blocking_recv().is_none());
        pipeline.stop();
    }

    #[test]
    fn denied_device_reports_unavailable() {
        let mut device = FakeDevice::new(Vec::new());
        device.deny_input = true;
        let (tx, _rx) = mpsc::channel(1);
        let err = CapturePipeline::start(&device, &InputConfig::default(), 4, tx, false)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::VoicelinkError::DeviceUnavailable { .. }
        ));
    }

    #[test]
    fn stop_is_idempotent() {
        let device = FakeDevice::new(frames(1, 4, 0.0));
        let (tx, _rx) = mpsc::channel(8);
        let mut pipeline =
            CapturePipeline::start(&device, &InputConfig::default(), 4, tx, false).unwrap();
        pipeline.stop();
        pipeline.stop();
    }
}
