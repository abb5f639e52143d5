//! Capability traits over the platform audio API.
//!
//! The pipelines never touch a concrete device API directly; they acquire
//! streams through [`AudioDevice`] so that framing, muting, and codec logic
//! stay independent of the runtime (ALSA here, anything else elsewhere).

use crate::error::Result;

/// Requested capture characteristics. The processing flags mirror what the
/// console asks of the platform; a backend that cannot honor one simply
/// captures without it.
#[derive(Debug, Clone)]
pub struct InputConfig {
    pub sample_rate: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain: true,
        }
    }
}

/// A live microphone stream yielding normalized float samples.
pub trait AudioInput: Send {
    /// Fill `buf` with captured samples, blocking until data is available.
    /// Returns the number of samples written; `Ok(0)` means the stream has
    /// ended and the capture tap should shut down.
    fn read(&mut self, buf: &mut [f32]) -> Result<usize>;
}

/// An output context that renders one frame at a time.
///
/// Each call is an independent playback unit started immediately; the sink
/// blocks until the frame has been handed to the device.
pub trait AudioOutput: Send {
    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<()>;
}

/// Factory for exclusive input/output handles.
pub trait AudioDevice: Send + Sync {
    fn acquire_input(&self, config: &InputConfig) -> Result<Box<dyn AudioInput>>;
    fn acquire_output(&self, sample_rate: u32) -> Result<Box<dyn AudioOutput>>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::VoicelinkError;
    use std::sync::{Arc, Mutex};

    /// Scripted input: yields the queued frames, then reports end of stream.
    pub struct ScriptedInput {
        frames: Vec<Vec<f32>>,
        next: usize,
    }

    impl AudioInput for ScriptedInput {
        fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
            if self.next >= self.frames.len() {
                return Ok(0);
            }
            let frame = &self.frames[self.next];
            self.next += 1;
            let n = frame.len().min(buf.len());
            buf[..n].copy_from_slice(&frame[..n]);
            Ok(n)
        }
    }

    /// Records every frame handed to it.
    pub struct RecordingOutput {
        pub played: Arc<Mutex<Vec<(Vec<f32>, u32)>>>,
    }

    impl AudioOutput for RecordingOutput {
        fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<()> {
            self.played
                .lock()
                .unwrap()
                .push((samples.to_vec(), sample_rate));
            Ok(())
        }
    }

    pub struct FakeDevice {
        pub input_frames: Vec<Vec<f32>>,
        pub played: Arc<Mutex<Vec<(Vec<f32>, u32)>>>,
        pub deny_input: bool,
        pub deny_output: bool,
    }

    impl FakeDevice {
        pub fn new(input_frames: Vec<Vec<f32>>) -> Self {
            Self {
                input_frames,
                played: Arc::new(Mutex::new(Vec::new())),
                deny_input: false,
                deny_output: false,
            }
        }
    }

    impl AudioDevice for FakeDevice {
        fn acquire_input(&self, _config: &InputConfig) -> Result<Box<dyn AudioInput>> {
            if self.deny_input {
                return Err(VoicelinkError::DeviceUnavailable {
                    message: "input denied".into(),
                });
            }
            Ok(Box::new(ScriptedInput {
                frames: self.input_frames.clone(),
                next: 0,
            }))
        }

        fn acquire_output(&self, _sample_rate: u32) -> Result<Box<dyn AudioOutput>> {
            if self.deny_output {
                return Err(VoicelinkError::DeviceUnavailable {
                    message: "output denied".into(),
                });
            }
            Ok(Box::new(RecordingOutput {
                played: self.played.clone(),
            }))
        }
    }
}
