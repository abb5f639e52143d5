//! audio - capture, playback, and PCM codec for the call console.
//!
//! Device access goes through the capability traits in [`device`]; the
//! ALSA implementation is compiled in behind the `alsa-backend` feature.

#[cfg(feature = "alsa-backend")]
mod alsa_device;
mod capture;
mod device;
pub mod pcm;
mod playback;

#[cfg(feature = "alsa-backend")]
pub use alsa_device::AlsaDevice;
pub use capture::CapturePipeline;
pub use device::{AudioDevice, AudioInput, AudioOutput, InputConfig};
pub use playback::{InboundFrame, PlaybackPipeline};
