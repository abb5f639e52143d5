use thiserror::Error;

/// Failure taxonomy for the client core.
///
/// None of these are fatal to the process; every one degrades to
/// "this frame or command did not take effect".
#[derive(Debug, Error)]
pub enum VoicelinkError {
    /// Microphone or speaker acquisition was denied or no device exists.
    /// Reported once, never retried automatically.
    #[error("audio device unavailable: {message}")]
    DeviceUnavailable { message: String },

    /// Malformed PCM payload (wrong buffer length parity etc).
    #[error("malformed PCM payload: {message}")]
    Codec { message: String },

    /// Container decode failed; triggers the raw-PCM fallback path.
    #[error("container decode failed: {message}")]
    Decode { message: String },
}

pub type Result<T> = std::result::Result<T, VoicelinkError>;
