//! Wire messages for the Control and Audio Channels.
//!
//! The Control Channel carries JSON text frames keyed by a `type` tag; the
//! Audio Channel mixes one JSON metadata frame and raw binary PCM outbound
//! with JSON `audioStream` frames inbound. Field names follow the server's
//! camelCase convention.

use serde::{Deserialize, Serialize};

/// Who produced a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Agent,
    #[default]
    Customer,
}

/// One transcript line, appended in receipt order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    #[serde(default)]
    pub speaker: Speaker,
    pub text: String,
    /// Milliseconds since the epoch; absent on some server revisions.
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// Call lifecycle phase as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireCallStatus {
    Initiated,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireMediaStatus {
    Started,
    Stopped,
    Failed,
}

/// Inbound Control Channel events.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlEvent {
    #[serde(rename_all = "camelCase")]
    CallStatus {
        status: WireCallStatus,
        call_id: Option<String>,
        to: Option<String>,
        from: Option<String>,
    },
    Transcription(TranscriptEntry),
    Transcriptions {
        data: Vec<TranscriptEntry>,
    },
    #[serde(rename_all = "camelCase")]
    MediaStatus {
        status: WireMediaStatus,
        call_id: Option<String>,
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    TranscriptionCleared {
        call_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ClientDisconnected {
        client_id: Option<String>,
    },
    Error {
        message: String,
    },
    /// Anything this client revision does not understand; logged, ignored.
    #[serde(other)]
    Unknown,
}

/// Outbound Control Channel commands.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlCommand {
    EndCall,
    #[serde(rename_all = "camelCase")]
    ClearTranscription { call_id: String },
    #[serde(rename_all = "camelCase")]
    GetTranscription { call_id: String },
}

/// Audio format description, sent exactly once as the first frame after the
/// Audio Channel opens and before any audio frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMetadata {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

#[derive(Debug, Serialize)]
pub struct AudioMetadataMessage {
    pub kind: &'static str,
    #[serde(rename = "audioMetadata")]
    pub audio_metadata: AudioMetadata,
}

impl AudioMetadataMessage {
    pub fn new(audio_metadata: AudioMetadata) -> Self {
        Self {
            kind: "AudioMetadata",
            audio_metadata,
        }
    }
}

/// Inbound Audio Channel frame: base64 payload plus its declared rate.
#[derive(Debug, Deserialize)]
pub struct AudioStreamMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub data: String,
    #[serde(rename = "sampleRate", default)]
    pub sample_rate: u32,
}
