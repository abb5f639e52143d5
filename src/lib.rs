//! voicelink - realtime duplex audio client for an agent call console.
//!
//! Coordinates two independent WebSocket channels (a long-lived control
//! channel per operator and a short-lived audio channel per call) with the
//! local capture/playback pipelines and the call lifecycle state machine.

pub mod audio;
pub mod audio_backend;
pub mod audio_link;
pub mod call_state;
pub mod config;
pub mod control_link;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod rest;
