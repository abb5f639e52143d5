//! Call lifecycle and transcript state.
//!
//! Driven exclusively by Control Channel events; nothing here ever infers
//! status from the Audio Channel. The orchestrator and the view layer hold
//! read-only views of this state.

use std::time::SystemTime;

use crate::protocol::{TranscriptEntry, WireCallStatus, WireMediaStatus};

/// Client-side call phase.
///
/// Forward-progressing, except that `Disconnected -> Idle` happens when the
/// operator starts a new call. A remote push may jump straight to
/// `Connected` or `Disconnected` without a local `Initiating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallStatus {
    #[default]
    Idle,
    Initiating,
    Connected,
    Disconnected,
}

/// The record of one call's lifecycle timestamps and addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSession {
    pub id: String,
    pub destination: Option<String>,
    pub origin: Option<String>,
    pub started_at: SystemTime,
    pub connected_at: Option<SystemTime>,
    pub ended_at: Option<SystemTime>,
    pub duration_seconds: Option<f64>,
}

impl CallSession {
    fn new(id: String, destination: Option<String>, origin: Option<String>) -> Self {
        Self {
            id,
            destination,
            origin,
            started_at: SystemTime::now(),
            connected_at: None,
            ended_at: None,
            duration_seconds: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct CallState {
    pub status: CallStatus,
    pub session: Option<CallSession>,
    /// Receipt-order transcript log; never re-sorted.
    pub transcript: Vec<TranscriptEntry>,
    /// Whether the server reports media streaming as active for this call.
    pub media_active: bool,
}

impl CallState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Optimistic transition when the operator submits the outbound-call
    /// request; the authoritative `initiated` event follows over the
    /// Control Channel. Any terminal session from a previous call is
    /// discarded here.
    pub fn begin_initiating(&mut self) {
        self.status = CallStatus::Initiating;
        self.session = None;
        self.media_active = false;
    }

    /// Revert the optimistic transition after a failed REST submit.
    pub fn initiation_failed(&mut self) {
        if self.status == CallStatus::Initiating && self.session.is_none() {
            self.status = CallStatus::Idle;
        }
    }

    /// Apply a `callStatus` event.
    pub fn on_call_status(
        &mut self,
        status: WireCallStatus,
        call_id: Option<String>,
        to: Option<String>,
        from: Option<String>,
    ) {
        match status {
            WireCallStatus::Initiated => {
                self.status = CallStatus::Initiating;
                self.session = Some(CallSession::new(
                    call_id.unwrap_or_default(),
                    to,
                    from,
                ));
                self.media_active = false;
            }
            WireCallStatus::Connected => {
                self.status = CallStatus::Connected;
                match &mut self.session {
                    Some(session) => session.connected_at = Some(SystemTime::now()),
                    // Remotely initiated call: no prior `initiated` event was
                    // seen, so the session is created on connect.
                    None => {
                        let mut session =
                            CallSession::new(call_id.unwrap_or_default(), to, from);
                        session.connected_at = Some(session.started_at);
                        self.session = Some(session);
                    }
                }
            }
            WireCallStatus::Disconnected => {
                self.status = CallStatus::Disconnected;
                self.media_active = false;
                if let Some(session) = &mut self.session {
                    let now = SystemTime::now();
                    session.ended_at = Some(now);
                    session.duration_seconds = Some(match session.connected_at {
                        Some(connected) => now
                            .duration_since(connected)
                            .map(|d| d.as_secs_f64())
                            .unwrap_or(0.0),
                        None => 0.0,
                    });
                }
            }
        }
    }

    pub fn on_media_status(&mut self, status: WireMediaStatus, error: Option<&str>) {
        match status {
            WireMediaStatus::Started => self.media_active = true,
            WireMediaStatus::Stopped => self.media_active = false,
            WireMediaStatus::Failed => {
                self.media_active = false;
                log::warn!(
                    "media streaming failed: {}",
                    error.unwrap_or("no detail from server")
                );
            }
        }
    }

    /// Append one transcript line in receipt order.
    pub fn append_transcript(&mut self, entry: TranscriptEntry) {
        self.transcript.push(entry);
    }

    /// Replace the whole log (bulk sync from the server).
    pub fn replace_transcript(&mut self, entries: Vec<TranscriptEntry>) {
        self.transcript = entries;
    }

    /// Clear the local log immediately; the server command is sent
    /// separately and its acknowledgment is not awaited.
    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
    }

    /// The id of the live call, if any.
    pub fn call_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }
}
