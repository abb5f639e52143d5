//! Core controller: ties Control Channel events, call state, and the audio
//! session lifecycle together.
//!
//! The two channels are independently paced event sources; an audio-link
//! `Closed` can land before or after the control-side `disconnected`, and
//! both paths converge on the same idempotent teardown.

use tokio::sync::mpsc;

use crate::audio_backend::AudioBackend;
use crate::audio_link::AudioLinkEvent;
use crate::call_state::CallState;
use crate::control_link::ControlLinkEvent;
use crate::protocol::{ControlCommand, ControlEvent, WireCallStatus};
use crate::rest;

pub struct Controller<B: AudioBackend> {
    state: CallState,
    backend: B,
    cmd_tx: mpsc::Sender<ControlCommand>,
    control_connected: bool,
}

impl<B: AudioBackend> Controller<B> {
    pub fn new(backend: B, cmd_tx: mpsc::Sender<ControlCommand>) -> Self {
        Self {
            state: CallState::new(),
            backend,
            cmd_tx,
            control_connected: false,
        }
    }

    pub fn state(&self) -> &CallState {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn handle_control(&mut self, event: ControlLinkEvent) {
        match event {
            ControlLinkEvent::Connected => {
                log::info!("control channel connected");
                self.control_connected = true;
            }
            ControlLinkEvent::Disconnected => {
                // Surfaced to the operator, not fatal; an active call's
                // audio session is torn down rather than left dangling.
                log::warn!("control channel disconnected");
                self.control_connected = false;
                self.backend.close().await;
            }
            ControlLinkEvent::Event(event) => self.handle_event(event).await,
        }
    }

    async fn handle_event(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::CallStatus {
                status,
                call_id,
                to,
                from,
            } => {
                self.state.on_call_status(status, call_id, to, from);
                match status {
                    WireCallStatus::Connected => {
                        let Some(call_id) = self.state.call_id().map(str::to_string) else {
                            log::warn!("connected status without a call id");
                            return;
                        };
                        if !self.backend.is_open()
                            && let Err(e) = self.backend.open(&call_id).await
                        {
                            log::error!("failed to open audio session: {}", e);
                        }
                    }
                    WireCallStatus::Disconnected => {
                        self.backend.close().await;
                    }
                    WireCallStatus::Initiated => {}
                }
            }
            ControlEvent::Transcription(entry) => {
                log::info!("{:?}: {}", entry.speaker, entry.text);
                self.state.append_transcript(entry);
            }
            ControlEvent::Transcriptions { data } => {
                log::info!("transcript sync: {} entries", data.len());
                self.state.replace_transcript(data);
            }
            ControlEvent::MediaStatus { status, error, .. } => {
                self.state.on_media_status(status, error.as_deref());
            }
            ControlEvent::TranscriptionCleared { call_id } => {
                // Local log was already cleared optimistically.
                log::debug!("server acknowledged transcript clear for {:?}", call_id);
            }
            ControlEvent::ClientDisconnected { client_id } => {
                log::info!("peer console disconnected: {:?}", client_id);
            }
            ControlEvent::Error { message } => {
                log::error!("server error: {}", message);
            }
            ControlEvent::Unknown => {
                log::debug!("ignoring unknown control message");
            }
        }
    }

    pub async fn handle_audio(&mut self, event: AudioLinkEvent) {
        match event {
            AudioLinkEvent::Opened => {
                log::info!("audio channel established");
            }
            AudioLinkEvent::Frame(frame) => {
                self.backend.play_frame(frame);
            }
            AudioLinkEvent::Closed => {
                // Not reconnected here: only a fresh `connected` status may
                // reopen the channel.
                self.backend.close().await;
            }
        }
    }

    /// Submit the outbound-call request. Status moves to `Initiating`
    /// optimistically; progress arrives only via the Control Channel, never
    /// the REST response.
    pub async fn initiate_call(
        &mut self,
        client: &reqwest::Client,
        api_base: &str,
        phone_number: &str,
        bot_id: &str,
    ) {
        self.state.begin_initiating();
        match rest::initiate_call(client, api_base, phone_number, bot_id).await {
            Ok(response) => {
                log::info!("call initiated: {:?}", response.call_id);
            }
            Err(e) => {
                log::error!("failed to initiate call: {}", e);
                self.state.initiation_failed();
            }
        }
    }

    pub async fn end_call(&mut self) {
        if self.cmd_tx.send(ControlCommand::EndCall).await.is_err() {
            log::error!("cannot end call: control channel is closed");
        }
    }

    /// Clear the local transcript immediately and tell the server; the ack
    /// is not awaited.
    pub async fn clear_transcript(&mut self) {
        self.state.clear_transcript();
        if let Some(call_id) = self.state.call_id().map(str::to_string)
            && self
                .cmd_tx
                .send(ControlCommand::ClearTranscription { call_id })
                .await
                .is_err()
        {
            log::error!("cannot clear transcript: control channel is closed");
        }
    }

    /// Ask the server for a bulk transcript push.
    pub async fn request_transcript_sync(&mut self) {
        if let Some(call_id) = self.state.call_id().map(str::to_string)
            && self
                .cmd_tx
                .send(ControlCommand::GetTranscription { call_id })
                .await
                .is_err()
        {
            log::error!("cannot request transcript: control channel is closed");
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.backend.set_muted(muted);
        log::info!("microphone {}", if muted { "muted" } else { "unmuted" });
    }

    pub async fn shutdown(&mut self) {
        self.backend.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::InboundFrame;
    use crate::call_state::CallStatus;
    use async_trait::async_trait;

    #[derive(Default)]
    struct MockBackend {
        open_calls: Vec<String>,
        close_calls: usize,
        played: Vec<InboundFrame>,
        open: bool,
        muted: bool,
    }

    #[async_trait]
    impl AudioBackend for MockBackend {
        async fn open(&mut self, call_id: &str) -> anyhow::Result<()> {
            self.open_calls.push(call_id.to_string());
            self.open = true;
            Ok(())
        }

        async fn close(&mut self) {
            if self.open {
                self.close_calls += 1;
                self.open = false;
            }
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn play_frame(&mut self, frame: InboundFrame) {
            if self.open {
                self.played.push(frame);
            }
        }

        fn set_muted(&mut self, muted: bool) {
            self.muted = muted;
        }

        fn is_muted(&self) -> bool {
            self.muted
        }

        fn is_playing(&self) -> bool {
            false
        }
    }

    fn controller() -> (Controller<MockBackend>, mpsc::Receiver<ControlCommand>) {
        let (tx, rx) = mpsc::channel(8);
        (Controller::new(MockBackend::default(), tx), rx)
    }

    fn status_event(status: WireCallStatus, call_id: &str) -> ControlLinkEvent {
        ControlLinkEvent::Event(ControlEvent::CallStatus {
            status,
            call_id: Some(call_id.to_string()),
            to: None,
            from: None,
        })
    }

    #[tokio::test]
    async fn connected_opens_audio_session_exactly_once() {
        let (mut c, _rx) = controller();
        c.handle_control(status_event(WireCallStatus::Initiated, "A"))
            .await;
        c.handle_control(status_event(WireCallStatus::Connected, "A"))
            .await;
        // A duplicate connected push must not open a second channel.
        c.handle_control(status_event(WireCallStatus::Connected, "A"))
            .await;

        assert_eq!(c.backend().open_calls, vec!["A"]);
        assert!(c.backend().is_open());
    }

    #[tokio::test]
    async fn disconnected_tears_down_and_late_frames_are_dropped() {
        let (mut c, _rx) = controller();
        c.handle_control(status_event(WireCallStatus::Connected, "A"))
            .await;
        c.handle_control(status_event(WireCallStatus::Disconnected, "A"))
            .await;

        assert!(!c.backend().is_open());
        assert_eq!(c.backend().close_calls, 1);

        // A frame arriving after teardown must not reach playback.
        c.handle_audio(AudioLinkEvent::Frame(InboundFrame {
            payload: vec![0, 0],
            sample_rate: 16_000,
        }))
        .await;
        assert!(c.backend().played.is_empty());
    }

    #[tokio::test]
    async fn audio_close_and_control_disconnect_converge() {
        let (mut c, _rx) = controller();
        c.handle_control(status_event(WireCallStatus::Connected, "A"))
            .await;

        // Audio channel drops first, control event lands second.
        c.handle_audio(AudioLinkEvent::Closed).await;
        c.handle_control(status_event(WireCallStatus::Disconnected, "A"))
            .await;

        assert!(!c.backend().is_open());
        assert_eq!(c.backend().close_calls, 1, "teardown must be idempotent");
    }

    #[tokio::test]
    async fn audio_channel_failure_alone_does_not_reopen() {
        let (mut c, _rx) = controller();
        c.handle_control(status_event(WireCallStatus::Connected, "A"))
            .await;
        c.handle_audio(AudioLinkEvent::Closed).await;

        assert!(!c.backend().is_open());
        // Only one open ever happened; no retry on transient channel loss.
        assert_eq!(c.backend().open_calls.len(), 1);
    }

    #[tokio::test]
    async fn control_loss_tears_down_active_session() {
        let (mut c, _rx) = controller();
        c.handle_control(status_event(WireCallStatus::Connected, "A"))
            .await;
        c.handle_control(ControlLinkEvent::Disconnected).await;

        assert!(!c.backend().is_open());
    }

    #[tokio::test]
    async fn inbound_frames_reach_playback_while_open() {
        let (mut c, _rx) = controller();
        c.handle_control(status_event(WireCallStatus::Connected, "A"))
            .await;
        c.handle_audio(AudioLinkEvent::Frame(InboundFrame {
            payload: vec![1, 2],
            sample_rate: 24_000,
        }))
        .await;

        assert_eq!(c.backend().played.len(), 1);
        assert_eq!(c.backend().played[0].sample_rate, 24_000);
    }

    #[tokio::test]
    async fn clear_transcript_is_optimistic() {
        let (mut c, mut rx) = controller();
        c.handle_control(status_event(WireCallStatus::Connected, "A"))
            .await;
        c.handle_control(ControlLinkEvent::Event(ControlEvent::Transcription(
            crate::protocol::TranscriptEntry {
                speaker: crate::protocol::Speaker::Agent,
                text: "hello".into(),
                timestamp: None,
            },
        )))
        .await;
        assert_eq!(c.state().transcript.len(), 1);

        c.clear_transcript().await;
        // Local log empties before any server acknowledgment.
        assert!(c.state().transcript.is_empty());
        assert!(matches!(
            rx.recv().await,
            Some(ControlCommand::ClearTranscription { .. })
        ));
    }

    #[tokio::test]
    async fn transcript_bulk_replace_via_event() {
        let (mut c, _rx) = controller();
        c.handle_control(ControlLinkEvent::Event(ControlEvent::Transcriptions {
            data: vec![crate::protocol::TranscriptEntry {
                speaker: crate::protocol::Speaker::Customer,
                text: "synced".into(),
                timestamp: Some(1.0),
            }],
        }))
        .await;
        assert_eq!(c.state().transcript.len(), 1);
        assert_eq!(c.state().transcript[0].text, "synced");
    }

    #[tokio::test]
    async fn end_call_sends_command() {
        let (mut c, mut rx) = controller();
        c.end_call().await;
        assert!(matches!(rx.recv().await, Some(ControlCommand::EndCall)));
    }

    #[tokio::test]
    async fn mute_is_forwarded_and_remembered() {
        let (mut c, _rx) = controller();
        c.set_muted(true);
        assert!(c.backend().is_muted());
        c.set_muted(false);
        assert!(!c.backend().is_muted());
    }

    #[tokio::test]
    async fn connected_without_initiated_still_opens_session() {
        let (mut c, _rx) = controller();
        c.handle_control(status_event(WireCallStatus::Connected, "remote-1"))
            .await;
        assert_eq!(c.backend().open_calls, vec!["remote-1"]);
        assert_eq!(c.state().status, CallStatus::Connected);
        assert_eq!(c.state().call_id(), Some("remote-1"));
    }
}
