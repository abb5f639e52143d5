//! Audio Channel: one WebSocket per active call.
//!
//! Opened by the orchestrator after a `connected` status, torn down on call
//! end, and never reconnected on its own; a fresh `connected` event is the
//! only trigger for a new channel. The first outbound frame is always the
//! metadata message; everything after is raw binary PCM out and JSON
//! `audioStream` frames in.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use crate::audio::InboundFrame;
use crate::protocol::{AudioMetadata, AudioMetadataMessage, AudioStreamMessage};

#[derive(Debug)]
pub enum AudioLinkEvent {
    Opened,
    Frame(InboundFrame),
    Closed,
}

/// Send capability handed to the capture side plus the pump task. The
/// pipelines only ever hold the frame sender, so replacing the link can
/// never leave them with a stale socket.
pub struct AudioLinkHandle {
    call_id: String,
    frame_tx: Option<mpsc::Sender<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl AudioLinkHandle {
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Sender for encoded outbound frames; `None` once closed.
    pub fn frame_sender(&self) -> Option<mpsc::Sender<Vec<u8>>> {
        self.frame_tx.clone()
    }

    /// Close the channel. Dropping the frame sender lets the pump task
    /// finish its write side and send the WebSocket close frame; the task
    /// is awaited so the socket is gone when this returns.
    pub async fn close(mut self) {
        self.frame_tx.take();
        if let Err(e) = (&mut self.task).await
            && !e.is_cancelled()
        {
            log::warn!("audio link task ended abnormally: {}", e);
        }
    }
}

/// Open the audio channel for `call_id` and spawn its pump task.
///
/// The metadata message goes out first, before any queued audio frame.
/// Events (including the terminal `Closed`) are delivered on `event_tx`.
pub async fn open(
    ws_base: &str,
    call_id: &str,
    metadata: AudioMetadata,
    event_tx: mpsc::Sender<AudioLinkEvent>,
) -> anyhow::Result<AudioLinkHandle> {
    let url = format!("{}/ws/audio/{}", ws_base.trim_end_matches('/'), call_id);
    log::info!("connecting audio channel to {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();

    let hello = serde_json::to_string(&AudioMetadataMessage::new(metadata))?;
    write.send(Message::Text(hello.into())).await?;

    let (frame_tx, mut frame_rx) = mpsc::channel::<Vec<u8>>(64);
    notify(&event_tx, AudioLinkEvent::Opened);

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                maybe_frame = frame_rx.recv() => {
                    match maybe_frame {
                        Some(frame) => {
                            if let Err(e) = write.send(Message::Binary(Bytes::from(frame))).await {
                                log::warn!("audio frame send failed: {}", e);
                                break;
                            }
                        }
                        // Handle closed on our side.
                        None => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(frame) = parse_stream_frame(&text) {
                                notify(&event_tx, AudioLinkEvent::Frame(frame));
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            log::info!("server closed audio channel: {:?}", frame);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            log::warn!("audio channel error: {}", e);
                            break;
                        }
                        None => break,
                    }
                }
            }
        }
        notify(&event_tx, AudioLinkEvent::Closed);
    });

    Ok(AudioLinkHandle {
        call_id: call_id.to_string(),
        frame_tx: Some(frame_tx),
        task,
    })
}

/// Non-blocking event delivery. The event consumer is the same task that
/// awaits the pump during `close`, so the pump must never park on a full
/// queue; dropping under backpressure is consistent with the no-buffering
/// model.
fn notify(event_tx: &mpsc::Sender<AudioLinkEvent>, event: AudioLinkEvent) {
    if let Err(e) = event_tx.try_send(event) {
        log::debug!("audio event queue unavailable, event dropped: {:?}", e);
    }
}

fn parse_stream_frame(text: &str) -> Option<InboundFrame> {
    let msg: AudioStreamMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            log::warn!("unparseable audio channel message ({})", e);
            return None;
        }
    };
    if msg.msg_type != "audioStream" {
        log::debug!("ignoring audio channel message type {}", msg.msg_type);
        return None;
    }
    match BASE64.decode(msg.data.as_bytes()) {
        Ok(payload) => Some(InboundFrame {
            payload,
            sample_rate: msg.sample_rate,
        }),
        Err(e) => {
            log::warn!("invalid base64 audio payload: {}", e);
            None
        }
    }
}
