//! Control Channel: one long-lived WebSocket per operator session.
//!
//! Carries call lifecycle and transcript events inbound and operator
//! commands outbound. There is no automatic reconnect: when the link
//! drops, a `Disconnected` signal is surfaced and the operator decides
//! what to do (matching the server console's behavior).

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use crate::protocol::{ControlCommand, ControlEvent};

#[derive(Debug)]
pub enum ControlLinkEvent {
    Connected,
    Event(ControlEvent),
    Disconnected,
}

pub struct ControlLink {
    url: String,
    tx: mpsc::Sender<ControlLinkEvent>,
    rx_cmd: mpsc::Receiver<ControlCommand>,
}

impl ControlLink {
    pub fn new(
        ws_base: &str,
        operator_id: &str,
        tx: mpsc::Sender<ControlLinkEvent>,
        rx_cmd: mpsc::Receiver<ControlCommand>,
    ) -> Self {
        Self {
            url: format!("{}/ws/agent/{}", ws_base.trim_end_matches('/'), operator_id),
            tx,
            rx_cmd,
        }
    }

    /// Connect and pump events until the socket closes or the command
    /// channel is dropped. Runs one connection only.
    pub async fn run(mut self) {
        if let Err(e) = self.connect_and_loop().await {
            log::error!("control link error: {}", e);
        }
        let _ = self.tx.send(ControlLinkEvent::Disconnected).await;
    }

    async fn connect_and_loop(&mut self) -> anyhow::Result<()> {
        let url = Url::parse(&self.url)?;
        log::info!("connecting control channel to {}", url);
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        self.tx.send(ControlLinkEvent::Connected).await?;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ControlEvent>(&text) {
                                Ok(event) => {
                                    self.tx.send(ControlLinkEvent::Event(event)).await?;
                                }
                                Err(e) => {
                                    log::warn!("unparseable control message ({}): {}", e, text);
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            log::info!("server closed control channel: {:?}", frame);
                            return Err(anyhow::anyhow!("connection closed"));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(anyhow::anyhow!("connection closed")),
                    }
                }
                cmd = self.rx_cmd.recv() => {
                    match cmd {
                        Some(cmd) => {
                            let json = serde_json::to_string(&cmd)?;
                            write.send(Message::Text(json.into())).await?;
                        }
                        // Command side dropped: clean shutdown.
                        None => {
                            let _ = write.send(Message::Close(None)).await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
