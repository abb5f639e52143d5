use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use uuid::Uuid;

use voicelink::audio::AudioDevice;
use voicelink::audio_backend::LiveAudioBackend;
use voicelink::audio_link::AudioLinkEvent;
use voicelink::config::Config;
use voicelink::control_link::{ControlLink, ControlLinkEvent};
use voicelink::controller::Controller;
use voicelink::protocol::ControlCommand;

#[cfg(feature = "alsa-backend")]
fn make_device(config: &Config) -> Arc<dyn AudioDevice> {
    Arc::new(voicelink::audio::AlsaDevice::new(
        &config.capture_device,
        &config.playback_device,
        config.playback_sample_rate,
    ))
}

#[cfg(not(feature = "alsa-backend"))]
fn make_device(_config: &Config) -> Arc<dyn AudioDevice> {
    use voicelink::audio::{AudioInput, AudioOutput, InputConfig};
    use voicelink::error::{Result, VoicelinkError};

    // No platform backend compiled in; acquisition reports unavailable.
    struct UnsupportedDevice;

    impl AudioDevice for UnsupportedDevice {
        fn acquire_input(&self, _config: &InputConfig) -> Result<Box<dyn AudioInput>> {
            Err(VoicelinkError::DeviceUnavailable {
                message: "built without an audio backend".into(),
            })
        }

        fn acquire_output(&self, _sample_rate: u32) -> Result<Box<dyn AudioOutput>> {
            Err(VoicelinkError::DeviceUnavailable {
                message: "built without an audio backend".into(),
            })
        }
    }

    Arc::new(UnsupportedDevice)
}

fn print_help() {
    println!("commands:");
    println!("  call <phoneNumber> <botId>   originate an outbound call");
    println!("  end                          hang up the active call");
    println!("  mute | unmute                toggle microphone transmission");
    println!("  clear                        clear the transcript log");
    println!("  sync                         request a bulk transcript push");
    println!("  status                       show call state");
    println!("  quit                         exit");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "voicelink.toml".to_string());
    let mut config = Config::load(Path::new(&config_path))?;

    if config.operator_id.is_empty() {
        config.operator_id = format!("agent-{}", Uuid::new_v4());
        log::info!("generated operator id {}", config.operator_id);
    }

    let (control_event_tx, mut control_event_rx) = mpsc::channel::<ControlLinkEvent>(100);
    let (cmd_tx, cmd_rx) = mpsc::channel::<ControlCommand>(100);
    let (audio_event_tx, mut audio_event_rx) = mpsc::channel::<AudioLinkEvent>(100);

    let control_link = ControlLink::new(
        &config.ws_base,
        &config.operator_id,
        control_event_tx,
        cmd_rx,
    );
    tokio::spawn(control_link.run());

    let device = make_device(&config);
    let backend = LiveAudioBackend::new(config.clone(), device, audio_event_tx);
    let mut controller = Controller::new(backend, cmd_tx);

    let http_client = reqwest::Client::new();
    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();

    println!("voicelink console ready ({})", config.operator_id);
    print_help();

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                println!("shutting down...");
                break;
            }

            Some(event) = control_event_rx.recv() => {
                controller.handle_control(event).await;
            }

            Some(event) = audio_event_rx.recv() => {
                controller.handle_audio(event).await;
            }

            line = stdin_lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                let mut parts = line.split_whitespace();
                match parts.next() {
                    Some("call") => {
                        match (parts.next(), parts.next()) {
                            (Some(phone), Some(bot)) => {
                                controller
                                    .initiate_call(&http_client, &config.api_base, phone, bot)
                                    .await;
                            }
                            _ => println!("usage: call <phoneNumber> <botId>"),
                        }
                    }
                    Some("end") => controller.end_call().await,
                    Some("mute") => controller.set_muted(true),
                    Some("unmute") => controller.set_muted(false),
                    Some("clear") => controller.clear_transcript().await,
                    Some("sync") => controller.request_transcript_sync().await,
                    Some("status") => {
                        let state = controller.state();
                        println!(
                            "status: {:?}, call: {:?}, transcript lines: {}, media: {}",
                            state.status,
                            state.call_id(),
                            state.transcript.len(),
                            if state.media_active { "active" } else { "inactive" },
                        );
                    }
                    Some("quit") => break,
                    Some("help") => print_help(),
                    Some(other) => println!("unknown command: {}", other),
                    None => {}
                }
            }
        }
    }

    controller.shutdown().await;
    Ok(())
}
