//! Dictate from the default microphone with voice commands enabled.
//!
//! Streams for 10 seconds, then stops. The dictation endpoint keeps its
//! transport open for a 10 second grace period after the end frame so the
//! final results still arrive.
//!
//! ```bash
//! export VOCALBRIDGE_ENVIRONMENT=prod
//! export VOCALBRIDGE_TENANT=acme-health
//! export VOCALBRIDGE_TOKEN=...
//! cargo run --example dictation
//! ```

use std::time::Duration;

use vocalbridge::{
    Credentials, DeviceCapture, DictationConfig, Endpoint, InboundEvent, Session, SessionConfig,
    TranscriptAggregator, VoiceCommand,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let credentials = Credentials::from_env()?;

    let capture = DeviceCapture::new()?;
    let (mic_handle, mic) = capture.start()?;

    let config = SessionConfig::Dictation(DictationConfig {
        commands: Some(vec![
            VoiceCommand {
                phrase: "new paragraph".to_string(),
                action: "PARAGRAPH_BREAK".to_string(),
                keywords: vec!["paragraph".to_string()],
            },
            VoiceCommand {
                phrase: "scratch that".to_string(),
                action: "DELETE_UTTERANCE".to_string(),
                keywords: vec!["scratch".to_string(), "undo".to_string()],
            },
        ]),
        ..DictationConfig::default()
    });

    let (session, mut events) = Session::start(
        mic,
        &credentials,
        Endpoint::Dictation,
        Some(config),
    )
    .await?;

    println!("dictating for 10 seconds...");

    let printer = tokio::spawn(async move {
        let mut transcripts = TranscriptAggregator::new();
        while let Some(event) = events.recv().await {
            match event {
                InboundEvent::ConfigAccepted => println!("listening"),
                InboundEvent::Transcript { data } => {
                    let marker = if data.is_final { "*" } else { " " };
                    transcripts.process(&data);
                    println!("{marker} {}", transcripts.current_text(data.participant.channel));
                }
                InboundEvent::Fact { .. } | InboundEvent::Unknown => {}
            }
        }
        transcripts
    });

    tokio::time::sleep(Duration::from_secs(10)).await;

    session.stop().await;
    // Waits out the dictation drain period so late finals are printed.
    session.closed().await;
    let transcripts = printer.await?;

    mic_handle.stop();

    println!("--- dictation finished ---");
    println!("{}", transcripts.current_text(0));

    Ok(())
}
