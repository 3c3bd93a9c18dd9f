//! Stream two merged audio channels into a multi-party interaction.
//!
//! Channel 0 carries the default microphone; channel 1 carries a silent
//! stand-in for the remote party so the channel mapping is visible end to
//! end. Streams for 15 seconds, then stops.
//!
//! ```bash
//! export VOCALBRIDGE_ENVIRONMENT=prod
//! export VOCALBRIDGE_TENANT=acme-health
//! export VOCALBRIDGE_TOKEN=...
//! cargo run --example interaction_stream
//! ```

use std::time::Duration;

use vocalbridge::{
    merge, Credentials, DeviceCapture, Endpoint, InboundEvent, Session, SyntheticSource,
    TranscriptAggregator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let credentials = Credentials::from_env()?;

    let capture = DeviceCapture::new()?;
    let (mic_handle, mic) = capture.start()?;

    let mut remote = SyntheticSource::new(capture.sample_rate());
    remote.generate_silence(15_000);
    let remote = remote.into_source(200);

    let (merged, mut teardown) = merge(vec![mic, remote])?;
    println!("merged stream carries {} channels", merged.channels());

    let interaction_id = uuid::Uuid::new_v4().to_string();
    println!("streaming interaction {interaction_id}");

    let (session, mut events) = Session::start(
        merged.into_source(),
        &credentials,
        Endpoint::interaction(&interaction_id),
        None, // default interaction configuration
    )
    .await?;

    let printer = tokio::spawn(async move {
        let mut transcripts = TranscriptAggregator::new();
        while let Some(event) = events.recv().await {
            match event {
                InboundEvent::ConfigAccepted => println!("configuration accepted, audio flowing"),
                InboundEvent::Transcript { data } => {
                    let channel = data.participant.channel;
                    transcripts.process(&data);
                    println!(
                        "[ch{} {}] {}",
                        channel,
                        data.participant.role,
                        transcripts.current_text(channel)
                    );
                }
                InboundEvent::Fact { data } => println!("fact: {}", data.text),
                InboundEvent::Unknown => {}
            }
        }
    });

    tokio::time::sleep(Duration::from_secs(15)).await;

    session.stop().await;
    session.closed().await;
    printer.await?;

    // The session never cascade-stops audio it does not own.
    teardown.teardown();
    mic_handle.stop();

    Ok(())
}
