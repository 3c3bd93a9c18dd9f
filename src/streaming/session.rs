//! Session runtime over the WebSocket transport.
//!
//! [`Session::start`] validates the source and configuration, connects to
//! the selected endpoint, and spawns two tasks: a reader that pumps inbound
//! frames into the driver, and the driver itself, which feeds every event
//! through the [`SessionMachine`] and executes the actions it returns. The
//! write half of the socket and the encoder handle are owned by the driver
//! alone.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::audio::{AudioSource, AudioTrack};

use super::chunker::{spawn_encoder, EncoderConfig};
use super::credentials::{Credentials, Endpoint};
use super::machine::{Action, SessionEvent, SessionMachine};
use super::protocol::{InboundEvent, SessionConfig};
use super::StreamingError;

type WsWrite = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Receiver for inbound events demultiplexed to the caller.
pub type EventReceiver = mpsc::Receiver<InboundEvent>;

/// How the transport is closed after `stop()`.
///
/// The two endpoint families behave differently on purpose; the policies
/// are named rather than unified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosePolicy {
    /// Close as soon as the stop actions have run.
    Immediate,
    /// Keep the transport open for a grace period so final results can
    /// still arrive.
    Drain(Duration),
}

/// Grace period before the dictation endpoint's transport is closed.
const DICTATION_DRAIN: Duration = Duration::from_secs(10);

/// Capacity of the internal driver event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the caller-facing event channel.
const CALLER_CHANNEL_CAPACITY: usize = 100;

/// Capacity of the encoder chunk channel.
const CHUNK_CHANNEL_CAPACITY: usize = 8;

impl Endpoint {
    /// The close policy this endpoint family uses after `stop()`.
    pub fn close_policy(&self) -> ClosePolicy {
        match self {
            Endpoint::Interaction { .. } => ClosePolicy::Immediate,
            Endpoint::Dictation => ClosePolicy::Drain(DICTATION_DRAIN),
        }
    }
}

/// Handle to an active streaming session.
pub struct Session {
    event_tx: mpsc::Sender<SessionEvent>,
    shutdown: CancellationToken,
    driver: tokio::task::JoinHandle<()>,
}

impl Session {
    /// Open a session and start the configuration handshake.
    ///
    /// The returned receiver yields every decoded inbound event. The caller
    /// remains responsible for stopping the session and for tearing down
    /// any source or merge graph it created; the session never
    /// cascade-stops audio it does not own.
    ///
    /// With `config` as `None`, the endpoint family's default
    /// configuration is used.
    pub async fn start(
        source: AudioSource,
        credentials: &Credentials,
        endpoint: Endpoint,
        config: Option<SessionConfig>,
    ) -> Result<(Session, EventReceiver), StreamingError> {
        // Capability checks come first; the session never starts on a
        // source that cannot be streamed.
        let sample_rate = source.sample_rate();
        let track = source
            .into_first_track()
            .ok_or(StreamingError::MissingAudioTrack)?;
        let encoder_config = EncoderConfig::for_track(sample_rate, track.channels());

        let config = match config {
            Some(config) => {
                if config.family() != endpoint.family() {
                    return Err(StreamingError::ConfigMismatch(endpoint.family()));
                }
                config
            }
            None => match &endpoint {
                Endpoint::Interaction { .. } => {
                    SessionConfig::Interaction(Default::default())
                }
                Endpoint::Dictation => SessionConfig::Dictation(Default::default()),
            },
        };
        let config_message = config
            .to_message()
            .map_err(|e| StreamingError::ProtocolError(e.to_string()))?;

        // rustls needs a process-level crypto provider before the first
        // TLS connection; installing twice is harmless.
        let _ = rustls::crypto::ring::default_provider().install_default();

        log::info!("Connecting to {} endpoint", endpoint.family());
        let (ws, _response) = connect_async(endpoint.url(credentials))
            .await
            .map_err(|e| StreamingError::ConnectionFailed(e.to_string()))?;
        log::info!("Transport connected");

        let (write, read) = ws.split();
        let shutdown = CancellationToken::new();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (caller_tx, caller_rx) = mpsc::channel(CALLER_CHANNEL_CAPACITY);

        tokio::spawn(run_reader(read, event_tx.clone(), shutdown.clone()));

        let driver = tokio::spawn(run_driver(
            write,
            SessionMachine::new(config_message),
            track,
            encoder_config,
            event_rx,
            caller_tx,
            endpoint.close_policy(),
            shutdown.clone(),
        ));

        Ok((
            Session {
                event_tx,
                shutdown,
                driver,
            },
            caller_rx,
        ))
    }

    /// End the session: send the end frame if the transport is open, stop
    /// the encoder, and close per the endpoint's [`ClosePolicy`].
    ///
    /// Best-effort; safe to call more than once.
    pub async fn stop(&self) {
        if self.event_tx.send(SessionEvent::Stop).await.is_err() {
            log::debug!("Session driver already gone on stop");
        }
    }

    /// Wait for the session driver to finish (transport closed).
    pub async fn closed(mut self) {
        if let Err(e) = (&mut self.driver).await {
            log::debug!("Session driver ended abnormally: {}", e);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Ensure the reader, encoder and driver all wind down if the
        // handle is dropped without an explicit stop.
        self.shutdown.cancel();
    }
}

/// Pump inbound frames into the driver's event channel.
async fn run_reader(
    mut read: WsRead,
    events: mpsc::Sender<SessionEvent>,
    shutdown: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            _ = shutdown.cancelled() => break,
            msg = read.next() => msg,
        };
        match msg {
            Some(Ok(Message::Text(text))) => {
                if events.send(SessionEvent::TransportText(text)).await.is_err() {
                    break;
                }
            }
            Some(Ok(Message::Binary(data))) => {
                log::debug!("Ignoring {}-byte binary frame from service", data.len());
            }
            Some(Ok(Message::Close(frame))) => {
                log::info!("Service closed the connection: {:?}", frame);
                let _ = events.send(SessionEvent::TransportClosed).await;
                break;
            }
            Some(Ok(_)) => {} // ping/pong
            Some(Err(e)) => {
                let _ = events.send(SessionEvent::TransportError(e.to_string())).await;
                break;
            }
            None => {
                let _ = events.send(SessionEvent::TransportClosed).await;
                break;
            }
        }
    }
    log::debug!("Reader task exiting");
}

/// Drive the machine: feed it events, execute its actions.
#[allow(clippy::too_many_arguments)]
async fn run_driver(
    mut write: WsWrite,
    mut machine: SessionMachine,
    track: AudioTrack,
    encoder_config: EncoderConfig,
    mut event_rx: mpsc::Receiver<SessionEvent>,
    caller_tx: mpsc::Sender<InboundEvent>,
    close_policy: ClosePolicy,
    shutdown: CancellationToken,
) {
    let encoder_token = shutdown.child_token();
    let (chunk_tx, mut chunk_rx) = mpsc::channel::<Vec<u8>>(CHUNK_CHANNEL_CAPACITY);
    let mut track = Some(track);
    let mut close_at: Option<Instant> = None;

    // connect_async returning is the open observation.
    let mut pending = machine.handle(SessionEvent::TransportOpen);

    'driver: loop {
        for action in pending.drain(..) {
            match action {
                Action::SendText(text) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        log::warn!("Failed to send text frame: {}", e);
                    }
                }
                Action::SendBinary(data) => {
                    if let Err(e) = write.send(Message::Binary(data)).await {
                        log::warn!("Failed to send audio chunk: {}", e);
                    }
                }
                Action::StartEncoder => {
                    if let Some(track) = track.take() {
                        spawn_encoder(
                            track,
                            encoder_config.clone(),
                            chunk_tx.clone(),
                            encoder_token.clone(),
                        );
                    }
                }
                Action::StopEncoder => encoder_token.cancel(),
                Action::Forward(event) => {
                    if caller_tx.send(event).await.is_err() {
                        log::debug!("Event receiver dropped, discarding inbound event");
                    }
                }
                Action::CloseTransport => {
                    if close_at.is_none() {
                        let delay = match close_policy {
                            ClosePolicy::Immediate => Duration::ZERO,
                            ClosePolicy::Drain(delay) => {
                                log::info!("Closing transport in {:?}", delay);
                                delay
                            }
                        };
                        close_at = Some(Instant::now() + delay);
                    }
                }
            }
        }

        let event = tokio::select! {
            _ = shutdown.cancelled() => break 'driver,
            _ = async { sleep_until(close_at.unwrap()).await }, if close_at.is_some() => {
                if let Err(e) = write.close().await {
                    log::debug!("Error closing transport: {}", e);
                }
                machine.handle(SessionEvent::TransportClosed);
                break 'driver;
            }
            Some(chunk) = chunk_rx.recv() => SessionEvent::Chunk(chunk),
            event = event_rx.recv() => match event {
                Some(event) => event,
                None => break 'driver,
            },
        };
        pending = machine.handle(event);
    }

    log::debug!("Session driver exiting in state {:?}", machine.state());
}
