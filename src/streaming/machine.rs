//! Session state machine.
//!
//! All streaming-session sequencing goes through [`SessionMachine::handle`],
//! a reducer that maps one event to the actions the runtime must execute.
//! Keeping the transitions pure makes the ordering guarantees testable
//! without a transport: the configuration is the first frame after open, no
//! audio precedes the accept, the encoder starts exactly once, and a stop
//! that races an in-flight accept wins.

use super::protocol::{end_message, InboundEvent};

/// Lifecycle of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the transport to open.
    Connecting,
    /// Configuration sent, waiting for the service to accept it.
    ConfigSent,
    /// Audio is flowing.
    Streaming,
    /// `stop()` was requested; draining and closing.
    Stopping,
    /// Terminal; nothing more is sent.
    Closed,
}

/// Events fed to the machine by the runtime.
#[derive(Debug)]
pub enum SessionEvent {
    /// The transport finished its handshake.
    TransportOpen,
    /// A text frame arrived.
    TransportText(String),
    /// The transport reported an error.
    TransportError(String),
    /// The transport closed.
    TransportClosed,
    /// The encoder produced an audio chunk.
    Chunk(Vec<u8>),
    /// The caller requested a stop.
    Stop,
}

/// Actions the runtime executes after a transition.
#[derive(Debug, PartialEq)]
pub enum Action {
    /// Send a text frame.
    SendText(String),
    /// Send a binary audio frame.
    SendBinary(Vec<u8>),
    /// Attach the chunk encoder to the audio source.
    StartEncoder,
    /// Stop the chunk encoder.
    StopEncoder,
    /// Deliver a decoded event to the caller.
    Forward(InboundEvent),
    /// Close the transport, honoring the endpoint's close policy.
    CloseTransport,
}

/// The session reducer.
pub struct SessionMachine {
    state: SessionState,
    transport_open: bool,
    accepted: bool,
    config_message: String,
}

impl SessionMachine {
    /// Create a machine that will send `config_message` as the first frame.
    pub fn new(config_message: String) -> Self {
        Self {
            state: SessionState::Connecting,
            transport_open: false,
            accepted: false,
            config_message,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the transport was open as of the last event.
    pub fn transport_open(&self) -> bool {
        self.transport_open
    }

    /// Apply one event, returning the actions to execute in order.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Action> {
        match event {
            SessionEvent::TransportOpen => {
                self.transport_open = true;
                if self.state == SessionState::Connecting {
                    self.state = SessionState::ConfigSent;
                    log::info!("Transport open, sending configuration");
                    vec![Action::SendText(self.config_message.clone())]
                } else {
                    Vec::new()
                }
            }

            SessionEvent::TransportText(text) => {
                let event = match serde_json::from_str::<InboundEvent>(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        log::warn!("Dropping undecodable inbound message: {}", e);
                        return Vec::new();
                    }
                };
                if matches!(event, InboundEvent::Unknown) {
                    log::debug!("Forwarding inbound event of unrecognized type");
                }

                // Every decoded event reaches the caller, whatever the state.
                let mut actions = vec![Action::Forward(event.clone())];

                // Only the first accept, and only if the caller has not
                // already stopped, starts the encoder.
                if event.is_config_accepted()
                    && !self.accepted
                    && self.state == SessionState::ConfigSent
                {
                    self.accepted = true;
                    self.state = SessionState::Streaming;
                    log::info!("Configuration accepted, starting audio");
                    actions.push(Action::StartEncoder);
                }
                actions
            }

            SessionEvent::Chunk(data) => {
                if self.state == SessionState::Streaming && self.transport_open {
                    vec![Action::SendBinary(data)]
                } else {
                    log::debug!(
                        "Dropping audio chunk ({} bytes) in state {:?}",
                        data.len(),
                        self.state
                    );
                    Vec::new()
                }
            }

            SessionEvent::Stop => match self.state {
                SessionState::Stopping | SessionState::Closed => Vec::new(),
                _ => {
                    let mut actions = Vec::new();
                    if self.transport_open {
                        actions.push(Action::SendText(end_message()));
                    }
                    if self.accepted {
                        actions.push(Action::StopEncoder);
                    }
                    actions.push(Action::CloseTransport);
                    self.state = SessionState::Stopping;
                    actions
                }
            },

            SessionEvent::TransportError(e) => {
                // Not retried and not escalated; the caller decides when to
                // stop.
                log::warn!("Transport error: {}", e);
                self.transport_open = false;
                Vec::new()
            }

            SessionEvent::TransportClosed => {
                self.transport_open = false;
                if self.state == SessionState::Stopping {
                    self.state = SessionState::Closed;
                    log::info!("Session closed");
                } else {
                    log::warn!("Transport closed in state {:?}", self.state);
                }
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{"type":"config","configuration":{}}"#;
    const ACCEPTED: &str = r#"{"type":"CONFIG_ACCEPTED"}"#;

    fn machine() -> SessionMachine {
        SessionMachine::new(CONFIG.to_string())
    }

    fn open_machine() -> SessionMachine {
        let mut m = machine();
        m.handle(SessionEvent::TransportOpen);
        m
    }

    fn accepted_machine() -> SessionMachine {
        let mut m = open_machine();
        m.handle(SessionEvent::TransportText(ACCEPTED.to_string()));
        m
    }

    #[test]
    fn test_config_is_first_frame_after_open() {
        let mut m = machine();
        assert_eq!(m.state(), SessionState::Connecting);

        let actions = m.handle(SessionEvent::TransportOpen);
        assert_eq!(actions, vec![Action::SendText(CONFIG.to_string())]);
        assert_eq!(m.state(), SessionState::ConfigSent);
    }

    #[test]
    fn test_no_chunk_before_accept() {
        let mut m = open_machine();
        let actions = m.handle(SessionEvent::Chunk(vec![1, 2, 3]));
        assert!(actions.is_empty());
        assert_eq!(m.state(), SessionState::ConfigSent);
    }

    #[test]
    fn test_accept_starts_encoder_exactly_once() {
        let mut m = open_machine();

        let actions = m.handle(SessionEvent::TransportText(ACCEPTED.to_string()));
        assert_eq!(
            actions,
            vec![
                Action::Forward(InboundEvent::ConfigAccepted),
                Action::StartEncoder,
            ]
        );
        assert_eq!(m.state(), SessionState::Streaming);

        // A duplicate accept is forwarded but starts nothing.
        let actions = m.handle(SessionEvent::TransportText(ACCEPTED.to_string()));
        assert_eq!(actions, vec![Action::Forward(InboundEvent::ConfigAccepted)]);
    }

    #[test]
    fn test_chunk_sent_while_streaming_and_open() {
        let mut m = accepted_machine();
        let actions = m.handle(SessionEvent::Chunk(vec![9, 9]));
        assert_eq!(actions, vec![Action::SendBinary(vec![9, 9])]);
    }

    #[test]
    fn test_chunk_after_transport_close_is_dropped() {
        let mut m = accepted_machine();
        m.handle(SessionEvent::TransportClosed);

        let actions = m.handle(SessionEvent::Chunk(vec![9, 9]));
        assert!(actions.is_empty());
        // The session stays where it was; closing is the caller's call.
        assert_eq!(m.state(), SessionState::Streaming);
    }

    #[test]
    fn test_chunk_after_transport_error_is_dropped() {
        let mut m = accepted_machine();
        m.handle(SessionEvent::TransportError("reset by peer".to_string()));
        assert!(m.handle(SessionEvent::Chunk(vec![1])).is_empty());
    }

    #[test]
    fn test_stop_sends_end_iff_transport_open() {
        let mut m = accepted_machine();
        let actions = m.handle(SessionEvent::Stop);
        assert_eq!(
            actions,
            vec![
                Action::SendText(end_message()),
                Action::StopEncoder,
                Action::CloseTransport,
            ]
        );
        assert_eq!(m.state(), SessionState::Stopping);

        // With the transport already gone, no end frame is attempted.
        let mut m = accepted_machine();
        m.handle(SessionEvent::TransportClosed);
        let actions = m.handle(SessionEvent::Stop);
        assert_eq!(actions, vec![Action::StopEncoder, Action::CloseTransport]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut m = accepted_machine();
        m.handle(SessionEvent::Stop);
        assert!(m.handle(SessionEvent::Stop).is_empty());
    }

    #[test]
    fn test_stop_before_accept_wins_the_race() {
        let mut m = open_machine();
        m.handle(SessionEvent::Stop);
        assert_eq!(m.state(), SessionState::Stopping);

        // The late accept is forwarded but must not start an encoder that
        // nothing would ever stop.
        let actions = m.handle(SessionEvent::TransportText(ACCEPTED.to_string()));
        assert_eq!(actions, vec![Action::Forward(InboundEvent::ConfigAccepted)]);
        assert_eq!(m.state(), SessionState::Stopping);
    }

    #[test]
    fn test_malformed_inbound_is_dropped_without_disrupting_the_session() {
        let mut m = open_machine();

        assert!(m
            .handle(SessionEvent::TransportText("{not json".to_string()))
            .is_empty());
        assert!(m
            .handle(SessionEvent::TransportText(r#"{"no":"type"}"#.to_string()))
            .is_empty());

        // A well-formed message afterwards still works.
        let actions = m.handle(SessionEvent::TransportText(ACCEPTED.to_string()));
        assert!(actions.contains(&Action::StartEncoder));
    }

    #[test]
    fn test_unknown_event_is_forwarded() {
        let mut m = accepted_machine();
        let actions = m.handle(SessionEvent::TransportText(
            r#"{"type":"heartbeat"}"#.to_string(),
        ));
        assert_eq!(actions, vec![Action::Forward(InboundEvent::Unknown)]);
    }

    #[test]
    fn test_close_while_stopping_reaches_terminal_state() {
        let mut m = accepted_machine();
        m.handle(SessionEvent::Stop);
        m.handle(SessionEvent::TransportClosed);
        assert_eq!(m.state(), SessionState::Closed);

        assert!(m.handle(SessionEvent::Chunk(vec![1])).is_empty());
        assert!(m.handle(SessionEvent::Stop).is_empty());
    }

    /// Full trace: open, accept, two chunks, stop. Exactly one config send,
    /// then the two binary sends in order, then the end frame.
    #[test]
    fn test_full_session_trace_ordering() {
        let mut m = machine();
        let mut trace = Vec::new();

        for event in [
            SessionEvent::TransportOpen,
            SessionEvent::TransportText(ACCEPTED.to_string()),
            SessionEvent::Chunk(vec![1]),
            SessionEvent::Chunk(vec![2]),
            SessionEvent::Stop,
        ] {
            trace.extend(m.handle(event));
        }

        let sends: Vec<&Action> = trace
            .iter()
            .filter(|a| matches!(a, Action::SendText(_) | Action::SendBinary(_)))
            .collect();
        assert_eq!(
            sends,
            vec![
                &Action::SendText(CONFIG.to_string()),
                &Action::SendBinary(vec![1]),
                &Action::SendBinary(vec![2]),
                &Action::SendText(end_message()),
            ]
        );
    }
}
