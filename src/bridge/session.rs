//! # Session State Machine
//!
//! One `VoiceSession` per connection. It owns the per-session recognizer and
//! tracks the lifecycle state; every decoder call is routed through the
//! worker offload layer with the recognizer moved into the closure and handed
//! back afterwards, so the decoder is never invoked concurrently for the same
//! session.
//!
//! ## Session Lifecycle:
//! ```text
//! INITIALIZING → READY → LISTENING → FINALIZING → (READY | CLOSED)
//! ```
//! `CLOSED` is reachable from any state on disconnect or a fatal
//! initialization error.

use crate::bridge::protocol::{ControlMessage, Envelope};
use crate::bridge::worker;
use crate::error::BridgeError;
use crate::recognition::engine::{DecodeState, Recognizer};
use crate::recognition::registry::ModelRegistry;
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

/// Lifecycle state of a voice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the model handle and recognizer
    Initializing,
    /// Recognizer ready, between utterance spans
    Ready,
    /// Actively accepting audio frames
    Listening,
    /// Flushing the terminal transcript after a stop
    Finalizing,
    /// Torn down; all resources released
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &str {
        match self {
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Listening => "listening",
            SessionState::Finalizing => "finalizing",
            SessionState::Closed => "closed",
        }
    }
}

/// What one accepted audio chunk produced.
enum AudioOutcome {
    /// Utterance boundary reached; completed transcript
    Utterance(String),
    /// Still accumulating; in-progress hypothesis
    Hypothesis(String),
}

/// A single voice session: identifier, state, and the recognizer it owns.
pub struct VoiceSession {
    id: String,
    state: SessionState,
    sample_rate: u32,
    recognizer: Option<Box<dyn Recognizer>>,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl VoiceSession {
    pub fn new(id: String, sample_rate: u32) -> Self {
        Self {
            id,
            state: SessionState::Initializing,
            sample_rate,
            recognizer: None,
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// How long the session has existed (up to teardown, if it happened).
    pub fn lifetime(&self) -> chrono::Duration {
        self.closed_at
            .unwrap_or_else(Utc::now)
            .signed_duration_since(self.created_at)
    }

    /// Acquire the shared model handle and build this session's recognizer.
    ///
    /// ## State Transition:
    /// Initializing → Ready (or the caller closes the session on error).
    /// The recognizer is constructed exactly once per session.
    pub async fn initialize(&mut self, registry: &ModelRegistry) -> Result<Envelope, BridgeError> {
        let model = registry.get_model().await?;

        let sample_rate = self.sample_rate;
        let recognizer = worker::run_blocking(&self.id, move || model.new_recognizer(sample_rate))
            .await
            .map_err(|err| BridgeError::RecognizerInit(err.to_string()))??;

        self.recognizer = Some(recognizer);
        self.state = SessionState::Ready;
        debug!(session_id = %self.id, sample_rate, "recognizer initialized");
        Ok(Envelope::ready())
    }

    /// Apply one control message, returning the envelopes to emit.
    pub async fn handle_control(
        &mut self,
        message: ControlMessage,
    ) -> Result<Vec<Envelope>, BridgeError> {
        match message {
            ControlMessage::Start => self.start_listening().await,
            ControlMessage::Stop => self.stop_listening().await,
        }
    }

    /// ## State Transition:
    /// Ready → Listening. A `start` while already listening restarts the
    /// span in place: the recognizer is reset either way, discarding any
    /// lingering partial hypothesis from a previous utterance.
    async fn start_listening(&mut self) -> Result<Vec<Envelope>, BridgeError> {
        match self.state {
            SessionState::Ready | SessionState::Listening => {
                let mut recognizer = self.take_recognizer()?;
                let recognizer = worker::run_blocking(&self.id, move || {
                    recognizer.reset();
                    recognizer
                })
                .await?;
                self.recognizer = Some(recognizer);
                self.state = SessionState::Listening;
                Ok(vec![Envelope::started()])
            }
            other => {
                trace!(session_id = %self.id, state = other.as_str(), "ignoring start");
                Ok(Vec::new())
            }
        }
    }

    /// ## State Transition:
    /// Listening → Finalizing → Ready. Emits `final` iff the terminal
    /// transcript is non-empty, then always `stopped`. A `stop` while
    /// already between spans takes the same path, flushing whatever the
    /// decoder still buffers.
    async fn stop_listening(&mut self) -> Result<Vec<Envelope>, BridgeError> {
        match self.state {
            SessionState::Ready | SessionState::Listening => {
                let mut recognizer = self.take_recognizer()?;
                self.state = SessionState::Finalizing;

                let outcome = worker::run_blocking(&self.id, move || {
                    let text = recognizer.final_text();
                    (recognizer, text)
                })
                .await;

                // A new start may begin another utterance on this connection,
                // so the session returns to Ready even when the flush failed.
                self.state = SessionState::Ready;
                let (recognizer, text) = outcome?;
                self.recognizer = Some(recognizer);

                let mut envelopes = Vec::new();
                let text = text?;
                if !text.is_empty() {
                    envelopes.push(Envelope::final_transcript(text));
                }
                envelopes.push(Envelope::stopped());
                Ok(envelopes)
            }
            other => {
                trace!(session_id = %self.id, state = other.as_str(), "ignoring stop");
                Ok(Vec::new())
            }
        }
    }

    /// Feed one binary audio frame to the decoder.
    ///
    /// Frames arriving outside `LISTENING` are discarded silently; the
    /// client is between utterances and the bytes have nowhere to go.
    pub async fn handle_audio(&mut self, pcm: Vec<u8>) -> Result<Vec<Envelope>, BridgeError> {
        if self.state != SessionState::Listening {
            trace!(
                session_id = %self.id,
                state = self.state.as_str(),
                bytes = pcm.len(),
                "discarding audio frame outside listening state"
            );
            return Ok(Vec::new());
        }

        let mut recognizer = self.take_recognizer()?;
        let (recognizer, outcome) = worker::run_blocking(&self.id, move || {
            let outcome = match recognizer.accept_audio(&pcm) {
                Ok(DecodeState::UtteranceBoundary) => {
                    recognizer.result_text().map(AudioOutcome::Utterance)
                }
                Ok(DecodeState::Accumulating) => {
                    recognizer.partial_text().map(AudioOutcome::Hypothesis)
                }
                Err(err) => Err(err),
            };
            (recognizer, outcome)
        })
        .await?;
        self.recognizer = Some(recognizer);

        // Empty transcripts carry no information; the source emitted nothing
        // for them and clients rely on that.
        match outcome? {
            AudioOutcome::Utterance(text) if !text.is_empty() => Ok(vec![Envelope::result(text)]),
            AudioOutcome::Hypothesis(text) if !text.is_empty() => Ok(vec![Envelope::partial(text)]),
            _ => Ok(Vec::new()),
        }
    }

    /// Tear the session down, releasing the recognizer.
    ///
    /// Idempotent; called on every exit path (clean stop, initialization
    /// failure, abrupt disconnect).
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        self.closed_at = Some(Utc::now());
        // Dropping the recognizer releases the decoder resources exactly once
        self.recognizer = None;
    }

    fn take_recognizer(&mut self) -> Result<Box<dyn Recognizer>, BridgeError> {
        self.recognizer
            .take()
            .ok_or_else(|| BridgeError::Processing("recognizer unavailable".to_string()))
    }
}
