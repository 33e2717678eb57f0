//! # Session Lifecycle Loop
//!
//! One task per connection. The WebSocket actor (`crate::websocket`) feeds
//! inbound frames into a channel and forwards outbound envelopes back to the
//! socket; everything between those channels (initialization, routing,
//! error policy, teardown) happens here, independent of the transport.
//!
//! The loop never issues a second decoder call before the first returns,
//! which is what guarantees strict per-session FIFO without an explicit
//! queue. It ends when the inbound channel closes (client disconnected) or
//! initialization fails; dropping the outbound sender is the signal for the
//! transport to close the socket if it is still open; initialization
//! failure is the only case where that happens with a live connection,
//! matching the rule that the server closes only after an init `error`.

use crate::bridge::protocol::{self, Envelope, InboundFrame};
use crate::bridge::session::VoiceSession;
use crate::recognition::registry::ModelRegistry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Drive one voice session from connect to teardown.
pub async fn run_session(
    session_id: String,
    registry: Arc<ModelRegistry>,
    sample_rate: u32,
    mut inbound: mpsc::UnboundedReceiver<InboundFrame>,
    outbound: mpsc::UnboundedSender<Envelope>,
) {
    let mut session = VoiceSession::new(session_id, sample_rate);
    info!(session_id = %session.id(), "voice session initializing");

    match session.initialize(&registry).await {
        Ok(envelope) => {
            if outbound.send(envelope).is_ok() {
                info!(session_id = %session.id(), "voice session ready");
                drive(&mut session, &mut inbound, &outbound).await;
            }
        }
        Err(err) => {
            error!(session_id = %session.id(), error = %err, "voice session initialization failed");
            let _ = outbound.send(Envelope::error(err.to_string()));
        }
    }

    session.close();
    info!(
        session_id = %session.id(),
        lifetime_ms = session.lifetime().num_milliseconds(),
        "voice session closed"
    );
}

/// Route frames through the state machine until the client disconnects.
async fn drive(
    session: &mut VoiceSession,
    inbound: &mut mpsc::UnboundedReceiver<InboundFrame>,
    outbound: &mpsc::UnboundedSender<Envelope>,
) {
    while let Some(frame) = inbound.recv().await {
        let step = match frame {
            InboundFrame::Text(text) => match protocol::decode_control(&text) {
                Ok(control) => session.handle_control(control).await,
                Err(err) => {
                    // A single malformed control frame must not take down an
                    // otherwise healthy session: log and ignore, no envelope.
                    warn!(session_id = %session.id(), error = %err, "ignoring control frame");
                    continue;
                }
            },
            InboundFrame::Audio(pcm) => session.handle_audio(pcm).await,
        };

        match step {
            Ok(envelopes) => {
                for envelope in envelopes {
                    if outbound.send(envelope).is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                // Recoverable: report and keep the session in its state
                warn!(session_id = %session.id(), error = %err, "frame processing failed");
                if outbound.send(Envelope::error(err.to_string())).is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::recognition::engine::{DecodeState, Recognizer, SpeechEngine, SpeechModel};
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Engine whose model hands every new recognizer its own scripted
    /// outcome queue, in creation order.
    struct StubEngine {
        fail_load: bool,
        model: Arc<StubModel>,
    }

    struct StubModel {
        scripts: Mutex<VecDeque<RecognizerScript>>,
        created: AtomicUsize,
    }

    #[derive(Default)]
    struct RecognizerScript {
        outcomes: VecDeque<(DecodeState, String)>,
        final_text: String,
        reject_audio: bool,
    }

    struct StubRecognizer {
        outcomes: VecDeque<(DecodeState, String)>,
        final_text: String,
        reject_audio: bool,
        last: Option<(DecodeState, String)>,
    }

    impl SpeechEngine for StubEngine {
        fn name(&self) -> &str {
            "stub"
        }

        fn load_model(&self, path: &Path) -> Result<Arc<dyn SpeechModel>, BridgeError> {
            if self.fail_load {
                return Err(BridgeError::ModelLoad(format!(
                    "model directory not found: {}",
                    path.display()
                )));
            }
            Ok(Arc::clone(&self.model) as Arc<dyn SpeechModel>)
        }
    }

    impl SpeechModel for StubModel {
        fn new_recognizer(&self, _sample_rate: u32) -> Result<Box<dyn Recognizer>, BridgeError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default();
            Ok(Box::new(StubRecognizer {
                outcomes: script.outcomes,
                final_text: script.final_text,
                reject_audio: script.reject_audio,
                last: None,
            }))
        }
    }

    impl Recognizer for StubRecognizer {
        fn reset(&mut self) {
            self.last = None;
        }

        fn accept_audio(&mut self, _pcm: &[u8]) -> Result<DecodeState, BridgeError> {
            if self.reject_audio {
                return Err(BridgeError::Processing("decoder rejected chunk".to_string()));
            }
            let outcome = self
                .outcomes
                .pop_front()
                .unwrap_or((DecodeState::Accumulating, String::new()));
            let state = outcome.0;
            self.last = Some(outcome);
            Ok(state)
        }

        fn partial_text(&mut self) -> Result<String, BridgeError> {
            Ok(self.last.clone().map(|(_, t)| t).unwrap_or_default())
        }

        fn result_text(&mut self) -> Result<String, BridgeError> {
            self.partial_text()
        }

        fn final_text(&mut self) -> Result<String, BridgeError> {
            Ok(self.final_text.clone())
        }
    }

    fn registry_with(scripts: Vec<RecognizerScript>, fail_load: bool) -> Arc<ModelRegistry> {
        let model = Arc::new(StubModel {
            scripts: Mutex::new(scripts.into()),
            created: AtomicUsize::new(0),
        });
        Arc::new(ModelRegistry::new(
            Arc::new(StubEngine { fail_load, model }),
            "model-dir",
        ))
    }

    struct Transport {
        tx: mpsc::UnboundedSender<InboundFrame>,
        rx: mpsc::UnboundedReceiver<Envelope>,
        task: tokio::task::JoinHandle<()>,
    }

    fn connect(registry: Arc<ModelRegistry>, id: &str) -> Transport {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(
            id.to_string(),
            registry,
            16000,
            in_rx,
            out_tx,
        ));
        Transport {
            tx: in_tx,
            rx: out_rx,
            task,
        }
    }

    async fn expect(transport: &mut Transport, wanted: Envelope) {
        let got = transport.rx.recv().await.expect("envelope expected");
        assert_eq!(got, wanted);
    }

    #[tokio::test]
    async fn test_full_session_scenario() {
        let script = RecognizerScript {
            outcomes: VecDeque::from([
                (DecodeState::Accumulating, "hola".to_string()),
                (DecodeState::UtteranceBoundary, "hola mundo".to_string()),
            ]),
            final_text: String::new(),
            ..Default::default()
        };
        let mut t = connect(registry_with(vec![script], false), "s");

        expect(&mut t, Envelope::ready()).await;

        t.tx.send(InboundFrame::Text(r#"{"type":"start"}"#.to_string())).unwrap();
        expect(&mut t, Envelope::started()).await;

        t.tx.send(InboundFrame::Audio(vec![1, 0])).unwrap();
        expect(&mut t, Envelope::partial("hola")).await;

        t.tx.send(InboundFrame::Audio(vec![2, 0])).unwrap();
        expect(&mut t, Envelope::result("hola mundo")).await;

        // Empty terminal transcript: stopped only, no final
        t.tx.send(InboundFrame::Text(r#"{"type":"stop"}"#.to_string())).unwrap();
        expect(&mut t, Envelope::stopped()).await;

        // Disconnect: no further envelopes, task ends
        drop(t.tx);
        assert!(t.rx.recv().await.is_none());
        t.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_init_failure_emits_single_error_and_closes() {
        let mut t = connect(registry_with(Vec::new(), true), "bad");

        let first = t.rx.recv().await.unwrap();
        match first {
            Envelope::Error { message } => assert!(message.contains("model")),
            other => panic!("expected error envelope, got {:?}", other),
        }

        // Channel closes without a ready envelope ever being sent
        assert!(t.rx.recv().await.is_none());
        t.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_control_is_ignored() {
        let mut t = connect(registry_with(Vec::new(), false), "u");
        expect(&mut t, Envelope::ready()).await;

        t.tx.send(InboundFrame::Text(r#"{"type":"pause"}"#.to_string())).unwrap();
        t.tx.send(InboundFrame::Text("not json".to_string())).unwrap();

        // The session stays healthy and keeps answering control traffic
        t.tx.send(InboundFrame::Text(r#"{"type":"start"}"#.to_string())).unwrap();
        expect(&mut t, Envelope::started()).await;

        drop(t.tx);
        t.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_audio_before_start_is_discarded() {
        let mut t = connect(registry_with(Vec::new(), false), "d");
        expect(&mut t, Envelope::ready()).await;

        t.tx.send(InboundFrame::Audio(vec![9, 9])).unwrap();
        t.tx.send(InboundFrame::Text(r#"{"type":"stop"}"#.to_string())).unwrap();

        // The discarded frame produced nothing; the stop answer comes first
        expect(&mut t, Envelope::stopped()).await;
        drop(t.tx);
        t.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_audio_failure_reports_error_and_keeps_session_open() {
        let script = RecognizerScript {
            reject_audio: true,
            ..RecognizerScript::default()
        };
        let mut t = connect(registry_with(vec![script], false), "e");
        expect(&mut t, Envelope::ready()).await;

        t.tx.send(InboundFrame::Text(r#"{"type":"start"}"#.to_string())).unwrap();
        expect(&mut t, Envelope::started()).await;

        // The failed chunk is reported but never terminates the session
        t.tx.send(InboundFrame::Audio(vec![1, 0])).unwrap();
        expect(
            &mut t,
            Envelope::error("processing error: decoder rejected chunk"),
        )
        .await;

        // Still listening: control traffic keeps working afterwards
        t.tx.send(InboundFrame::Text(r#"{"type":"stop"}"#.to_string())).unwrap();
        expect(&mut t, Envelope::stopped()).await;

        drop(t.tx);
        assert!(t.rx.recv().await.is_none());
        t.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_final_emitted_when_terminal_transcript_nonempty() {
        let script = RecognizerScript {
            outcomes: VecDeque::new(),
            final_text: "hasta luego".to_string(),
            ..Default::default()
        };
        let mut t = connect(registry_with(vec![script], false), "f");
        expect(&mut t, Envelope::ready()).await;

        t.tx.send(InboundFrame::Text(r#"{"type":"start"}"#.to_string())).unwrap();
        expect(&mut t, Envelope::started()).await;

        t.tx.send(InboundFrame::Text(r#"{"type":"stop"}"#.to_string())).unwrap();
        expect(&mut t, Envelope::final_transcript("hasta luego")).await;
        expect(&mut t, Envelope::stopped()).await;

        drop(t.tx);
        t.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_decoder_state() {
        let scripts = vec![
            RecognizerScript {
                outcomes: VecDeque::from([(DecodeState::Accumulating, "uno".to_string())]),
                final_text: String::new(),
                ..Default::default()
            },
            RecognizerScript {
                outcomes: VecDeque::from([(DecodeState::Accumulating, "dos".to_string())]),
                final_text: String::new(),
                ..Default::default()
            },
        ];
        let registry = registry_with(scripts, false);
        let mut ta = connect(Arc::clone(&registry), "a");
        expect(&mut ta, Envelope::ready()).await;
        let mut tb = connect(registry, "b");
        expect(&mut tb, Envelope::ready()).await;

        ta.tx.send(InboundFrame::Text(r#"{"type":"start"}"#.to_string())).unwrap();
        expect(&mut ta, Envelope::started()).await;
        tb.tx.send(InboundFrame::Text(r#"{"type":"start"}"#.to_string())).unwrap();
        expect(&mut tb, Envelope::started()).await;

        ta.tx.send(InboundFrame::Audio(vec![1])).unwrap();
        tb.tx.send(InboundFrame::Audio(vec![2])).unwrap();

        expect(&mut ta, Envelope::partial("uno")).await;
        expect(&mut tb, Envelope::partial("dos")).await;

        drop(ta.tx);
        drop(tb.tx);
        ta.task.await.unwrap();
        tb.task.await.unwrap();
    }
}
