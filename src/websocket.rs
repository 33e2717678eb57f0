//! # WebSocket Voice Endpoint
//!
//! Clients connect to `/ws/voice` and drive the speech session protocol:
//!
//! 1. **Connection**: server initializes the recognizer and answers `ready`
//!    (or `error` followed by a close when initialization fails)
//! 2. **Control**: `{"type": "start"}` / `{"type": "stop"}` as text frames
//! 3. **Audio Streaming**: binary frames of 16-bit little-endian mono PCM
//! 4. **Transcription Results**: `partial`, `result` and `final` envelopes
//!
//! ## Actor Model:
//! Each connection is one Actix actor. The actor itself does no recognition
//! work: it forwards inbound frames into the session task spawned at start
//! and writes back whatever envelopes that task produces. Keeping a single
//! consumer task per connection is what preserves frame order end to end.

use crate::bridge::lifecycle;
use crate::bridge::protocol::{self, Envelope, InboundFrame};
use crate::recognition::registry::ModelRegistry;
use crate::state::AppState;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How often the server pings the client.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// How long without any client traffic before the connection is dropped.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// WebSocket actor for one voice session connection.
pub struct VoiceWebSocket {
    /// Unique session ID for this connection
    session_id: String,

    /// Frames are handed to the session task through this channel; dropping
    /// it (actor stop) is what triggers session teardown
    inbound_tx: Option<mpsc::UnboundedSender<InboundFrame>>,

    /// Shared model registry (process-wide, never per connection)
    registry: Arc<ModelRegistry>,

    /// Application state, for config and session metrics
    app_state: web::Data<AppState>,

    /// Last time the client sent anything
    last_heartbeat: Instant,
}

impl VoiceWebSocket {
    pub fn new(app_state: web::Data<AppState>, registry: Arc<ModelRegistry>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            inbound_tx: None,
            registry,
            app_state,
            last_heartbeat: Instant::now(),
        }
    }

    fn forward(&self, frame: InboundFrame) {
        if let Some(tx) = &self.inbound_tx {
            if tx.send(frame).is_err() {
                // Session task already gone (failed init); frame has nowhere
                // to go
                debug!(session_id = %self.session_id, "dropping frame, session task ended");
            }
        }
    }
}

impl Actor for VoiceWebSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(session_id = %self.session_id, "websocket connection started");
        self.app_state.session_started();

        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(session_id = %act.session_id, "websocket heartbeat timeout, closing connection");
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        self.inbound_tx = Some(inbound_tx);

        let sample_rate = self.app_state.get_config().recognition.sample_rate;
        tokio::spawn(lifecycle::run_session(
            self.session_id.clone(),
            Arc::clone(&self.registry),
            sample_rate,
            inbound_rx,
            outbound_tx,
        ));

        // Forward session envelopes to the socket. When the session task
        // drops its sender while the socket is still open (initialization
        // failure), the connection must be closed from this side.
        let addr = ctx.address();
        tokio::spawn(async move {
            while let Some(envelope) = outbound_rx.recv().await {
                addr.do_send(SendEnvelope(envelope));
            }
            addr.do_send(CloseConnection);
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        // Dropping the sender wakes the session task so it can release the
        // recognizer on this exit path too
        self.inbound_tx = None;
        self.app_state.session_finished();
        info!(session_id = %self.session_id, "websocket connection stopped");
    }
}

/// Envelope ready to be written to the client.
#[derive(Message)]
#[rtype(result = "()")]
struct SendEnvelope(Envelope);

/// Close the connection from the server side (init failure only).
#[derive(Message)]
#[rtype(result = "()")]
struct CloseConnection;

impl Handler<SendEnvelope> for VoiceWebSocket {
    type Result = ();

    fn handle(&mut self, msg: SendEnvelope, ctx: &mut Self::Context) {
        ctx.text(protocol::encode_envelope(&msg.0));
    }
}

impl Handler<CloseConnection> for VoiceWebSocket {
    type Result = ();

    fn handle(&mut self, _msg: CloseConnection, ctx: &mut Self::Context) {
        ctx.close(Some(ws::CloseCode::Normal.into()));
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for VoiceWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();
                self.forward(InboundFrame::Text(text.to_string()));
            }
            Ok(ws::Message::Binary(data)) => {
                self.last_heartbeat = Instant::now();
                self.forward(InboundFrame::Audio(data.to_vec()));
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!(session_id = %self.session_id, ?reason, "websocket closed by client");
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!(session_id = %self.session_id, "unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(session_id = %self.session_id, error = %err, "websocket protocol error");
                ctx.stop();
            }
        }
    }
}

/// HTTP → WebSocket upgrade handler for `/ws/voice`.
pub async fn voice_websocket(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
    registry: web::Data<ModelRegistry>,
) -> ActixResult<HttpResponse> {
    info!(peer = ?req.connection_info().peer_addr(), "new voice connection request");

    let max_sessions = app_state.get_config().performance.max_concurrent_sessions;
    if app_state.active_session_count() as usize >= max_sessions {
        warn!(max_sessions, "rejecting voice connection, session limit reached");
        return Ok(HttpResponse::ServiceUnavailable().json(json!({
            "error": {
                "type": "session_limit",
                "message": format!("maximum concurrent sessions ({}) reached", max_sessions)
            }
        })));
    }

    let websocket = VoiceWebSocket::new(app_state, registry.into_inner());
    ws::start(websocket, &req, stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::recognition;

    #[test]
    fn test_each_connection_gets_its_own_session_id() {
        let state = web::Data::new(AppState::new(AppConfig::default()));
        let engine = recognition::create_engine("null").unwrap();
        let registry = Arc::new(ModelRegistry::new(engine, "model-dir"));

        let a = VoiceWebSocket::new(state.clone(), Arc::clone(&registry));
        let b = VoiceWebSocket::new(state, registry);
        assert_ne!(a.session_id, b.session_id);
    }
}
