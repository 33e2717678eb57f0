//! # Voice Session Bridge
//!
//! Turns one persistent WebSocket connection into a sequence of transcription
//! events by driving an offline recognition engine.
//!
//! ## Key Components:
//! - **Protocol Codec**: wire envelopes (control JSON + binary PCM frames)
//! - **Session State Machine**: per-session lifecycle and decoder ownership
//! - **Worker Offload Layer**: blocking decoder calls off the session task
//! - **Lifecycle loop**: transport-independent per-connection driver; the
//!   actix actor in `crate::websocket` owns the socket and feeds this loop
//!
//! ## Wire Protocol:
//! - Client → Server (text): `{"type": "start"}` / `{"type": "stop"}`
//! - Client → Server (binary): raw little-endian 16-bit mono PCM
//! - Server → Client (text): tagged envelopes
//!   `ready | error | started | partial | result | final | stopped`

pub mod lifecycle;
pub mod protocol;
pub mod session;
pub mod worker;
