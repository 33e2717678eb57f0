//! # Speech Recognition Module
//!
//! Consumes an offline recognition engine as an opaque capability: the rest
//! of the application only sees the `SpeechEngine` / `SpeechModel` /
//! `Recognizer` traits, never a concrete backend.
//!
//! ## Key Components:
//! - **Engine traits**: the capability surface every backend implements
//! - **Model Registry**: once-per-process, single-flight model loading
//! - **Vosk backend**: real offline recognition (feature `vosk`, needs libvosk)
//! - **Null backend**: path-checked, transcript-free engine for builds
//!   without libvosk and for protocol-level smoke runs

pub mod engine;
pub mod registry;

#[cfg(feature = "vosk")]
pub mod vosk;

pub mod null;

pub use engine::create_engine;
