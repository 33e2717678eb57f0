//! # Engine Capability Surface
//!
//! Traits every recognition backend implements. The split mirrors the
//! lifetimes involved:
//!
//! - `SpeechEngine`: stateless entry point, knows how to load a model
//! - `SpeechModel`: the expensive, immutable, process-shared handle; acts as
//!   the factory for per-session recognizers
//! - `Recognizer`: per-session mutable decoder state, exclusively owned by
//!   one session and never invoked concurrently
//!
//! All three are object-safe so the bridge can hold `Arc<dyn SpeechModel>` /
//! `Box<dyn Recognizer>` without knowing the backend.

use crate::error::BridgeError;
use byteorder::{ByteOrder, LittleEndian};
use std::path::Path;
use std::sync::Arc;

/// Outcome of feeding one audio chunk to a recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// The decoder judged a spoken phrase complete; a result transcript is
    /// available
    UtteranceBoundary,

    /// The decoder is still accumulating audio; at most a partial hypothesis
    /// is available
    Accumulating,
}

/// A recognition engine backend.
pub trait SpeechEngine: Send + Sync {
    /// Backend name as used in the configuration file.
    fn name(&self) -> &str;

    /// Load the recognition model from disk.
    ///
    /// Blocking and expensive; callers must run this through the worker
    /// offload layer. Fails with `BridgeError::ModelLoad` if the path does
    /// not exist or the underlying load fails.
    fn load_model(&self, path: &Path) -> Result<Arc<dyn SpeechModel>, BridgeError>;
}

/// An immutable, process-shared model handle.
///
/// Doubles as the recognizer factory: building per-session decoder state is
/// cheap relative to the model load it is seeded from.
pub trait SpeechModel: Send + Sync {
    /// Construct a fresh per-session recognizer at the given sample rate.
    ///
    /// Fails with `BridgeError::RecognizerInit` if the rate is unsupported.
    fn new_recognizer(&self, sample_rate: u32) -> Result<Box<dyn Recognizer>, BridgeError>;
}

/// Per-session decoder state.
///
/// All methods are blocking and must be driven through the worker offload
/// layer; the bridge guarantees a single call in flight per session.
pub trait Recognizer: Send {
    /// Discard any accumulated audio and partial hypothesis.
    fn reset(&mut self);

    /// Feed one chunk of little-endian 16-bit mono PCM bytes.
    fn accept_audio(&mut self, pcm: &[u8]) -> Result<DecodeState, BridgeError>;

    /// In-progress hypothesis for the current utterance (may be empty).
    fn partial_text(&mut self) -> Result<String, BridgeError>;

    /// Transcript of the utterance completed at the last boundary.
    fn result_text(&mut self) -> Result<String, BridgeError>;

    /// Terminal transcript, flushing whatever audio is still buffered
    /// (may be empty).
    fn final_text(&mut self) -> Result<String, BridgeError>;
}

/// Create the engine backend selected in the configuration.
pub fn create_engine(name: &str) -> Result<Arc<dyn SpeechEngine>, BridgeError> {
    match name {
        #[cfg(feature = "vosk")]
        "vosk" => Ok(Arc::new(crate::recognition::vosk::VoskEngine)),

        "null" => Ok(Arc::new(crate::recognition::null::NullEngine)),

        other => Err(BridgeError::ModelLoad(format!(
            "unknown recognition engine '{}' (compiled backends: {})",
            other,
            compiled_backends().join(", ")
        ))),
    }
}

fn compiled_backends() -> Vec<&'static str> {
    let mut backends = vec!["null"];
    if cfg!(feature = "vosk") {
        backends.insert(0, "vosk");
    }
    backends
}

/// Convert raw little-endian PCM bytes to i16 samples.
///
/// A trailing odd byte cannot form a sample and is dropped.
pub fn pcm_bytes_to_samples(pcm: &[u8]) -> Vec<i16> {
    let sample_count = pcm.len() / 2;
    let mut samples = vec![0i16; sample_count];
    LittleEndian::read_i16_into(&pcm[..sample_count * 2], &mut samples);
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_conversion() {
        let bytes = [0x01, 0x00, 0xFF, 0x7F, 0x00, 0x80];
        assert_eq!(pcm_bytes_to_samples(&bytes), vec![1, i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_pcm_conversion_drops_trailing_byte() {
        let bytes = [0x01, 0x00, 0xAB];
        assert_eq!(pcm_bytes_to_samples(&bytes), vec![1]);
    }

    #[test]
    fn test_pcm_conversion_empty() {
        assert!(pcm_bytes_to_samples(&[]).is_empty());
    }

    #[test]
    fn test_create_engine_unknown_name() {
        let err = match create_engine("whisper") {
            Ok(_) => panic!("unknown engine name must not construct a backend"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("unknown recognition engine"));
        assert!(err.to_string().contains("null"));
    }

    #[test]
    fn test_create_engine_null() {
        let engine = create_engine("null").unwrap();
        assert_eq!(engine.name(), "null");
    }
}
