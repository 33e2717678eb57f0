//! Transcript-free engine backend.
//!
//! Behaves like a real backend at the protocol level (path check on load,
//! sample-rate check on recognizer construction, chunk accounting) but never
//! produces text. Used when the binary is built without libvosk and for
//! exercising the session bridge without a model on disk.

use crate::error::BridgeError;
use crate::recognition::engine::{
    pcm_bytes_to_samples, DecodeState, Recognizer, SpeechEngine, SpeechModel,
};
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

pub struct NullEngine;

impl SpeechEngine for NullEngine {
    fn name(&self) -> &str {
        "null"
    }

    fn load_model(&self, path: &Path) -> Result<Arc<dyn SpeechModel>, BridgeError> {
        // Same contract as a real backend: a missing model directory is a
        // load failure, fatal for the session awaiting it.
        if !path.exists() {
            return Err(BridgeError::ModelLoad(format!(
                "model directory not found: {}",
                path.display()
            )));
        }
        Ok(Arc::new(NullModel))
    }
}

struct NullModel;

impl SpeechModel for NullModel {
    fn new_recognizer(&self, sample_rate: u32) -> Result<Box<dyn Recognizer>, BridgeError> {
        if sample_rate == 0 {
            return Err(BridgeError::RecognizerInit(
                "sample rate must be non-zero".to_string(),
            ));
        }
        Ok(Box::new(NullRecognizer { samples_fed: 0 }))
    }
}

struct NullRecognizer {
    samples_fed: usize,
}

impl Recognizer for NullRecognizer {
    fn reset(&mut self) {
        self.samples_fed = 0;
    }

    fn accept_audio(&mut self, pcm: &[u8]) -> Result<DecodeState, BridgeError> {
        let samples = pcm_bytes_to_samples(pcm);
        self.samples_fed += samples.len();
        trace!(samples = samples.len(), total = self.samples_fed, "null recognizer fed chunk");
        Ok(DecodeState::Accumulating)
    }

    fn partial_text(&mut self) -> Result<String, BridgeError> {
        Ok(String::new())
    }

    fn result_text(&mut self) -> Result<String, BridgeError> {
        Ok(String::new())
    }

    fn final_text(&mut self) -> Result<String, BridgeError> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_rejects_missing_path() {
        let err = NullEngine
            .load_model(Path::new("/no/such/model"))
            .err()
            .unwrap();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_accepts_existing_path() {
        let model = NullEngine.load_model(Path::new(".")).unwrap();
        assert!(model.new_recognizer(16000).is_ok());
    }

    #[test]
    fn test_recognizer_rejects_zero_rate() {
        let model = NullEngine.load_model(Path::new(".")).unwrap();
        assert!(model.new_recognizer(0).is_err());
    }

    #[test]
    fn test_recognizer_stays_silent() {
        let model = NullEngine.load_model(Path::new(".")).unwrap();
        let mut rec = model.new_recognizer(16000).unwrap();

        let state = rec.accept_audio(&[0u8; 640]).unwrap();
        assert_eq!(state, DecodeState::Accumulating);
        assert_eq!(rec.partial_text().unwrap(), "");
        assert_eq!(rec.final_text().unwrap(), "");
    }
}
