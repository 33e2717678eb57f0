//! Vosk engine backend (Kaldi-based offline recognition).
//!
//! Compiled only with the `vosk` feature since the `vosk` crate links
//! against the native libvosk library. The model directory is the standard
//! unpacked Vosk model layout (am/, graph/, conf/, ...).

use crate::error::BridgeError;
use crate::recognition::engine::{
    pcm_bytes_to_samples, DecodeState, Recognizer, SpeechEngine, SpeechModel,
};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use vosk::{CompleteResult, DecodingState, Model};

pub struct VoskEngine;

impl SpeechEngine for VoskEngine {
    fn name(&self) -> &str {
        "vosk"
    }

    fn load_model(&self, path: &Path) -> Result<Arc<dyn SpeechModel>, BridgeError> {
        if !path.exists() {
            return Err(BridgeError::ModelLoad(format!(
                "model directory not found: {}",
                path.display()
            )));
        }

        let model = Model::new(path.to_string_lossy()).ok_or_else(|| {
            BridgeError::ModelLoad(format!(
                "libvosk failed to load model from {}",
                path.display()
            ))
        })?;

        debug!(path = %path.display(), "vosk model loaded");
        Ok(Arc::new(VoskModel { model }))
    }
}

struct VoskModel {
    model: Model,
}

impl SpeechModel for VoskModel {
    fn new_recognizer(&self, sample_rate: u32) -> Result<Box<dyn Recognizer>, BridgeError> {
        let mut inner =
            vosk::Recognizer::new(&self.model, sample_rate as f32).ok_or_else(|| {
                BridgeError::RecognizerInit(format!(
                    "libvosk rejected recognizer at {} Hz",
                    sample_rate
                ))
            })?;
        inner.set_words(true);
        Ok(Box::new(VoskRecognizer { inner }))
    }
}

struct VoskRecognizer {
    inner: vosk::Recognizer,
}

impl VoskRecognizer {
    fn text_of(result: CompleteResult<'_>) -> String {
        match result {
            CompleteResult::Single(single) => single.text.to_string(),
            CompleteResult::Multiple(multiple) => multiple
                .alternatives
                .first()
                .map(|alt| alt.text.to_string())
                .unwrap_or_default(),
        }
    }
}

impl Recognizer for VoskRecognizer {
    fn reset(&mut self) {
        self.inner.reset();
    }

    fn accept_audio(&mut self, pcm: &[u8]) -> Result<DecodeState, BridgeError> {
        let samples = pcm_bytes_to_samples(pcm);
        match self.inner.accept_waveform(&samples) {
            Ok(DecodingState::Finalized) => Ok(DecodeState::UtteranceBoundary),
            Ok(DecodingState::Running) => Ok(DecodeState::Accumulating),
            Ok(DecodingState::Failed) => Err(BridgeError::Processing(
                "decoder rejected audio chunk".to_string(),
            )),
            Err(err) => Err(BridgeError::Processing(format!(
                "decoder failed to accept waveform: {:?}",
                err
            ))),
        }
    }

    fn partial_text(&mut self) -> Result<String, BridgeError> {
        Ok(self.inner.partial_result().partial.to_string())
    }

    fn result_text(&mut self) -> Result<String, BridgeError> {
        Ok(Self::text_of(self.inner.result()))
    }

    fn final_text(&mut self) -> Result<String, BridgeError> {
        Ok(Self::text_of(self.inner.final_result()))
    }
}
