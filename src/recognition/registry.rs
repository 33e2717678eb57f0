//! # Model Registry
//!
//! Holds the single process-wide recognition model handle. The first session
//! to ask triggers the blocking load (offloaded to the worker layer);
//! concurrent sessions queue on an async mutex and all receive the same
//! handle once it is ready. Single-flight via mutual exclusion, never a
//! duplicate load.
//!
//! There is no unload operation: the handle lives for the process lifetime.
//! The source system reloaded the model on every connection; keeping one
//! shared, read-only handle is a deliberate correction of that behavior.

use crate::bridge::worker;
use crate::error::BridgeError;
use crate::recognition::engine::{SpeechEngine, SpeechModel};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct ModelRegistry {
    engine: Arc<dyn SpeechEngine>,
    model_path: PathBuf,

    /// Loaded model slot. The mutex is held across the load itself so a
    /// second caller can never start a duplicate load; a failed load leaves
    /// the slot empty and a later session may retry.
    model: Mutex<Option<Arc<dyn SpeechModel>>>,
}

impl ModelRegistry {
    pub fn new(engine: Arc<dyn SpeechEngine>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            model_path: model_path.into(),
            model: Mutex::new(None),
        }
    }

    /// Engine backend name, for status endpoints.
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Get the shared model handle, loading it on first use.
    ///
    /// Suspends while another caller is already loading and returns the
    /// handle that load produced. Fails with `BridgeError::ModelLoad`; the
    /// error is fatal for the awaiting session, not for the process.
    pub async fn get_model(&self) -> Result<Arc<dyn SpeechModel>, BridgeError> {
        let mut slot = self.model.lock().await;

        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }

        info!(path = %self.model_path.display(), engine = self.engine.name(), "loading recognition model");
        let engine = Arc::clone(&self.engine);
        let path = self.model_path.clone();

        let result = worker::run_blocking("model-registry", move || engine.load_model(&path)).await;
        match result {
            Ok(Ok(model)) => {
                info!(path = %self.model_path.display(), "recognition model ready");
                *slot = Some(Arc::clone(&model));
                Ok(model)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "recognition model load failed");
                Err(err)
            }
            Err(err) => Err(BridgeError::ModelLoad(err.to_string())),
        }
    }

    /// Whether the model has already been loaded.
    ///
    /// Non-blocking: while a load is in progress the slot is locked and this
    /// reports `false`, which is also the truthful answer.
    pub fn is_loaded(&self) -> bool {
        match self.model.try_lock() {
            Ok(slot) => slot.is_some(),
            Err(_) => false,
        }
    }
}
