//! # Application State Management
//!
//! Shared state accessed by every HTTP request handler and voice session:
//! the runtime configuration, process-wide metrics and the server start time.
//!
//! Everything mutable lives behind `Arc<RwLock<...>>` so many readers (status
//! endpoints, sessions checking limits) can proceed concurrently while
//! updates stay exclusive.

use crate::config::AppConfig;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// The main application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Performance metrics (updated by middleware and voice sessions)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,
}

/// Metrics collected across all requests and sessions.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of errors encountered since server start
    pub error_count: u64,

    /// Current number of live voice sessions
    pub active_sessions: u32,

    /// Total number of voice sessions accepted since server start
    pub total_sessions: u64,

    /// Detailed metrics for each API endpoint
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.request_count as f64
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.request_count as f64
        }
    }
}

/// Cloneable snapshot of the metrics for serialization.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub request_count: u64,
    pub error_count: u64,
    pub active_sessions: u32,
    pub total_sessions: u64,
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

impl AppState {
    /// Create a new AppState with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration after validating it.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        new_config.validate().map_err(|e| e.to_string())?;
        *self.config.write().unwrap() = new_config;
        Ok(())
    }

    /// Get a snapshot of the current metrics.
    pub fn get_metrics_snapshot(&self) -> MetricsSnapshot {
        let metrics = self.metrics.read().unwrap();
        MetricsSnapshot {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            active_sessions: metrics.active_sessions,
            total_sessions: metrics.total_sessions,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    /// Server uptime in whole seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn increment_request_count(&self) {
        self.metrics.write().unwrap().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.metrics.write().unwrap().error_count += 1;
    }

    /// Record timing for one request to one endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();
        let entry = metrics
            .endpoint_metrics
            .entry(endpoint.to_string())
            .or_default();
        entry.request_count += 1;
        entry.total_duration_ms += duration_ms;
        if is_error {
            entry.error_count += 1;
        }
    }

    /// Register a newly accepted voice session.
    pub fn session_started(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.active_sessions += 1;
        metrics.total_sessions += 1;
    }

    /// Register the end of a voice session, on any exit path.
    pub fn session_finished(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.active_sessions = metrics.active_sessions.saturating_sub(1);
    }

    /// Current number of live voice sessions.
    pub fn active_session_count(&self) -> u32 {
        self.metrics.read().unwrap().active_sessions
    }
}
