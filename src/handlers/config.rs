//! Runtime configuration endpoints.
//!
//! `PUT /api/v1/config` applies partial updates to the live config. A changed
//! `recognition.model_path` or `recognition.engine` only affects sessions
//! after a restart; the shared model registry is built once at startup.

use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port
            },
            "recognition": {
                "engine": config.recognition.engine,
                "model_path": config.recognition.model_path,
                "sample_rate": config.recognition.sample_rate
            },
            "performance": {
                "max_concurrent_sessions": config.performance.max_concurrent_sessions
            }
        }
    })))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config.update_from_json(&json_str)?;

    state
        .update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": {
            "server": {
                "host": current_config.server.host,
                "port": current_config.server.port
            },
            "recognition": {
                "engine": current_config.recognition.engine,
                "model_path": current_config.recognition.model_path,
                "sample_rate": current_config.recognition.sample_rate
            },
            "performance": {
                "max_concurrent_sessions": current_config.performance.max_concurrent_sessions
            }
        }
    })))
}
