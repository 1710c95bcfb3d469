//! JSON API handlers
//!
//! Each handler turns one routed request into a complete [`Response`].

use serde_json::json;

use crate::capture::CaptureSource;
use crate::encoder::Encoder;
use crate::http::{Response, Status};
use crate::session::RelayContext;

/// `GET /api/displays`
pub async fn list_displays<C: CaptureSource, E: Encoder>(context: &RelayContext<C, E>) -> Response {
    match context.capture.displays().await {
        Ok(displays) => match serde_json::to_string(&displays) {
            Ok(body) => Response::json(Status::Ok, body),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode display list");
                displays_failed()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Failed to list displays");
            displays_failed()
        }
    }
}

fn displays_failed() -> Response {
    Response::json(
        Status::InternalServerError,
        json!({ "error": "Failed to list displays" }).to_string(),
    )
}

/// `GET /api/config`
pub fn get_config<C: CaptureSource, E: Encoder>(context: &RelayContext<C, E>) -> Response {
    Response::json(Status::Ok, context.settings.get().to_json())
}

/// `POST /api/config`. Invalid or missing bodies leave the settings as they were.
pub fn update_config<C: CaptureSource, E: Encoder>(context: &RelayContext<C, E>, body: Option<&str>) -> Response {
    let Some(body) = body else {
        return invalid_config();
    };

    match context.settings.update_from_json(body) {
        Ok(settings) => {
            tracing::info!(
                max_dimension = settings.max_dimension,
                quality = settings.video_quality,
                fps = settings.target_fps,
                drop_frames_when_busy = settings.drop_frames_when_busy,
                "Settings updated"
            );
            Response::json(Status::Ok, json!({ "status": "ok" }).to_string())
        }
        Err(e) => {
            tracing::debug!(error = %e, "Rejected settings update");
            invalid_config()
        }
    }
}

fn invalid_config() -> Response {
    Response::json(Status::BadRequest, json!({ "error": "Invalid config" }).to_string())
}
