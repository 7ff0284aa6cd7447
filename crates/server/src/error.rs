use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ecotag_scan::PipelineError;
use serde_json::json;

/// Errors surfaced at the HTTP boundary.
///
/// Messages are fixed per code; provider and internal detail is logged,
/// never returned to the client.
#[derive(Debug)]
pub enum ApiError {
    MissingImage,
    PayloadTooLarge,
    Upstream,
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingImage => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Upstream => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingImage => "MISSING_IMAGE",
            ApiError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ApiError::Upstream => "UPSTREAM_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ApiError::MissingImage => "An image file is required in field 'image'.",
            ApiError::PayloadTooLarge => "Uploaded image exceeds the size limit.",
            ApiError::Upstream => "Failed to analyze image with AI provider.",
            ApiError::Internal(_) => "Unexpected server error.",
        }
    }

    pub fn body(&self) -> serde_json::Value {
        json!({"error": {"code": self.code(), "message": self.message()}})
    }
}

impl From<MultipartError> for ApiError {
    /// Oversized bodies are reported as such; other client-side framing
    /// errors mean no readable `image` field was sent.
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            tracing::debug!("Upload over size limit: {err}");
            ApiError::PayloadTooLarge
        } else if status.is_client_error() {
            tracing::debug!("Malformed multipart body: {err}");
            ApiError::MissingImage
        } else {
            ApiError::Internal(format!("Failed to read multipart body: {err}"))
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Upstream(e) => {
                tracing::error!("AI provider error: {e}");
                ApiError::Upstream
            }
            PipelineError::Estimate(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!("Internal error: {detail}");
        }
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecotag_core::EstimateError;
    use ecotag_scan::ExtractError;

    #[test]
    fn pipeline_errors_map_to_boundary_codes() {
        let upstream: ApiError = PipelineError::Upstream(ExtractError::Provider("timeout".into())).into();
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(upstream.code(), "UPSTREAM_ERROR");

        let internal: ApiError = PipelineError::Estimate(EstimateError::CareStructure).into();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn body_never_carries_internal_detail() {
        let err = ApiError::Internal("sqlite exploded at line 42".into());
        assert_eq!(
            err.body(),
            json!({"error": {"code": "INTERNAL_ERROR", "message": "Unexpected server error."}})
        );
    }
}
