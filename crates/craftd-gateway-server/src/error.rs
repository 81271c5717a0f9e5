use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use craftd_common::{ActionOutcome, CraftdError};
use serde_json::json;
use tracing::{error, warn};

/// Lifecycle error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub CraftdError);

impl From<CraftdError> for ApiError {
    fn from(err: CraftdError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(CraftdError::InvalidRequest(rejection.body_text()))
    }
}

/// `Json` extractor whose rejections use the API error body.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

pub fn status_for(err: &CraftdError) -> StatusCode {
    match err {
        CraftdError::InvalidRequest(_) | CraftdError::CommandRejected(_) => {
            StatusCode::BAD_REQUEST
        }
        CraftdError::NotFound(_) | CraftdError::LogFetchFailed { .. } => StatusCode::NOT_FOUND,
        CraftdError::PortConflict { .. } => StatusCode::CONFLICT,
        CraftdError::ImageUnavailable { .. } => StatusCode::BAD_GATEWAY,
        CraftdError::ActionFailed { .. } => StatusCode::OK,
        CraftdError::ProvisionFailed(_) | CraftdError::Config(_) | CraftdError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = self.0.to_string();

        // A failed action is still a well-formed action outcome
        if let CraftdError::ActionFailed { .. } = self.0 {
            return (status, Json(ActionOutcome::failed(message))).into_response();
        }

        if status.is_server_error() {
            error!(code = self.0.code(), %message, "Request failed");
        } else {
            warn!(code = self.0.code(), %message, "Request rejected");
        }

        let body = json!({
            "success": false,
            "code": self.0.code(),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&CraftdError::PortConflict { port: 25565 }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&CraftdError::CommandRejected("empty".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&CraftdError::ImageUnavailable {
                image: "x".into(),
                reason: "y".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&CraftdError::ProvisionFailed("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
