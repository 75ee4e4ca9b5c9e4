use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cfeed_delivery::DeliveryError;
use cfeed_sdk::SdkError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("{0}")]
    Delivery(#[from] DeliveryError),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<SdkError> for NodeError {
    fn from(e: SdkError) -> Self {
        match e {
            SdkError::Delivery(d) => NodeError::Delivery(d),
            other => NodeError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = match &self {
            NodeError::Delivery(DeliveryError::DuplicateId(_)) => StatusCode::CONFLICT,
            NodeError::Delivery(_) | NodeError::Config(_) => StatusCode::BAD_REQUEST,
            NodeError::Io(_) | NodeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
