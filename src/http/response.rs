use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{debug, error};

use crate::engine::EngineError;

/// Envelope of every response body: `{message, statusCode, data}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMessage<T> {
    pub message: String,
    pub status_code: u16,
    pub data: Option<T>,
}

impl<T: Serialize> ResponseMessage<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::OK.as_u16(),
            data: Some(data),
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::CREATED.as_u16(),
            data: Some(data),
        }
    }
}

impl<T: Serialize> IntoResponse for ResponseMessage<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    Unauthorized(&'static str),
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Engine(e) => e.to_string(),
            ApiError::Unauthorized(why) => why.to_string(),
            ApiError::BadRequest(why) => why,
        };
        if status.is_server_error() {
            error!("request failed: {message}");
        } else {
            debug!("request rejected ({status}): {message}");
        }
        let body: ResponseMessage<()> = ResponseMessage {
            message,
            status_code: status.as_u16(),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}
