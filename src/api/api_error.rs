use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::Error;

pub(crate) struct APIError(Error);

impl IntoResponse for APIError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotInZone | Error::NoSuchDomain => StatusCode::NOT_FOUND,
            Error::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            Error::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Error::InvalidName(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "error": format!("{}", self.0),
        }));
        (status, body).into_response()
    }
}

impl From<Error> for APIError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}
