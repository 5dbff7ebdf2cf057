use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Reasons a `/boom` request is turned away before any load is generated.
#[derive(Error, Debug)]
pub enum BoomError {
    #[error("Missing URL")]
    MissingUrl,

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid URL: unsupported scheme {0:?}")]
    UnsupportedScheme(String),
}

impl BoomError {
    pub fn status(&self) -> StatusCode {
        match self {
            BoomError::MissingUrl => StatusCode::METHOD_NOT_ALLOWED,
            BoomError::InvalidUrl(_) | BoomError::UnsupportedScheme(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for BoomError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
