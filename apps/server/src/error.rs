use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use covermesh_quote_engine::QuoteEngineError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Engine(#[from] QuoteEngineError),
    #[error("Not Found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) => match e {
                QuoteEngineError::Validation(_) | QuoteEngineError::Config { .. } => {
                    StatusCode::BAD_REQUEST
                }
                QuoteEngineError::NoEligibleProvider { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                QuoteEngineError::ProviderUnavailable { .. } => StatusCode::NOT_FOUND,
                QuoteEngineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                QuoteEngineError::Http { .. }
                | QuoteEngineError::Network { .. }
                | QuoteEngineError::CircuitOpen { .. }
                | QuoteEngineError::InvalidResponse { .. } => StatusCode::BAD_GATEWAY,
                QuoteEngineError::Storage { .. } | QuoteEngineError::TaskFailed { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
