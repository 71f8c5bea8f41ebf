use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::auth::repo_types::StoreError;

/// Failure taxonomy shared by every outward call.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("invalid user credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{message}")]
    Upstream {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn upstream(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Upstream {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidCredentials | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Conflict(_) => "Conflict",
            Self::NotFound(_) => "NotFound",
            Self::InvalidCredentials => "InvalidCredentials",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Upstream { .. } => "UpstreamFailure",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound("user does not exist".into()),
            StoreError::Conflict => {
                Self::Conflict("user already exists with this username or email".into())
            }
            StoreError::Unavailable(source) => Self::Upstream {
                message: "credential store unavailable".into(),
                source,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    error_kind: &'static str,
    message: String,
    success: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Upstream { message, source } = &self {
            error!(error = ?source, "{message}");
        }
        let status = self.status();
        let body = ErrorBody {
            status_code: status.as_u16(),
            error_kind: self.kind(),
            message: self.to_string(),
            success: false,
        };
        (status, Json(body)).into_response()
    }
}
