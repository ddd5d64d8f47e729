//! OrderError -> HTTP response

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::OrderError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

impl OrderError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) | Self::InvalidStateTransition(_) | Self::PromoUnusable(_) => StatusCode::FORBIDDEN,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::InsufficientStock => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Storage(e) => {
                tracing::error!(error = %e, "Store failure");
                "Internal storage error".to_string()
            }
            Self::Internal(m) => {
                tracing::error!(error = %m, "Internal failure");
                "Internal error".to_string()
            }
            other => other.to_string(),
        };
        (self.status(), Json(ErrorBody { kind: self.kind(), message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(OrderError::NotFound("order").status(), StatusCode::NOT_FOUND);
        assert_eq!(OrderError::InsufficientStock.status(), StatusCode::CONFLICT);
        assert_eq!(OrderError::PromoUnusable("expired".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(OrderError::InvalidStateTransition("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(OrderError::Upstream("gateway".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(OrderError::Storage(sqlx::Error::PoolTimedOut).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
