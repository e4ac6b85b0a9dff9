//! Error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    domain::ValueObjectError, infrastructure::dto::http::ErrorResponse, usecase::ChatServiceError,
};

/// A `ChatServiceError` rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub ChatServiceError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ChatServiceError::ChatNotFound(_) | ChatServiceError::MessageNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ChatServiceError::NotAllowed => StatusCode::FORBIDDEN,
            ChatServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ChatServiceError::RoomClosed => StatusCode::SERVICE_UNAVAILABLE,
            ChatServiceError::Session(_) | ChatServiceError::Persistence { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ChatServiceError> for ApiError {
    fn from(err: ChatServiceError) -> Self {
        Self(err)
    }
}

impl From<ValueObjectError> for ApiError {
    fn from(err: ValueObjectError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RepositoryError;

    #[test]
    fn test_status_mapping() {
        // テスト項目: サービスのエラーが適切な HTTP ステータスに対応する
        // given (前提条件):
        let cases = [
            (ChatServiceError::ChatNotFound("x".to_string()), StatusCode::NOT_FOUND),
            (ChatServiceError::MessageNotFound("x".to_string()), StatusCode::NOT_FOUND),
            (ChatServiceError::NotAllowed, StatusCode::FORBIDDEN),
            (ValueObjectError::EmptyChatName.into(), StatusCode::BAD_REQUEST),
            (ChatServiceError::RoomClosed, StatusCode::SERVICE_UNAVAILABLE),
            (
                ChatServiceError::Persistence {
                    operation: "save",
                    source: RepositoryError::Storage("down".to_string()),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            // when (操作):
            let status = ApiError(err).status();

            // then (期待する結果):
            assert_eq!(status, expected);
        }
    }
}
