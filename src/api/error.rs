use crate::application::lending::{ConflictKind, LendingError, MissingRecord};
use crate::domain::NameError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub struct ApiError(LendingError);

impl From<LendingError> for ApiError {
    fn from(err: LendingError) -> Self {
        ApiError(err)
    }
}

impl From<NameError> for ApiError {
    fn from(err: NameError) -> Self {
        ApiError(LendingError::InvalidName(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self.0 {
            // 404 Not Found - 参照先が存在しない
            LendingError::NotFound(MissingRecord::Book) => (
                StatusCode::NOT_FOUND,
                "BOOK_NOT_FOUND",
                "Book not found".to_string(),
            ),
            LendingError::NotFound(MissingRecord::User) => (
                StatusCode::NOT_FOUND,
                "USER_NOT_FOUND",
                "User not found".to_string(),
            ),
            LendingError::NotFound(MissingRecord::ActiveLoan) => (
                StatusCode::NOT_FOUND,
                "ACTIVE_LOAN_NOT_FOUND",
                "No active loan for this user and book".to_string(),
            ),

            // 409 Conflict - 不変条件違反により拒否
            LendingError::Conflict(ConflictKind::AlreadyLoaned) => (
                StatusCode::CONFLICT,
                "ALREADY_LOANED",
                "Book is already on loan".to_string(),
            ),

            // 400 Bad Request - 入力値の不正
            LendingError::InvalidName(ref e) => {
                (StatusCode::BAD_REQUEST, "INVALID_NAME", e.to_string())
            }

            // 503 Service Unavailable - ストア障害
            // 詳細はログに記録し、クライアントには一般的なメッセージのみを返す
            LendingError::StorageUnavailable(ref e) => {
                tracing::error!("Storage error: {:?}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORAGE_UNAVAILABLE",
                    "Storage is temporarily unavailable".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
