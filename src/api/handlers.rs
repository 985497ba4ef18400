use crate::application::lending::{
    ServiceDependencies, book_loan_status as execute_book_loan_status,
    loan_book as execute_loan_book, register_book as execute_register_book,
    register_user as execute_register_user, return_book as execute_return_book,
};
use crate::domain::BookName;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Utc;
use std::sync::Arc;

use super::{
    error::ApiError,
    types::{
        BookCreateRequest, BookLoanRequest, BookLoanStatusResponse, BookLoansQuery, BookResponse,
        LoanHistoryResponse, UserCreateRequest, UserResponse,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}

// ============================================================================
// Command handlers
// ============================================================================

/// POST /book - 書籍をカタログに登録
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookCreateRequest>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    let cmd = req.to_command(Utc::now())?;

    let book = execute_register_book(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

/// POST /user - 利用者を登録
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserCreateRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let cmd = req.to_command(Utc::now())?;

    let user = execute_register_user(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// POST /book/loan - 書籍を貸し出す
///
/// 強制されるビジネスルール:
/// - 書籍が存在すること（404）
/// - 書籍が貸出中でないこと（409）
/// - 利用者が存在すること（404）
pub async fn loan_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookLoanRequest>,
) -> Result<(StatusCode, Json<LoanHistoryResponse>), ApiError> {
    let cmd = req.to_loan_command(Utc::now())?;

    let loan = execute_loan_book(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(LoanHistoryResponse::from(loan))))
}

/// PUT /book/return - 書籍を返却する
///
/// 利用者がその書籍を借りていない場合は404。
pub async fn return_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookLoanRequest>,
) -> Result<Json<LoanHistoryResponse>, ApiError> {
    let cmd = req.to_return_command(Utc::now())?;

    let loan = execute_return_book(&state.service_deps, cmd).await?;

    Ok(Json(LoanHistoryResponse::from(loan)))
}

// ============================================================================
// Query handlers
// ============================================================================

/// GET /book/loans?book_name=... - 書籍の貸出状況と履歴
pub async fn book_loans(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BookLoansQuery>,
) -> Result<Json<BookLoanStatusResponse>, ApiError> {
    let book_name = BookName::parse(&query.book_name)?;

    let status = execute_book_loan_status(&state.service_deps, &book_name).await?;

    Ok(Json(BookLoanStatusResponse::from(status)))
}
