use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{AppState, book_loans, create_book, create_user, loan_book, return_book};

/// Creates the API router with the catalog and lending endpoints
///
/// Command endpoints:
/// - POST /book - Register a book
/// - POST /user - Register a user
/// - POST /book/loan - Loan a book to a user
/// - PUT /book/return - Return a loaned book
///
/// Query endpoints:
/// - GET /book/loans?book_name=... - Availability and loan history of a book
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .route("/book", post(create_book))
        .route("/user", post(create_user))
        .route("/book/loan", post(loan_book))
        .route("/book/return", put(return_book))
        .route("/book/loans", get(book_loans))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
