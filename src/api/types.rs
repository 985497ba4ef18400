use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::lending::BookLoanStatus;
use crate::domain::{
    Book, BookName, LoanHistory, NameError, User, UserName,
    commands::{LoanBook, RegisterBook, RegisterUser, ReturnBook},
};

/// 書籍登録リクエスト（POST /book）
#[derive(Debug, Serialize, Deserialize)]
pub struct BookCreateRequest {
    pub name: String,
}

impl BookCreateRequest {
    pub fn to_command(&self, now: DateTime<Utc>) -> Result<RegisterBook, NameError> {
        Ok(RegisterBook {
            name: BookName::parse(&self.name)?,
            registered_at: now,
        })
    }
}

/// 利用者登録リクエスト（POST /user）
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCreateRequest {
    pub name: String,
}

impl UserCreateRequest {
    pub fn to_command(&self, now: DateTime<Utc>) -> Result<RegisterUser, NameError> {
        Ok(RegisterUser {
            name: UserName::parse(&self.name)?,
            registered_at: now,
        })
    }
}

/// 貸出・返却リクエスト（POST /book/loan, PUT /book/return）
#[derive(Debug, Serialize, Deserialize)]
pub struct BookLoanRequest {
    pub user_name: String,
    pub book_name: String,
}

impl BookLoanRequest {
    pub fn to_loan_command(&self, now: DateTime<Utc>) -> Result<LoanBook, NameError> {
        Ok(LoanBook {
            user_name: UserName::parse(&self.user_name)?,
            book_name: BookName::parse(&self.book_name)?,
            loaned_at: now,
        })
    }

    pub fn to_return_command(&self, now: DateTime<Utc>) -> Result<ReturnBook, NameError> {
        Ok(ReturnBook {
            user_name: UserName::parse(&self.user_name)?,
            book_name: BookName::parse(&self.book_name)?,
            returned_at: now,
        })
    }
}

/// 貸出状況取得のクエリパラメータ（GET /book/loans）
#[derive(Debug, Deserialize)]
pub struct BookLoansQuery {
    pub book_name: String,
}

/// 書籍レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct BookResponse {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.book_id.value(),
            name: book.name.into(),
            created_at: book.created_at,
        }
    }
}

/// 利用者レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.user_id.value(),
            name: user.name.into(),
            created_at: user.created_at,
        }
    }
}

/// 貸出履歴レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanHistoryResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_name: String,
    pub is_return: bool,
    pub loaned_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl From<LoanHistory> for LoanHistoryResponse {
    fn from(loan: LoanHistory) -> Self {
        Self {
            id: loan.loan_history_id.value(),
            user_id: loan.user_id.value(),
            book_name: loan.book_name.into(),
            is_return: loan.returned,
            loaned_at: loan.loaned_at,
            returned_at: loan.returned_at,
        }
    }
}

/// 貸出状況レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct BookLoanStatusResponse {
    pub book_name: String,
    /// "available" または "loaned"
    pub availability: String,
    pub history: Vec<LoanHistoryResponse>,
}

impl From<BookLoanStatus> for BookLoanStatusResponse {
    fn from(status: BookLoanStatus) -> Self {
        Self {
            book_name: status.book.name.into(),
            availability: status.availability.as_str().to_string(),
            history: status
                .history
                .into_iter()
                .map(LoanHistoryResponse::from)
                .collect(),
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
