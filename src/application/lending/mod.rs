mod errors;
mod lending_service;

pub use errors::{ConflictKind, LendingError, MissingRecord, Result};
pub use lending_service::{
    BookLoanStatus, ServiceDependencies, book_loan_status, loan_book, register_book,
    register_user, return_book,
};
