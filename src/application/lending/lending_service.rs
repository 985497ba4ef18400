use crate::domain::{
    self, Book, BookAvailability, BookName, LoanHistory, User, commands::*,
};
use crate::ports::{LendingStore, LendingTransaction, StoreError};
use std::sync::Arc;

use super::errors::{ConflictKind, LendingError, MissingRecord, Result};

/// サービスの依存関係
///
/// 起動時に一度だけ構築し、ハンドラーへはArc経由で共有する。
/// 貸出状態はここにキャッシュしない（常にストアのトランザクション内で判定する）。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub lending_store: Arc<dyn LendingStore>,
}

/// 書籍の貸出状況（読み取り専用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookLoanStatus {
    pub book: Book,
    pub availability: BookAvailability,
    /// 古い順
    pub history: Vec<LoanHistory>,
}

async fn begin(deps: &ServiceDependencies) -> Result<Box<dyn LendingTransaction>> {
    Ok(deps.lending_store.begin().await?)
}

/// 貸出履歴の挿入失敗を解釈する
///
/// 一意制約違反は、チェックをすり抜けた並行貸出とみなす。
fn map_loan_insert_error(err: StoreError) -> LendingError {
    match err {
        StoreError::UniqueViolation(detail) => {
            tracing::warn!("Active loan uniqueness violated at insert: {}", detail);
            LendingError::Conflict(ConflictKind::AlreadyLoaned)
        }
        other => LendingError::StorageUnavailable(other),
    }
}

/// 書籍をカタログに登録する
///
/// 不変条件のチェックは不要（貸出ではない）。
pub async fn register_book(deps: &ServiceDependencies, cmd: RegisterBook) -> Result<Book> {
    let mut tx = begin(deps).await?;

    let book = tx
        .save_book(Book::register(cmd.name, cmd.registered_at))
        .await?;

    tx.commit().await?;

    tracing::info!("Book registered: {} ({})", book.name, book.book_id.value());
    Ok(book)
}

/// 利用者を登録する
pub async fn register_user(deps: &ServiceDependencies, cmd: RegisterUser) -> Result<User> {
    let mut tx = begin(deps).await?;

    let user = tx
        .save_user(User::register(cmd.name, cmd.registered_at))
        .await?;

    tx.commit().await?;

    tracing::info!("User registered: {} ({})", user.name, user.user_id.value());
    Ok(user)
}

/// 書籍を貸し出す
///
/// 1つのトランザクション内で、次の順に確認する：
/// 1. 書籍が存在すること（無ければ NotFound(Book)）
/// 2. 書籍に未返却の貸出が無いこと（あれば Conflict(AlreadyLoaned)）
/// 3. 利用者が存在すること（無ければ NotFound(User)）
///
/// 2の確認と貸出履歴の挿入は同じトランザクションで行われ、間に他の
/// トランザクションが割り込むことはない。失敗時はコミットせずに
/// トランザクションを破棄するため、部分的な書き込みは残らない。
pub async fn loan_book(deps: &ServiceDependencies, cmd: LoanBook) -> Result<LoanHistory> {
    let mut tx = begin(deps).await?;

    // 1. 書籍の存在確認
    let book = tx
        .find_book_by_name(&cmd.book_name)
        .await?
        .ok_or(LendingError::NotFound(MissingRecord::Book))?;

    // 2. 貸出中か確認
    if tx.exists_active_loan(&book.name).await? {
        return Err(LendingError::Conflict(ConflictKind::AlreadyLoaned));
    }

    // 3. 利用者の存在確認
    let user = tx
        .find_user_by_name(&cmd.user_name)
        .await?
        .ok_or(LendingError::NotFound(MissingRecord::User))?;

    // 4. 貸出履歴を保存
    let loan = domain::loan::loan_book(&user, &book, cmd.loaned_at);
    let loan = tx
        .save_loan_history(loan)
        .await
        .map_err(map_loan_insert_error)?;

    tx.commit().await.map_err(map_loan_insert_error)?;

    tracing::info!(
        "Book loaned: '{}' to {} ({})",
        loan.book_name,
        user.name,
        loan.loan_history_id.value()
    );
    Ok(loan)
}

/// 書籍を返却する
///
/// 利用者と書籍名に一致する未返却の貸出を返却済みにする。
/// 一致する貸出が無い場合は何も変更せず NotFound(ActiveLoan)。
pub async fn return_book(deps: &ServiceDependencies, cmd: ReturnBook) -> Result<LoanHistory> {
    let mut tx = begin(deps).await?;

    // 利用者がいなければ、その利用者の貸出も存在しない
    let user = tx
        .find_user_by_name(&cmd.user_name)
        .await?
        .ok_or(LendingError::NotFound(MissingRecord::ActiveLoan))?;

    let active = tx
        .find_active_loan(user.user_id, &cmd.book_name)
        .await?
        .ok_or(LendingError::NotFound(MissingRecord::ActiveLoan))?;

    let returned = domain::loan::return_book(active, cmd.returned_at)
        .map_err(|_| LendingError::NotFound(MissingRecord::ActiveLoan))?;

    tx.update_loan_history(&returned).await?;
    tx.commit().await?;

    tracing::info!(
        "Book returned: '{}' by {} ({})",
        returned.book_name,
        user.name,
        returned.loan_history_id.value()
    );
    Ok(returned)
}

/// 書籍の貸出状況を取得する
///
/// 貸出履歴と、そこから導出した現在の貸出可否を返す。
pub async fn book_loan_status(
    deps: &ServiceDependencies,
    book_name: &BookName,
) -> Result<BookLoanStatus> {
    let mut tx = begin(deps).await?;

    let book = tx
        .read_book_by_name(book_name)
        .await?
        .ok_or(LendingError::NotFound(MissingRecord::Book))?;

    let history = tx.find_loan_histories_by_book_name(&book.name).await?;
    tx.commit().await?;

    Ok(BookLoanStatus {
        availability: domain::loan::availability(&history),
        book,
        history,
    })
}
