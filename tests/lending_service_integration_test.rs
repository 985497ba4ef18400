use async_trait::async_trait;
use chrono::Utc;
use rusty_library_lending::application::lending::{
    ConflictKind, LendingError, MissingRecord, ServiceDependencies, book_loan_status, loan_book,
    return_book,
};
use rusty_library_lending::domain::commands::{LoanBook, ReturnBook};
use rusty_library_lending::domain::*;
use rusty_library_lending::ports::*;
use std::collections::HashMap;
use std::sync::Arc;

mod common;

use common::{book_name, in_memory_deps, seed_book, seed_user, user_name};

// ============================================================================
// ヘルパー
// ============================================================================

fn loan_cmd(user: &str, book: &str) -> LoanBook {
    LoanBook {
        user_name: user_name(user),
        book_name: book_name(book),
        loaned_at: Utc::now(),
    }
}

fn return_cmd(user: &str, book: &str) -> ReturnBook {
    ReturnBook {
        user_name: user_name(user),
        book_name: book_name(book),
        returned_at: Utc::now(),
    }
}

/// 書籍名ごとの未返却件数
fn active_counts(histories: &[LoanHistory]) -> HashMap<BookName, usize> {
    let mut counts = HashMap::new();
    for loan in histories.iter().filter(|loan| loan.is_active()) {
        *counts.entry(loan.book_name.clone()).or_insert(0) += 1;
    }
    counts
}

// ============================================================================
// シナリオ
// ============================================================================

#[tokio::test]
async fn test_clean_code_scenario() {
    let (store, deps) = in_memory_deps();
    seed_book(&deps, "Clean Code").await;
    let alice = seed_user(&deps, "Alice").await;
    let bob = seed_user(&deps, "Bob").await;

    // Alice が借りる
    let first = loan_book(&deps, loan_cmd("Alice", "Clean Code"))
        .await
        .expect("Alice should be able to borrow");
    assert_eq!(first.user_id, alice.user_id);
    assert_eq!(first.book_name, book_name("Clean Code"));
    assert!(!first.returned);

    // Bob は借りられない
    let result = loan_book(&deps, loan_cmd("Bob", "Clean Code")).await;
    assert!(matches!(
        result,
        Err(LendingError::Conflict(ConflictKind::AlreadyLoaned))
    ));

    // Alice が返却する（同じ履歴が返却済みになる）
    let returned = return_book(&deps, return_cmd("Alice", "Clean Code"))
        .await
        .expect("Alice should be able to return");
    assert_eq!(returned.loan_history_id, first.loan_history_id);
    assert!(returned.returned);
    assert!(returned.returned_at.is_some());

    // Bob が借りられる
    let second = loan_book(&deps, loan_cmd("Bob", "Clean Code"))
        .await
        .expect("Bob should be able to borrow after return");
    assert_eq!(second.user_id, bob.user_id);

    let histories = store.loan_histories().await;
    assert_eq!(histories.len(), 2);
    assert_eq!(active_counts(&histories).get(&book_name("Clean Code")), Some(&1));
}

#[tokio::test]
async fn test_loan_by_unknown_user_creates_nothing() {
    let (store, deps) = in_memory_deps();
    seed_book(&deps, "Clean Code").await;

    let result = loan_book(&deps, loan_cmd("Nobody", "Clean Code")).await;

    assert!(matches!(
        result,
        Err(LendingError::NotFound(MissingRecord::User))
    ));
    assert!(store.loan_histories().await.is_empty());
}

#[tokio::test]
async fn test_loan_of_unknown_book_fails() {
    let (store, deps) = in_memory_deps();
    seed_user(&deps, "Alice").await;

    let result = loan_book(&deps, loan_cmd("Alice", "Missing Book")).await;

    assert!(matches!(
        result,
        Err(LendingError::NotFound(MissingRecord::Book))
    ));
    assert!(store.loan_histories().await.is_empty());
}

#[tokio::test]
async fn test_loan_checks_book_before_user() {
    let (_store, deps) = in_memory_deps();

    let result = loan_book(&deps, loan_cmd("Nobody", "Missing Book")).await;

    assert!(matches!(
        result,
        Err(LendingError::NotFound(MissingRecord::Book))
    ));
}

#[tokio::test]
async fn test_loan_checks_active_loan_before_user() {
    let (_store, deps) = in_memory_deps();
    seed_book(&deps, "Clean Code").await;
    seed_user(&deps, "Alice").await;
    loan_book(&deps, loan_cmd("Alice", "Clean Code"))
        .await
        .unwrap();

    let result = loan_book(&deps, loan_cmd("Nobody", "Clean Code")).await;

    assert!(matches!(
        result,
        Err(LendingError::Conflict(ConflictKind::AlreadyLoaned))
    ));
}

#[tokio::test]
async fn test_same_user_cannot_borrow_twice() {
    let (store, deps) = in_memory_deps();
    seed_book(&deps, "Clean Code").await;
    seed_user(&deps, "Alice").await;

    loan_book(&deps, loan_cmd("Alice", "Clean Code"))
        .await
        .unwrap();
    let result = loan_book(&deps, loan_cmd("Alice", "Clean Code")).await;

    assert!(matches!(
        result,
        Err(LendingError::Conflict(ConflictKind::AlreadyLoaned))
    ));
    assert_eq!(store.loan_histories().await.len(), 1);
}

// ============================================================================
// 返却
// ============================================================================

#[tokio::test]
async fn test_return_without_active_loan_does_not_mutate() {
    let (store, deps) = in_memory_deps();
    seed_book(&deps, "Clean Code").await;
    seed_user(&deps, "Alice").await;

    let result = return_book(&deps, return_cmd("Alice", "Clean Code")).await;

    assert!(matches!(
        result,
        Err(LendingError::NotFound(MissingRecord::ActiveLoan))
    ));
    assert!(store.loan_histories().await.is_empty());
}

#[tokio::test]
async fn test_return_by_other_user_is_rejected() {
    let (store, deps) = in_memory_deps();
    seed_book(&deps, "Clean Code").await;
    seed_user(&deps, "Alice").await;
    seed_user(&deps, "Bob").await;
    let loan = loan_book(&deps, loan_cmd("Alice", "Clean Code"))
        .await
        .unwrap();

    let result = return_book(&deps, return_cmd("Bob", "Clean Code")).await;

    assert!(matches!(
        result,
        Err(LendingError::NotFound(MissingRecord::ActiveLoan))
    ));
    assert_eq!(store.loan_histories().await, vec![loan]);
}

#[tokio::test]
async fn test_return_twice_fails_second_time() {
    let (_store, deps) = in_memory_deps();
    seed_book(&deps, "Clean Code").await;
    seed_user(&deps, "Alice").await;
    loan_book(&deps, loan_cmd("Alice", "Clean Code"))
        .await
        .unwrap();

    return_book(&deps, return_cmd("Alice", "Clean Code"))
        .await
        .unwrap();
    let result = return_book(&deps, return_cmd("Alice", "Clean Code")).await;

    assert!(matches!(
        result,
        Err(LendingError::NotFound(MissingRecord::ActiveLoan))
    ));
}

#[tokio::test]
async fn test_return_by_unknown_user_has_no_active_loan() {
    let (store, deps) = in_memory_deps();
    seed_book(&deps, "Clean Code").await;

    let result = return_book(&deps, return_cmd("Nobody", "Clean Code")).await;

    assert!(matches!(
        result,
        Err(LendingError::NotFound(MissingRecord::ActiveLoan))
    ));
    assert!(store.loan_histories().await.is_empty());
}

#[tokio::test]
async fn test_book_becomes_loanable_again_after_return() {
    let (_store, deps) = in_memory_deps();
    seed_book(&deps, "Refactoring").await;
    seed_user(&deps, "Alice").await;
    seed_user(&deps, "Bob").await;

    loan_book(&deps, loan_cmd("Alice", "Refactoring"))
        .await
        .unwrap();
    return_book(&deps, return_cmd("Alice", "Refactoring"))
        .await
        .unwrap();
    loan_book(&deps, loan_cmd("Bob", "Refactoring"))
        .await
        .unwrap();
    return_book(&deps, return_cmd("Bob", "Refactoring"))
        .await
        .unwrap();
    loan_book(&deps, loan_cmd("Alice", "Refactoring"))
        .await
        .unwrap();

    let status = book_loan_status(&deps, &book_name("Refactoring"))
        .await
        .unwrap();
    assert_eq!(status.history.len(), 3);
    assert_eq!(status.history.iter().filter(|l| l.is_active()).count(), 1);
}

// ============================================================================
// 貸出状況
// ============================================================================

#[tokio::test]
async fn test_book_loan_status_reflects_availability() {
    let (_store, deps) = in_memory_deps();
    seed_book(&deps, "Clean Code").await;
    let alice = seed_user(&deps, "Alice").await;

    let status = book_loan_status(&deps, &book_name("Clean Code"))
        .await
        .unwrap();
    assert_eq!(status.availability, BookAvailability::Available);
    assert!(status.history.is_empty());

    loan_book(&deps, loan_cmd("Alice", "Clean Code"))
        .await
        .unwrap();

    let status = book_loan_status(&deps, &book_name("Clean Code"))
        .await
        .unwrap();
    assert_eq!(
        status.availability,
        BookAvailability::Loaned {
            user_id: alice.user_id
        }
    );
    assert_eq!(status.history.len(), 1);
}

#[tokio::test]
async fn test_book_loan_status_for_unknown_book() {
    let (_store, deps) = in_memory_deps();

    let result = book_loan_status(&deps, &book_name("Missing Book")).await;

    assert!(matches!(
        result,
        Err(LendingError::NotFound(MissingRecord::Book))
    ));
}

// ============================================================================
// 並行性
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loans_exactly_one_succeeds() {
    const CALLERS: usize = 16;

    let (store, deps) = in_memory_deps();
    seed_book(&deps, "Clean Code").await;
    for i in 0..CALLERS {
        seed_user(&deps, &format!("user-{}", i)).await;
    }

    let handles: Vec<_> = (0..CALLERS)
        .map(|i| {
            let deps = deps.clone();
            tokio::spawn(async move {
                loan_book(&deps, loan_cmd(&format!("user-{}", i), "Clean Code")).await
            })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(LendingError::Conflict(ConflictKind::AlreadyLoaned))))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(conflicts, CALLERS - 1);

    let histories = store.loan_histories().await;
    assert_eq!(histories.len(), 1);
    assert!(histories[0].is_active());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mixed_operations_keep_invariant() {
    let (store, deps) = in_memory_deps();
    let books = ["Clean Code", "Refactoring", "SICP"];
    let users = ["Alice", "Bob", "Carol", "Dave"];
    for book in books {
        seed_book(&deps, book).await;
    }
    for user in users {
        seed_user(&deps, user).await;
    }

    let mut handles = Vec::new();
    for round in 0..6 {
        for (i, user) in users.iter().enumerate() {
            let deps = deps.clone();
            let book = books[(i + round) % books.len()];
            let user = *user;
            handles.push(tokio::spawn(async move {
                let _ = loan_book(&deps, loan_cmd(user, book)).await;
                let _ = return_book(&deps, return_cmd(user, book)).await;
                let _ = loan_book(&deps, loan_cmd(user, book)).await;
            }));
        }
    }
    for handle in futures::future::join_all(handles).await {
        handle.expect("task panicked");
    }

    let histories = store.loan_histories().await;
    for (_, count) in active_counts(&histories) {
        assert!(count <= 1, "more than one active loan for a book");
    }

    // exists_active_loan と未返却件数が一致すること
    let counts = active_counts(&histories);
    let mut tx = store.begin().await.unwrap();
    for book in books {
        let name = book_name(book);
        let exists = tx.exists_active_loan(&name).await.unwrap();
        assert_eq!(exists, counts.get(&name).copied().unwrap_or(0) == 1);
    }
}

// ============================================================================
// ストア障害と一意制約
// ============================================================================

/// begin が常に失敗するストア
struct UnavailableStore;

#[async_trait]
impl LendingStore for UnavailableStore {
    async fn begin(&self) -> lending_store::Result<Box<dyn LendingTransaction>> {
        Err(StoreError::Backend("connection refused".into()))
    }
}

#[tokio::test]
async fn test_storage_failure_is_reported_as_unavailable() {
    let deps = ServiceDependencies {
        lending_store: Arc::new(UnavailableStore),
    };

    let result = loan_book(&deps, loan_cmd("Alice", "Clean Code")).await;

    assert!(matches!(result, Err(LendingError::StorageUnavailable(_))));
}

/// チェックをすり抜けた並行貸出を再現するストア
///
/// exists_active_loan は常に false を返し、挿入時に一意制約違反になる。
struct RacingStore {
    book: Book,
    user: User,
}

struct RacingTransaction {
    book: Book,
    user: User,
}

#[async_trait]
impl LendingStore for RacingStore {
    async fn begin(&self) -> lending_store::Result<Box<dyn LendingTransaction>> {
        Ok(Box::new(RacingTransaction {
            book: self.book.clone(),
            user: self.user.clone(),
        }))
    }
}

#[async_trait]
impl LendingTransaction for RacingTransaction {
    async fn save_book(&mut self, book: Book) -> lending_store::Result<Book> {
        Ok(book)
    }

    async fn save_user(&mut self, user: User) -> lending_store::Result<User> {
        Ok(user)
    }

    async fn find_book_by_name(&mut self, _name: &BookName) -> lending_store::Result<Option<Book>> {
        Ok(Some(self.book.clone()))
    }

    async fn find_user_by_name(&mut self, _name: &UserName) -> lending_store::Result<Option<User>> {
        Ok(Some(self.user.clone()))
    }

    async fn exists_active_loan(&mut self, _book_name: &BookName) -> lending_store::Result<bool> {
        Ok(false)
    }

    async fn save_loan_history(
        &mut self,
        _record: LoanHistory,
    ) -> lending_store::Result<LoanHistory> {
        Err(StoreError::UniqueViolation(
            "uq_loan_histories_active_book".to_string(),
        ))
    }

    async fn find_active_loan(
        &mut self,
        _user_id: UserId,
        _book_name: &BookName,
    ) -> lending_store::Result<Option<LoanHistory>> {
        Ok(None)
    }

    async fn update_loan_history(&mut self, _record: &LoanHistory) -> lending_store::Result<()> {
        Ok(())
    }

    async fn find_loan_histories_by_book_name(
        &mut self,
        _book_name: &BookName,
    ) -> lending_store::Result<Vec<LoanHistory>> {
        Ok(Vec::new())
    }

    async fn commit(self: Box<Self>) -> lending_store::Result<()> {
        panic!("commit must not be reached after a failed insert");
    }
}

#[tokio::test]
async fn test_unique_violation_at_insert_is_conflict() {
    let now = Utc::now();
    let deps = ServiceDependencies {
        lending_store: Arc::new(RacingStore {
            book: Book::register(book_name("Clean Code"), now),
            user: User::register(user_name("Alice"), now),
        }),
    };

    let result = loan_book(&deps, loan_cmd("Alice", "Clean Code")).await;

    assert!(matches!(
        result,
        Err(LendingError::Conflict(ConflictKind::AlreadyLoaned))
    ));
}
