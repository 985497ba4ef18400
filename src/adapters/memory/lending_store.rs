use crate::domain::{Book, BookName, LoanHistory, User, UserId, UserName};
use crate::ports::lending_store::{
    LendingStore as LendingStoreTrait, LendingTransaction, Result, StoreError,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct Tables {
    books: Vec<Book>,
    users: Vec<User>,
    loan_histories: Vec<LoanHistory>,
}

/// In-memory implementation of LendingStore
///
/// A transaction holds the table lock for its whole lifetime, so
/// transactions are fully serialized. Writes go to a staged copy and are
/// published only on commit; dropping the transaction discards them.
pub struct LendingStore {
    tables: Arc<Mutex<Tables>>,
}

impl LendingStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
        }
    }

    /// Snapshot of every committed loan history, for tests and diagnostics
    pub async fn loan_histories(&self) -> Vec<LoanHistory> {
        self.tables.lock().await.loan_histories.clone()
    }
}

impl Default for LendingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LendingStoreTrait for LendingStore {
    async fn begin(&self) -> Result<Box<dyn LendingTransaction>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(Transaction { guard, staged }))
    }
}

struct Transaction {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

impl Transaction {
    fn has_other_active_loan(&self, record: &LoanHistory) -> bool {
        self.staged.loan_histories.iter().any(|loan| {
            loan.loan_history_id != record.loan_history_id
                && loan.book_name == record.book_name
                && loan.is_active()
        })
    }
}

#[async_trait]
impl LendingTransaction for Transaction {
    async fn save_book(&mut self, book: Book) -> Result<Book> {
        self.staged.books.push(book.clone());
        Ok(book)
    }

    async fn save_user(&mut self, user: User) -> Result<User> {
        self.staged.users.push(user.clone());
        Ok(user)
    }

    async fn find_book_by_name(&mut self, name: &BookName) -> Result<Option<Book>> {
        Ok(self
            .staged
            .books
            .iter()
            .filter(|book| &book.name == name)
            .min_by_key(|book| book.created_at)
            .cloned())
    }

    async fn find_user_by_name(&mut self, name: &UserName) -> Result<Option<User>> {
        Ok(self
            .staged
            .users
            .iter()
            .filter(|user| &user.name == name)
            .min_by_key(|user| user.created_at)
            .cloned())
    }

    async fn exists_active_loan(&mut self, book_name: &BookName) -> Result<bool> {
        Ok(self
            .staged
            .loan_histories
            .iter()
            .any(|loan| &loan.book_name == book_name && loan.is_active()))
    }

    async fn save_loan_history(&mut self, record: LoanHistory) -> Result<LoanHistory> {
        if record.is_active() && self.has_other_active_loan(&record) {
            return Err(StoreError::UniqueViolation(format!(
                "active loan already exists for book '{}'",
                record.book_name
            )));
        }
        self.staged.loan_histories.push(record.clone());
        Ok(record)
    }

    async fn find_active_loan(
        &mut self,
        user_id: UserId,
        book_name: &BookName,
    ) -> Result<Option<LoanHistory>> {
        Ok(self
            .staged
            .loan_histories
            .iter()
            .find(|loan| {
                loan.user_id == user_id && &loan.book_name == book_name && loan.is_active()
            })
            .cloned())
    }

    async fn update_loan_history(&mut self, record: &LoanHistory) -> Result<()> {
        if record.is_active() && self.has_other_active_loan(record) {
            return Err(StoreError::UniqueViolation(format!(
                "active loan already exists for book '{}'",
                record.book_name
            )));
        }

        let slot = self
            .staged
            .loan_histories
            .iter_mut()
            .find(|loan| loan.loan_history_id == record.loan_history_id)
            .ok_or_else(|| {
                StoreError::Backend(
                    format!(
                        "loan history {} does not exist",
                        record.loan_history_id.value()
                    )
                    .into(),
                )
            })?;
        *slot = record.clone();
        Ok(())
    }

    async fn find_loan_histories_by_book_name(
        &mut self,
        book_name: &BookName,
    ) -> Result<Vec<LoanHistory>> {
        let mut history: Vec<LoanHistory> = self
            .staged
            .loan_histories
            .iter()
            .filter(|loan| &loan.book_name == book_name)
            .cloned()
            .collect();
        history.sort_by_key(|loan| (loan.loaned_at, loan.loan_history_id.value()));
        Ok(history)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Transaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
