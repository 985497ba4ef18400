use crate::domain::{
    Book, BookId, BookName, LoanHistory, LoanHistoryId, User, UserId, UserName,
};
use crate::ports::lending_store::{
    LendingStore as LendingStoreTrait, LendingTransaction, Result, StoreError,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};

/// sqlxのエラーをストアのエラーに変換する
///
/// 一意制約違反（SQLSTATE 23505）だけを区別し、それ以外はすべて障害として扱う。
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation(db_err.message().to_string());
        }
    }
    StoreError::Backend(Box::new(err))
}

/// DBに保存された名前を値オブジェクトに戻す
fn invalid_data(column: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("invalid {}: {}", column, err),
    )))
}

fn map_row_to_book(row: &PgRow) -> Result<Book> {
    let name: String = row.get("name");
    Ok(Book {
        book_id: BookId::from_uuid(row.get("id")),
        name: BookName::parse(name).map_err(|e| invalid_data("books.name", e))?,
        created_at: row.get("created_at"),
    })
}

fn map_row_to_user(row: &PgRow) -> Result<User> {
    let name: String = row.get("name");
    Ok(User {
        user_id: UserId::from_uuid(row.get("id")),
        name: UserName::parse(name).map_err(|e| invalid_data("users.name", e))?,
        created_at: row.get("created_at"),
    })
}

fn map_row_to_loan_history(row: &PgRow) -> Result<LoanHistory> {
    let book_name: String = row.get("book_name");
    Ok(LoanHistory {
        loan_history_id: LoanHistoryId::from_uuid(row.get("id")),
        user_id: UserId::from_uuid(row.get("user_id")),
        book_name: BookName::parse(book_name)
            .map_err(|e| invalid_data("loan_histories.book_name", e))?,
        returned: row.get("is_return"),
        loaned_at: row.get("loaned_at"),
        returned_at: row.get("returned_at"),
    })
}

/// LendingStoreのPostgreSQL実装
///
/// トランザクションはREAD COMMITTED（PostgreSQLの既定）。
/// 同じ書籍への並行貸出は書籍行のロック（FOR UPDATE）で直列化し、
/// loan_historiesの部分一意インデックスを最後の防波堤とする。
pub struct LendingStore {
    pool: PgPool,
}

impl LendingStore {
    /// PostgreSQLコネクションプールから新しいLendingStoreを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LendingStoreTrait for LendingStore {
    async fn begin(&self) -> Result<Box<dyn LendingTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(Transaction { tx }))
    }
}

/// 未コミットのままドロップされるとsqlxがロールバックする
struct Transaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl LendingTransaction for Transaction {
    async fn save_book(&mut self, book: Book) -> Result<Book> {
        sqlx::query(
            r#"
            INSERT INTO books (id, name, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(book.book_id.value())
        .bind(book.name.as_str())
        .bind(book.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(book)
    }

    async fn save_user(&mut self, user: User) -> Result<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user.user_id.value())
        .bind(user.name.as_str())
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(user)
    }

    /// 書籍行をロックして取得する
    ///
    /// 同じ書籍を貸し出そうとする他のトランザクションは、
    /// このトランザクションが終わるまでここで待たされる。
    async fn find_book_by_name(&mut self, name: &BookName) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, created_at
            FROM books
            WHERE name = $1
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(name.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn read_book_by_name(&mut self, name: &BookName) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, created_at
            FROM books
            WHERE name = $1
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(name.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn find_user_by_name(&mut self, name: &UserName) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, created_at
            FROM users
            WHERE name = $1
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(name.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(map_row_to_user).transpose()
    }

    async fn exists_active_loan(&mut self, book_name: &BookName) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM loan_histories
                WHERE book_name = $1 AND is_return = FALSE
            )
            "#,
        )
        .bind(book_name.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)
    }

    async fn save_loan_history(&mut self, record: LoanHistory) -> Result<LoanHistory> {
        sqlx::query(
            r#"
            INSERT INTO loan_histories (
                id,
                user_id,
                book_name,
                is_return,
                loaned_at,
                returned_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.loan_history_id.value())
        .bind(record.user_id.value())
        .bind(record.book_name.as_str())
        .bind(record.returned)
        .bind(record.loaned_at)
        .bind(record.returned_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(record)
    }

    /// 未返却の貸出行をロックして取得する（並行返却の直列化）
    async fn find_active_loan(
        &mut self,
        user_id: UserId,
        book_name: &BookName,
    ) -> Result<Option<LoanHistory>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, book_name, is_return, loaned_at, returned_at
            FROM loan_histories
            WHERE user_id = $1 AND book_name = $2 AND is_return = FALSE
            FOR UPDATE
            "#,
        )
        .bind(user_id.value())
        .bind(book_name.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(map_row_to_loan_history).transpose()
    }

    async fn update_loan_history(&mut self, record: &LoanHistory) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE loan_histories
            SET is_return = $2,
                returned_at = $3
            WHERE id = $1
            "#,
        )
        .bind(record.loan_history_id.value())
        .bind(record.returned)
        .bind(record.returned_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(
                format!(
                    "loan history {} does not exist",
                    record.loan_history_id.value()
                )
                .into(),
            ));
        }

        Ok(())
    }

    async fn find_loan_histories_by_book_name(
        &mut self,
        book_name: &BookName,
    ) -> Result<Vec<LoanHistory>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, book_name, is_return, loaned_at, returned_at
            FROM loan_histories
            WHERE book_name = $1
            ORDER BY loaned_at ASC, id ASC
            "#,
        )
        .bind(book_name.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(map_row_to_loan_history).collect()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }
}
