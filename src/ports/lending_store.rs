use crate::domain::{Book, BookName, LoanHistory, User, UserId, UserName};
use async_trait::async_trait;
use thiserror::Error;

/// ストアのエラー
///
/// ドメインエラーには変換しない。解釈はアプリケーション層が行う。
#[derive(Debug, Error)]
pub enum StoreError {
    /// 一意制約違反（未返却貸出の重複など）
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// 接続断・タイムアウトなど、ストア自体の障害
    #[error("storage backend failure")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// 貸出ストアポート
///
/// 書籍・利用者・貸出履歴の永続化を抽象化する。
/// すべての読み書きは`begin`で開始したトランザクション内で行う。
#[async_trait]
pub trait LendingStore: Send + Sync {
    /// トランザクションを開始する
    async fn begin(&self) -> Result<Box<dyn LendingTransaction>>;
}

/// 貸出ストアのトランザクション
///
/// `commit`せずにドロップした場合はロールバックされる。
/// 途中で失敗した操作は何も書き込まない。
#[async_trait]
pub trait LendingTransaction: Send {
    /// 書籍を保存する
    async fn save_book(&mut self, book: Book) -> Result<Book>;

    /// 利用者を保存する
    async fn save_user(&mut self, user: User) -> Result<User>;

    /// 書籍名で書籍を取得する
    ///
    /// 同名の書籍が複数ある場合は最も古く登録されたものを返す。
    /// 実装は同じ書籍への並行貸出をここで直列化してよい（行ロック）。
    async fn find_book_by_name(&mut self, name: &BookName) -> Result<Option<Book>>;

    /// 参照専用に書籍名で書籍を取得する
    ///
    /// `find_book_by_name` と同じ書籍を返すが、行ロックは取らない。
    /// 貸出状況の照会のように、貸出と競合させたくない読み取りで使う。
    async fn read_book_by_name(&mut self, name: &BookName) -> Result<Option<Book>> {
        self.find_book_by_name(name).await
    }

    /// 利用者名で利用者を取得する
    async fn find_user_by_name(&mut self, name: &UserName) -> Result<Option<User>>;

    /// 書籍名に未返却の貸出履歴が存在するか
    async fn exists_active_loan(&mut self, book_name: &BookName) -> Result<bool>;

    /// 貸出履歴を新規保存する
    ///
    /// 同じ書籍名の未返却履歴が既にある場合は`StoreError::UniqueViolation`。
    async fn save_loan_history(&mut self, record: LoanHistory) -> Result<LoanHistory>;

    /// 利用者と書籍名に一致する未返却の貸出履歴を取得する
    async fn find_active_loan(
        &mut self,
        user_id: UserId,
        book_name: &BookName,
    ) -> Result<Option<LoanHistory>>;

    /// 既存の貸出履歴を更新する（返却時）
    async fn update_loan_history(&mut self, record: &LoanHistory) -> Result<()>;

    /// 書籍名の貸出履歴を古い順にすべて取得する
    async fn find_loan_histories_by_book_name(
        &mut self,
        book_name: &BookName,
    ) -> Result<Vec<LoanHistory>>;

    /// トランザクションを確定する
    async fn commit(self: Box<Self>) -> Result<()>;
}
