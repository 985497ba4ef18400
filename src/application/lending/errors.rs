use crate::domain::NameError;
use crate::ports::StoreError;
use thiserror::Error;

/// 見つからなかった対象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingRecord {
    /// 書籍名に一致する書籍が無い
    Book,
    /// 利用者名に一致する利用者が無い
    User,
    /// 返却対象の未返却貸出が無い
    ActiveLoan,
}

impl std::fmt::Display for MissingRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MissingRecord::Book => "book",
            MissingRecord::User => "user",
            MissingRecord::ActiveLoan => "active loan",
        };
        f.write_str(label)
    }
}

/// 現在の状態と衝突する要求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// 書籍は既に貸出中
    AlreadyLoaned,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::AlreadyLoaned => f.write_str("book is already on loan"),
        }
    }
}

/// 貸出管理アプリケーション層のエラー
///
/// ローカルで回復はしない。トランザクションを破棄して呼び出し側へ返す。
#[derive(Debug, Error)]
pub enum LendingError {
    /// 参照先が存在しない
    #[error("{0} not found")]
    NotFound(MissingRecord),

    /// 不変条件に反する要求
    #[error("conflict: {0}")]
    Conflict(ConflictKind),

    /// 入力された名前が不正
    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    /// ストアの障害（自動リトライはしない）
    #[error("storage unavailable")]
    StorageUnavailable(#[source] StoreError),
}

impl From<StoreError> for LendingError {
    fn from(err: StoreError) -> Self {
        LendingError::StorageUnavailable(err)
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, LendingError>;
