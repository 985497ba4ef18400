use thiserror::Error;

/// 名前（書籍名・利用者名）のバリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// 空文字または空白のみ
    #[error("name must not be empty")]
    Empty,
    /// 上限文字数を超えている
    #[error("name is {length} characters long (max {max})")]
    TooLong { length: usize, max: usize },
}

/// 返却のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReturnBookError {
    /// 既に返却済み
    #[error("loan has already been returned")]
    AlreadyReturned,
}
