use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Book, BookName, LoanHistoryId, ReturnBookError, User, UserId};

/// 貸出履歴 - 1回の貸出
///
/// 貸出時に作成され、返却時に`returned`が false → true に変わる。
/// 削除はされない。
///
/// 不変条件（ストア全体）：
/// 同じ書籍名で`returned == false`の履歴は同時に1件まで。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanHistory {
    pub loan_history_id: LoanHistoryId,
    pub user_id: UserId,
    pub book_name: BookName,
    pub returned: bool,
    pub loaned_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl LoanHistory {
    /// 未返却（貸出中）か
    pub fn is_active(&self) -> bool {
        !self.returned
    }
}

/// 書籍の貸出可否（履歴から導出するビュー、保存はしない）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BookAvailability {
    Available,
    Loaned { user_id: UserId },
}

impl BookAvailability {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookAvailability::Available => "available",
            BookAvailability::Loaned { .. } => "loaned",
        }
    }
}

/// 純粋関数：書籍を貸し出す
///
/// 未返却の貸出が無いことの確認は呼び出し側（トランザクション内）の責務。
/// 副作用なし。新しい貸出履歴を返す。
pub fn loan_book(user: &User, book: &Book, loaned_at: DateTime<Utc>) -> LoanHistory {
    LoanHistory {
        loan_history_id: LoanHistoryId::new(),
        user_id: user.user_id,
        book_name: book.name.clone(),
        returned: false,
        loaned_at,
        returned_at: None,
    }
}

/// 純粋関数：書籍を返却する
///
/// 副作用なし。返却済みにした貸出履歴を返す。
pub fn return_book(
    loan: LoanHistory,
    returned_at: DateTime<Utc>,
) -> Result<LoanHistory, ReturnBookError> {
    if loan.returned {
        return Err(ReturnBookError::AlreadyReturned);
    }

    Ok(LoanHistory {
        returned: true,
        returned_at: Some(returned_at),
        ..loan
    })
}

/// 貸出履歴から書籍の現在の貸出状態を導出する
///
/// 未返却の履歴があれば Loaned、無ければ Available。
pub fn availability(history: &[LoanHistory]) -> BookAvailability {
    history
        .iter()
        .find(|loan| loan.is_active())
        .map_or(BookAvailability::Available, |loan| BookAvailability::Loaned {
            user_id: loan.user_id,
        })
}
