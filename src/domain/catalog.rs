use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, BookName, UserId, UserName};

/// 書籍 - カタログに登録された1冊
///
/// 書籍名はカタログ内で一意とは限らない。
/// 貸出処理は書籍名をキーに動作する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub name: BookName,
    pub created_at: DateTime<Utc>,
}

impl Book {
    pub fn register(name: BookName, registered_at: DateTime<Utc>) -> Self {
        Self {
            book_id: BookId::new(),
            name,
            created_at: registered_at,
        }
    }
}

/// 利用者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub name: UserName,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn register(name: UserName, registered_at: DateTime<Utc>) -> Self {
        Self {
            user_id: UserId::new(),
            name,
            created_at: registered_at,
        }
    }
}
