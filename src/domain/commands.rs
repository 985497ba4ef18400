use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookName, UserName};

/// コマンド：書籍をカタログに登録する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBook {
    pub name: BookName,
    pub registered_at: DateTime<Utc>,
}

/// コマンド：利用者を登録する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterUser {
    pub name: UserName,
    pub registered_at: DateTime<Utc>,
}

/// コマンド：書籍を貸し出す
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanBook {
    pub user_name: UserName,
    pub book_name: BookName,
    pub loaned_at: DateTime<Utc>,
}

/// コマンド：書籍を返却する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnBook {
    pub user_name: UserName,
    pub book_name: BookName,
    pub returned_at: DateTime<Utc>,
}
