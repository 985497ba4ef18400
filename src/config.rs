//! Process configuration read from environment variables.

use ::config::{Config, ConfigError, Environment};
use serde::Deserialize;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/library";
const DEFAULT_PORT: i64 = 3000;
const DEFAULT_MAX_CONNECTIONS: i64 = 5;

/// 永続化の実装
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// PostgreSQL（本番）
    Postgres,
    /// プロセス内メモリ（ローカル実行・デモ用）
    Memory,
}

/// アプリケーション設定
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    #[serde(rename = "database_max_connections")]
    pub max_connections: u32,
    #[serde(rename = "storage_backend")]
    pub storage: StorageBackend,
}

impl AppConfig {
    /// 環境変数から読み込む
    ///
    /// - `DATABASE_URL` (default `postgres://localhost/library`)
    /// - `PORT` (default `3000`)
    /// - `DATABASE_MAX_CONNECTIONS` (default `5`)
    /// - `STORAGE_BACKEND` = `postgres` | `memory` (default `postgres`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default())
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("database_url", DEFAULT_DATABASE_URL)?
            .set_default("port", DEFAULT_PORT)?
            .set_default("database_max_connections", DEFAULT_MAX_CONNECTIONS)?
            .set_default("storage_backend", "postgres")?
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
