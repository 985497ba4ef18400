pub mod lending_store;

// パブリックに型を再エクスポート
pub use lending_store::LendingStore as PostgresLendingStore;
