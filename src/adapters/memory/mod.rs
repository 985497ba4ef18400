pub mod lending_store;

pub use lending_store::LendingStore as InMemoryLendingStore;
