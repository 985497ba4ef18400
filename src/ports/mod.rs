pub mod lending_store;

pub use lending_store::*;
