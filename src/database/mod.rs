pub mod db;

pub use db::SqliteDeckStore;
