pub mod config;
pub mod database;
pub mod item_repository;
pub mod status_repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use item_repository::ItemRepository;
pub use status_repository::StatusRepository;
