//! SQLite-backed store of Japanese entity names and their English
//! translations, fronted by an in-memory cache.

pub mod schema;
pub mod connection;
pub mod models;
pub mod repository;
pub mod service;

pub use service::DatabaseService;
