pub mod connection;
pub mod error;
pub mod mapping;
pub mod template;
pub mod user_repository;
