//! Database connection management and migrations.

pub mod connection;
pub mod migrations;

pub use connection::DatabaseConnection;
