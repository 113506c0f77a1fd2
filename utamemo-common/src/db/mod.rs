//! Database initialization shared by utamemo services

pub mod init;

pub use init::{connect_in_memory, create_schema, init_database};
