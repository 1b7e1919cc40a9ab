//! `SQLite` plumbing: connection pool and schema migrations.

pub mod connection;
pub mod migrations;
