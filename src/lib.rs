//! sql-warden - policy-enforcing SQL access for automated clients.
//!
//! Statements are classified lexically, checked against a security mode and a
//! schema allow-list, and only then handed to the database.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod query;
pub mod safety;
