//! Configuration and table data models.

pub mod config;
pub mod table;
