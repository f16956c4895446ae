pub mod commands;
pub mod config;
pub mod dates;
pub mod db;
pub mod errors;
pub mod fetcher;
pub mod models;
pub mod observability;
pub mod schema;
pub mod store;
pub mod tasks;
#[cfg(test)]
pub mod test_helpers;

pub use db::DbPool;
