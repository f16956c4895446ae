pub mod aggregator;
pub mod types;
