pub mod blocked;
pub mod config;
