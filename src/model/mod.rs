pub mod catalogue;
pub mod config;
