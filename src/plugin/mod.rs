pub mod error;
pub mod installer;
pub mod manager;
pub mod manifest;
pub mod runtime;

pub use manager::PluginManager;
