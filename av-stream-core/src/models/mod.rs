pub mod config;
pub mod error;
pub mod media;
pub mod report;
pub mod state;
