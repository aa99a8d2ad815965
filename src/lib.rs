pub mod api;
pub mod cache;
pub mod columns;
pub mod config;
pub mod db;
pub mod error;
pub mod ingestion;
pub mod logging;

pub use error::{Result, SpimexError};
