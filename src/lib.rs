pub mod config;
pub mod deps;
pub mod error;

pub use error::{Result, SetupError};
