pub mod config;
pub mod error;

pub use config::HeraldConfig;
pub use error::{HeraldError, Result};
