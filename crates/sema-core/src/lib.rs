pub mod config;
pub mod error;
pub mod types;

pub use config::SemaConfig;
pub use error::{Result, SemaError};
pub use types::*;
