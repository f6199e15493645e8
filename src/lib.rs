pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod providers;
pub mod sandbox;

pub use error::{Result, StellarError};
