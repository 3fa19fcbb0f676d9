//! Core types and utilities for compiling genotype neural networks.

pub mod types;
pub mod genotype;
pub mod config;
pub mod error;
pub mod sample;

pub use error::{Error, Result};
pub use types::*;
pub use genotype::*;
pub use config::*;
pub use sample::random_genotype;
