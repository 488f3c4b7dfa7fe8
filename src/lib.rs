//! Paired acoustic feature datasets for voice conversion training.
pub mod audio;
pub mod config;
pub mod dataset;
pub mod error;
pub mod example;
pub mod feature;
pub mod pipeline;
pub mod process;
pub mod transform;
pub mod utils;
pub use error::{DatasetError, Result};
