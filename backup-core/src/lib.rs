pub mod artifact;
pub mod config;
pub mod constants;
pub mod dump;
pub mod error;
pub mod pipeline;
pub mod producer;
pub mod scheduler;
pub mod uploader;

pub use error::{BackupError, Result};
