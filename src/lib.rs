pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::ServerConfig;

pub use adapters::{LocalStorage, OpenRouterClient, OpenRouterSettings, ProxyClient};
pub use core::{BatchProcessor, BatchReport, ProgressEvent};
pub use domain::model::{Batch, FileInput, InferenceParams, Outcome, ResultRecord};
pub use domain::ports::{Storage, VisionModel};
pub use utils::error::{InferenceError, Result, VisionEtlError};
