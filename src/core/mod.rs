pub mod batch;
pub mod export;
pub mod normalize;
pub mod telemetry;

pub use crate::domain::model::{Batch, FileInput, InferenceParams, Outcome, ResultRecord};
pub use crate::domain::ports::{Storage, VisionModel};
pub use crate::utils::error::Result;
pub use batch::{BatchProcessor, BatchReport, ProgressEvent};
