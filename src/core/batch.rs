use crate::domain::model::{Batch, FileInput, InferenceParams, Outcome, ResultRecord};
use crate::domain::ports::VisionModel;
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// One file finished; `partial` holds every record so far. Both share
    /// the records of the running batch.
    FileCompleted {
        index: usize,
        total: usize,
        record: Arc<ResultRecord>,
        partial: Batch,
    },
    /// Emitted once after the last file.
    Finished { batch: Batch, elapsed_seconds: f64 },
}

impl ProgressEvent {
    pub fn progress_percent(&self) -> f64 {
        match self {
            ProgressEvent::FileCompleted { index, total, .. } => {
                100.0 * (*index + 1) as f64 / *total as f64
            }
            ProgressEvent::Finished { .. } => 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub batch: Batch,
    pub elapsed_seconds: f64,
}

enum RunState {
    Running {
        next: usize,
        batch: Batch,
        started: Option<Instant>,
    },
    Done,
}

/// Sends each file of a batch to the model, strictly one at a time.
#[derive(Clone)]
pub struct BatchProcessor {
    model: Arc<dyn VisionModel>,
}

impl BatchProcessor {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }

    /// Lazy event stream for one run: one `FileCompleted` per file followed
    /// by `Finished`. Nothing happens until the stream is polled, and an
    /// empty file list yields no events at all.
    pub fn run<'a>(
        &'a self,
        files: &'a [FileInput],
        prompt: &'a str,
        params: &'a InferenceParams,
    ) -> impl Stream<Item = ProgressEvent> + Send + 'a {
        let total = files.len();
        let initial = if files.is_empty() {
            RunState::Done
        } else {
            RunState::Running {
                next: 0,
                batch: Batch::new(),
                started: None,
            }
        };

        stream::unfold(initial, move |state| async move {
            let RunState::Running {
                next,
                mut batch,
                started,
            } = state
            else {
                return None;
            };
            let started = started.unwrap_or_else(Instant::now);

            if next < total {
                let record = batch.push(self.process_file(&files[next], prompt, params).await);
                let event = ProgressEvent::FileCompleted {
                    index: next,
                    total,
                    record,
                    partial: batch.clone(),
                };
                Some((
                    event,
                    RunState::Running {
                        next: next + 1,
                        batch,
                        started: Some(started),
                    },
                ))
            } else {
                let elapsed_seconds = started.elapsed().as_secs_f64();
                tracing::info!(
                    files = total,
                    elapsed_seconds,
                    "Batch finished in {:.2}s",
                    elapsed_seconds
                );
                Some((
                    ProgressEvent::Finished {
                        batch,
                        elapsed_seconds,
                    },
                    RunState::Done,
                ))
            }
        })
    }

    /// Drains `run`, reporting each event to `on_progress`. Returns `None`
    /// for an empty file list.
    pub async fn collect<F>(
        &self,
        files: &[FileInput],
        prompt: &str,
        params: &InferenceParams,
        mut on_progress: F,
    ) -> Option<BatchReport>
    where
        F: FnMut(&ProgressEvent),
    {
        let events = self.run(files, prompt, params);
        futures::pin_mut!(events);

        let mut report = None;
        while let Some(event) = events.next().await {
            on_progress(&event);
            if let ProgressEvent::Finished {
                batch,
                elapsed_seconds,
            } = event
            {
                report = Some(BatchReport {
                    batch,
                    elapsed_seconds,
                });
            }
        }
        report
    }

    async fn process_file(
        &self,
        file: &FileInput,
        prompt: &str,
        params: &InferenceParams,
    ) -> ResultRecord {
        let started = Instant::now();
        let result = self.model.invoke(Some(file), prompt, params).await;
        let outcome = match result {
            Ok(payload) => Outcome::Success(payload),
            Err(e) => {
                tracing::warn!(file = %file.filename, "Inference failed: {}", e);
                Outcome::Failure(e.to_string())
            }
        };
        let latency_seconds = started.elapsed().as_secs_f64();

        tracing::debug!(
            file = %file.filename,
            model = %params.model,
            success = outcome.is_success(),
            "Processed in {:.2}s",
            latency_seconds
        );

        ResultRecord::new(&file.filename, &params.model, outcome, latency_seconds)
    }
}
