use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::batch::BatchPlan;
use crate::error::{Result, SubflowError};
use crate::progress::{checkpoint, ProgressTracker};
use crate::store::{Job, Store};
use crate::subtitle::parse_replicas;
use crate::translate::{translate_with_retry, Oracle, OracleRequest, RetryPolicy, TranslationOptions};

/// Separator appended after every translated batch
pub const BATCH_SEPARATOR: char = '\n';

/// Drives one document through parse, batch, translate and progress reporting
pub struct TranslationPipeline {
    oracle: Arc<dyn Oracle>,
    retry: RetryPolicy,
}

impl TranslationPipeline {
    pub fn new(oracle: Arc<dyn Oracle>, retry: RetryPolicy) -> Self {
        Self { oracle, retry }
    }

    /// Translate `text` batch by batch, one oracle call in flight at a time.
    ///
    /// Returns `Cancelled` as soon as `cancel` fires, dropping any partial output.
    pub async fn run<F>(
        &self,
        text: &str,
        options: &TranslationOptions,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<String>
    where
        F: FnMut(f64) + Send,
    {
        let parsed = parse_replicas(text);
        if let Some(recovery) = parsed.recovery {
            warn!(
                "Subtitle numbering is irregular (expected {:?} near byte {}); the remainder is translated as one replica",
                recovery.expected, recovery.offset
            );
        }

        let plan = BatchPlan::new(&parsed.replicas, options.batch_size)?;
        info!(
            "Translating {} replicas in {} batches to {} with {}",
            plan.total_replicas(),
            plan.batch_count(),
            options.language,
            options.model
        );

        let mut tracker = ProgressTracker::new(plan.batch_size(), plan.total_replicas(), Some(on_progress));
        tracker.start();

        let total_batches = plan.batch_count();
        let mut translated = String::new();

        for batch in plan.batches() {
            checkpoint(cancel)?;

            info!("┌─ Translating batch {}/{} ({} replicas)", batch.number, total_batches, batch.len());
            let request = OracleRequest::for_batch(options, batch.text());
            let outcome = translate_with_retry(self.oracle.as_ref(), &request, &self.retry, cancel).await?;
            if outcome.retries() > 0 {
                info!("│ Succeeded after {} retries", outcome.retries());
            }
            info!("└─ Batch {}/{} done", batch.number, total_batches);

            translated.push_str(&outcome.text);
            translated.push(BATCH_SEPARATOR);
            tracker.advance();
        }

        tracker.finish();
        Ok(translated)
    }

    /// Run a stored job in the background and record its outcome in the store.
    ///
    /// The pipeline runs on a task of its own so that a panic still ends the job as failed.
    pub fn spawn(self: &Arc<Self>, store: Store, job: Job, text: String) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        let job_id = job.id.clone();
        let progress_store = store.clone();

        tokio::spawn(async move {
            let run = tokio::spawn(async move {
                let cancel = job.cancellation_token();
                let progress_id = job.id.clone();
                pipeline
                    .run(&text, &job.options, &cancel, move |value| {
                        progress_store.update_progress(&progress_id, value);
                    })
                    .await
            });

            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    error!("Translation task for job {} panicked", job_id);
                    Err(SubflowError::Translation("translation task panicked".to_string()))
                }
                Err(_) => Err(SubflowError::Translation("translation task was aborted".to_string())),
            };

            match outcome {
                Ok(result) => {
                    store.complete_job(&job_id, result);
                }
                Err(SubflowError::Cancelled) => {
                    store.cancel_job(&job_id);
                }
                Err(e @ SubflowError::OracleUnavailable { .. }) => {
                    store.mark_oracle_unavailable(&job_id, e.to_string());
                }
                Err(e) => {
                    warn!("Job {} failed: {}", job_id, e);
                    store.fail_job(&job_id, e.to_string());
                }
            }
        })
    }
}
