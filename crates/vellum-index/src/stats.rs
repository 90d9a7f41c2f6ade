use chrono::{DateTime, Utc};
use serde::Serialize;

/// Aggregate outcome of one indexing run. `errors` is the source of truth for
/// partial failures; a run that returns `Ok` may still have skipped work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingStats {
    pub total_files: usize,
    pub processed_files: usize,
    pub skipped_files: usize,
    pub removed_files: usize,
    pub total_chunks: usize,
    pub processed_chunks: usize,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
}

impl ProcessingStats {
    #[must_use]
    pub fn start() -> Self {
        Self {
            total_files: 0,
            processed_files: 0,
            skipped_files: 0,
            removed_files: 0,
            total_chunks: 0,
            processed_chunks: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            cancelled: false,
        }
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        tracing::warn!("{error}");
        self.errors.push(error);
    }

    /// Freeze the run, stamping `finished_at`.
    #[must_use]
    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }
}
