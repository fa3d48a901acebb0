//! Scoped tracking runs with guaranteed termination.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use super::client::{TrackingClient, TrackingError};

/// Final status reported when a run is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Finished,
    Failed,
}

impl RunStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
        }
    }
}

/// Active run on the tracking server.
///
/// Closes exactly once: through [`TrackingRun::finish`], or from `Drop` as
/// `FAILED` when the pipeline unwinds before finishing. Every logging call
/// is counted so callers can verify that records were actually attached.
pub struct TrackingRun<'a> {
    client: &'a TrackingClient,
    run_id: String,
    records: usize,
    closed: bool,
}

impl<'a> TrackingRun<'a> {
    /// Open a run under the given experiment.
    pub fn start(
        client: &'a TrackingClient,
        experiment_id: &str,
        run_name: &str,
    ) -> Result<Self, TrackingError> {
        let run_id = client.create_run(experiment_id, run_name, now_millis())?;
        Ok(Self {
            client,
            run_id,
            records: 0,
            closed: false,
        })
    }

    /// Server-assigned run identifier.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Records attached so far.
    pub fn records(&self) -> usize {
        self.records
    }

    pub fn log_param(&mut self, key: &str, value: &str) -> Result<(), TrackingError> {
        self.client.log_param(&self.run_id, key, value)?;
        self.records += 1;
        Ok(())
    }

    pub fn log_metric(&mut self, key: &str, value: f64) -> Result<(), TrackingError> {
        self.client
            .log_metric(&self.run_id, key, value, now_millis())?;
        self.records += 1;
        Ok(())
    }

    pub fn set_tag(&mut self, key: &str, value: &str) -> Result<(), TrackingError> {
        self.client.set_tag(&self.run_id, key, value)?;
        self.records += 1;
        Ok(())
    }

    /// Close the run and return how many records were attached.
    pub fn finish(mut self, status: RunStatus) -> Result<usize, TrackingError> {
        self.closed = true;
        self.client
            .update_run(&self.run_id, status.as_str(), now_millis())?;
        Ok(self.records)
    }
}

impl Drop for TrackingRun<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) =
            self.client
                .update_run(&self.run_id, RunStatus::Failed.as_str(), now_millis())
        {
            warn!("Failed to close tracking run {}: {err}", self.run_id);
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
