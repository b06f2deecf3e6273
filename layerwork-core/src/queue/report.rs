use std::sync::Arc;
use std::time::Duration;

use super::StrokeID;
use crate::commands::{Command, CommandError, Direction};

#[derive(Clone, PartialEq, Debug)]
pub enum JobState {
    Done,
    Failed(CommandError),
    /// Never ran, as the stroke was cancelled first.
    Dropped,
}

#[derive(Clone, Debug)]
pub struct JobOutcome {
    /// Position in submission order.
    pub index: usize,
    pub command: Arc<Command>,
    pub direction: Direction,
    pub state: JobState,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, strum::AsRefStr)]
pub enum StrokeStatus {
    /// Ended and ran to completion. Individual jobs may still have failed.
    Finished,
    /// Cancelled, and whatever had run was handed to the strategy to take back.
    Cancelled,
}

#[derive(Clone, Debug)]
pub struct StrokeReport {
    pub stroke: StrokeID,
    pub name: String,
    pub status: StrokeStatus,
    /// Every job of the stroke, in submission order.
    pub jobs: Vec<JobOutcome>,
}
impl StrokeReport {
    pub fn failures(&self) -> impl Iterator<Item = (&JobOutcome, &CommandError)> + '_ {
        self.jobs.iter().filter_map(|job| match &job.state {
            JobState::Failed(err) => Some((job, err)),
            _ => None,
        })
    }
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == StrokeStatus::Finished
            && self.jobs.iter().all(|job| job.state == JobState::Done)
    }
}

/// Resolves once, when the stroke is fully done. Cloned handles all see the same report.
#[derive(Clone, Default)]
pub struct StrokeCompletion {
    inner: Arc<(parking_lot::Mutex<Option<StrokeReport>>, parking_lot::Condvar)>,
}
impl StrokeCompletion {
    pub(crate) fn complete(&self, report: StrokeReport) {
        let (report_slot, condvar) = &*self.inner;
        *report_slot.lock() = Some(report);
        condvar.notify_all();
    }
    /// The report, if the stroke is done.
    #[must_use]
    pub fn try_get(&self) -> Option<StrokeReport> {
        self.inner.0.lock().clone()
    }
    /// Block until the stroke is done.
    #[must_use]
    pub fn wait(&self) -> StrokeReport {
        let (report_slot, condvar) = &*self.inner;
        let mut report = report_slot.lock();
        loop {
            if let Some(report) = &*report {
                return report.clone();
            }
            condvar.wait(&mut report);
        }
    }
    /// Block until the stroke is done, or None if that takes longer than `timeout`.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<StrokeReport> {
        let deadline = std::time::Instant::now() + timeout;
        let (report_slot, condvar) = &*self.inner;
        let mut report = report_slot.lock();
        loop {
            if let Some(report) = &*report {
                return Some(report.clone());
            }
            if condvar.wait_until(&mut report, deadline).timed_out() {
                return report.clone();
            }
        }
    }
}
impl std::fmt::Debug for StrokeCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrokeCompletion")
            .field("done", &self.inner.0.lock().is_some())
            .finish()
    }
}
