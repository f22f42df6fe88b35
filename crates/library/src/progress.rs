use std::sync::Arc;

use parking_lot::RwLock;

/// Value written when a run starts.
pub const PROGRESS_START: f64 = 0.0;
/// Value written once a run has committed.
pub const PROGRESS_DONE: f64 = 100.0;

const REPORT_AT: usize = 10;

/// Receives progress updates from import and refresh runs.
pub trait ProgressSink {
    fn set_progress(&self, value: f64);
}

/// Shared progress value that a front end can poll while a run is active.
#[derive(Clone, Debug, Default)]
pub struct ProgressCell {
    value: Arc<RwLock<f64>>,
}

impl ProgressCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> f64 {
        *self.value.read()
    }
}

impl ProgressSink for ProgressCell {
    fn set_progress(&self, value: f64) {
        *self.value.write() = value;
    }
}

/// Discards every update.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_progress(&self, _value: f64) {}
}

/// Mid-run update for item `index` of `total`, if one is due.
///
/// Updates are only due when `index % total == 10`, which in practice means
/// a single update at the eleventh item of runs longer than ten items.
pub(crate) fn mid_run_progress(index: usize, total: usize) -> Option<f64> {
    if total == 0 || index % total != REPORT_AT {
        return None;
    }
    Some(index as f64 / total as f64)
}
