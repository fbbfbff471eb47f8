use super::{JobError, JobId};
use tracing::trace;

/// A contiguous window of a job sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobGroup {
    pub index: usize,
    pub ids: Vec<JobId>,
}

impl JobGroup {
    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Effective integer pack size for a possibly fractional target
///
/// Fractional targets are rounded up so that a budget like 2.5 jobs per rank never
/// leaves jobs without a rank.
pub fn pack_size(target: f64) -> Result<usize, JobError> {
    if !target.is_finite() || target <= 0.0 {
        return Err(JobError::InvalidPackSize(target));
    }

    Ok(target.ceil() as usize)
}

/// Split `ids` into windows of `pack_size(target)` ids, the last window takes the rest
pub fn group(ids: &[JobId], target: f64) -> Result<Vec<JobGroup>, JobError> {
    let size = pack_size(target)?;

    trace!(target_size = target, pack_size = size, count = ids.len(), "Grouping jobs");

    Ok(ids
        .chunks(size)
        .enumerate()
        .map(|(index, window)| JobGroup {
            index,
            ids: window.to_vec(),
        })
        .collect())
}
