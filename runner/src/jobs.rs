pub mod grouping;


use crate::database::{ConnectionError, JobDatabase};
use itertools::Itertools;
use std::{collections::BTreeSet, path::Path};
use thiserror::Error;
use tracing::debug;

/// identifier of a job model inside the job database
pub type JobId = u64;

/// widest range a job specification may expand to
pub const MAX_RANGE_WIDTH: JobId = 1_000_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("Job specification '{0}' contains no job ids")]
    InvalidSpec(String),
    #[error("Range {0}-{1} spans more than {MAX_RANGE_WIDTH} jobs")]
    RangeTooWide(JobId, JobId),
    #[error("Pack size must be a positive number, got {0}")]
    InvalidPackSize(f64),
    #[error("Argument string does not define '{0}='")]
    MissingParameter(String),
}

/// The result of parsing a job specification string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSelection {
    /// the `all` sentinel, resolved against the job database
    All,
    /// explicit ids, ascending and without duplicates
    Ids(BTreeSet<JobId>),
}

impl JobSelection {
    /// turn the selection into an ascending list of job ids
    pub fn resolve(self, database: &Path) -> Result<Vec<JobId>, ConnectionError> {
        match self {
            Self::All => JobDatabase::open(database)?.job_ids(),
            Self::Ids(ids) => Ok(ids.into_iter().collect()),
        }
    }
}

/// positions of every maximal digit run in `bytes`
fn digit_runs(bytes: &[u8]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index].is_ascii_digit() {
            let start = index;

            while index < bytes.len() && bytes[index].is_ascii_digit() {
                index += 1;
            }
            runs.push((start, index));
        } else {
            index += 1;
        }
    }

    runs
}

fn number(spec: &str, (start, end): (usize, usize)) -> Result<JobId, JobError> {
    spec[start..end]
        .parse()
        .map_err(|_| JobError::InvalidSpec(spec.to_string()))
}

/// Parse a job specification such as `3,7-9,12` or `all`
///
/// Singles are integers with no hyphen on either side, ranges are `a-b` pairs in any
/// order. Both families are scanned over the whole input and merged.
pub fn parse(spec: &str) -> Result<JobSelection, JobError> {
    let trimmed = spec.trim();

    if trimmed.eq_ignore_ascii_case("all") {
        return Ok(JobSelection::All);
    }

    let bytes = trimmed.as_bytes();
    let runs = digit_runs(bytes);
    let mut ids = BTreeSet::new();
    let mut matched = false;

    for &(start, end) in runs.iter() {
        let hyphen_before = start > 0 && bytes[start - 1] == b'-';
        let hyphen_after = end < bytes.len() && bytes[end] == b'-';

        if !hyphen_before && !hyphen_after {
            ids.insert(number(trimmed, (start, end))?);
            matched = true;
        }
    }

    // a range consumes both of its digit runs, scanning resumes behind the upper bound
    let mut index = 0;
    while index < runs.len() {
        let (_, end) = runs[index];

        match runs.get(index + 1) {
            Some(&(next_start, _)) if next_start == end + 1 && bytes[end] == b'-' => {
                let first = number(trimmed, runs[index])?;
                let second = number(trimmed, runs[index + 1])?;
                let (low, high) = (first.min(second), first.max(second));

                if high - low >= MAX_RANGE_WIDTH {
                    return Err(JobError::RangeTooWide(low, high));
                }
                ids.extend(low..=high);
                matched = true;
                index += 2;
            }
            _ => index += 1,
        }
    }

    if !matched && !trimmed.is_empty() {
        return Err(JobError::InvalidSpec(spec.to_string()));
    }

    debug!(spec = spec, count = ids.len(), "Parsed job specification");

    Ok(JobSelection::Ids(ids))
}

/// Compress an ascending list of ids into the shortest range string, e.g. `1,3-5,9`
pub fn compress(ids: &[JobId]) -> String {
    let mut runs: Vec<(JobId, JobId)> = Vec::new();

    for &id in ids {
        match runs.last_mut() {
            Some((_, last)) if id == *last || Some(id) == last.checked_add(1) => *last = id,
            _ => runs.push((id, id)),
        }
    }

    runs.into_iter()
        .map(|(first, last)| {
            if first == last {
                first.to_string()
            } else {
                format!("{first}-{last}")
            }
        })
        .join(",")
}

/// Find the value of a `name=value` token inside a free form argument string
///
/// Whitespace around the `=` and double quotes around the value are accepted.
pub fn find_parameter_value<'a>(name: &str, arguments: &'a str) -> Option<&'a str> {
    let mut offset = 0;

    while let Some(position) = arguments[offset..].find(name) {
        let start = offset + position;
        offset = start + name.len();

        // the key has to be a whole word, `xdb=` must not match `db`
        let at_boundary = arguments[..start]
            .chars()
            .next_back()
            .map_or(true, |c| c.is_whitespace() || c == '"');
        let rest = arguments[offset..].trim_start();

        if !at_boundary || !rest.starts_with('=') {
            continue;
        }

        let value = rest[1..].trim_start();
        let value = value.strip_prefix('"').unwrap_or(value);
        let end = value
            .find(|c: char| c == '"' || c.is_whitespace())
            .unwrap_or(value.len());

        if end > 0 {
            return Some(&value[..end]);
        }
    }

    None
}

/// Like `find_parameter_value` but a missing key is an error
pub fn require_parameter<'a>(name: &str, arguments: &'a str) -> Result<&'a str, JobError> {
    find_parameter_value(name, arguments).ok_or_else(|| JobError::MissingParameter(name.to_string()))
}
