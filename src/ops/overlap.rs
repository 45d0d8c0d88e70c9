use chrono::NaiveDate;
use serde::Serialize;

use crate::model::period::{Period, PeriodDraft};

/// Anything with a calendar start and end date
pub trait DateRange {
    fn start(&self) -> NaiveDate;
    fn end(&self) -> NaiveDate;
}

impl DateRange for Period {
    fn start(&self) -> NaiveDate {
        self.start_date
    }
    fn end(&self) -> NaiveDate {
        self.end_date
    }
}

impl DateRange for PeriodDraft {
    fn start(&self) -> NaiveDate {
        self.start_date
    }
    fn end(&self) -> NaiveDate {
        self.end_date
    }
}

impl<T: DateRange> DateRange for &T {
    fn start(&self) -> NaiveDate {
        (*self).start()
    }
    fn end(&self) -> NaiveDate {
        (*self).end()
    }
}

/// Error type for a single period's own bounds
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodError {
    #[error("end date {end} must be after start date {start}")]
    EndNotAfterStart { start: NaiveDate, end: NaiveDate },
    #[error("start and end are the same day ({0})")]
    SameDay(NaiveDate),
    #[error("{first} overlaps {second}")]
    Overlaps { first: String, second: String },
}

/// Per-period check that runs before the overlap scan. Same-day ranges are
/// rejected as well as inverted ones.
pub fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<(), PeriodError> {
    if end == start {
        return Err(PeriodError::SameDay(start));
    }
    if end < start {
        return Err(PeriodError::EndNotAfterStart { start, end });
    }
    Ok(())
}

/// The first conflicting pair found, as indices into the caller's slice.
/// `first` starts no later than `second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Overlap {
    pub first: usize,
    pub second: usize,
}

/// Find the first pair of overlapping ranges in start-date order.
///
/// Ranges are sorted by start date (stable, so ties keep input order) and
/// adjacent pairs are compared; a pair conflicts when the earlier one ends on
/// or after the day the later one starts. Only the first conflict is
/// reported.
pub fn find_overlap<T: DateRange>(ranges: &[T]) -> Option<Overlap> {
    if ranges.len() < 2 {
        return None;
    }
    let mut order: Vec<usize> = (0..ranges.len()).collect();
    order.sort_by_key(|&i| ranges[i].start());

    order.windows(2).find_map(|pair| {
        let (cur, next) = (pair[0], pair[1]);
        if ranges[cur].end() >= ranges[next].start() {
            Some(Overlap {
                first: cur,
                second: next,
            })
        } else {
            None
        }
    })
}

/// Check a candidate period against a frequency's existing periods, the way a
/// form submission does: bounds first, then overlap. `existing` should not
/// contain the period being edited.
pub fn check_candidate<T: DateRange>(
    existing: &[T],
    candidate: &PeriodDraft,
    label: impl Fn(&T) -> String,
) -> Result<(), PeriodError> {
    validate_range(candidate.start_date, candidate.end_date)?;

    let mut all: Vec<PeriodDraft> = existing
        .iter()
        .map(|r| PeriodDraft::new(label(r), r.start(), r.end()))
        .collect();
    all.push(candidate.clone());

    match find_overlap(&all) {
        Some(o) => Err(PeriodError::Overlaps {
            first: describe(&all[o.first]),
            second: describe(&all[o.second]),
        }),
        None => Ok(()),
    }
}

/// "Q1 (2024-01-01 to 2024-03-31)"
pub fn describe(draft: &PeriodDraft) -> String {
    format!(
        "{} ({} to {})",
        draft.name, draft.start_date, draft.end_date
    )
}
