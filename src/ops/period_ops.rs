use chrono::NaiveDate;
use tracing::debug;

use crate::model::dataset::Dataset;
use crate::model::indicator::Frequency;
use crate::model::period::{Period, PeriodDraft};
use crate::ops::overlap::{PeriodError, check_candidate};

/// Error type for period operations
#[derive(Debug, thiserror::Error)]
pub enum PeriodOpError {
    #[error("frequency not found: {0}")]
    UnknownFrequency(u32),
    #[error("period not found: {0}")]
    UnknownPeriod(u32),
    #[error("invalid period: {0}")]
    Invalid(#[from] PeriodError),
    #[error("cannot split a year into {0} periods (must divide 12)")]
    UnsupportedCount(u32),
    #[error("year out of range: {0}")]
    InvalidYear(i32),
}

fn frequency_known(dataset: &Dataset, frequency_id: u32) -> bool {
    dataset.find_frequency(frequency_id).is_some()
        || dataset.periods.iter().any(|p| p.frequency_id == frequency_id)
}

fn label(p: &&Period) -> String {
    p.name.clone()
}

/// Add a period to a frequency. Blocks on invalid bounds or an overlap with
/// one of the frequency's existing periods. Returns the new period's ID.
pub fn add_period(
    dataset: &mut Dataset,
    frequency_id: u32,
    draft: PeriodDraft,
) -> Result<u32, PeriodOpError> {
    if !frequency_known(dataset, frequency_id) {
        return Err(PeriodOpError::UnknownFrequency(frequency_id));
    }
    let existing = dataset.periods_for_frequency(frequency_id);
    check_candidate(&existing, &draft, label)?;

    let period_id = dataset.next_period_id();
    debug!(period_id, frequency_id, name = %draft.name, "adding period");
    dataset.periods.push(draft.into_period(period_id, frequency_id));
    Ok(period_id)
}

/// Replace a period's name and dates. The period is left out of the overlap
/// scan so it cannot conflict with its own old range.
pub fn update_period(
    dataset: &mut Dataset,
    period_id: u32,
    draft: PeriodDraft,
) -> Result<(), PeriodOpError> {
    let frequency_id = dataset
        .find_period(period_id)
        .map(|p| p.frequency_id)
        .ok_or(PeriodOpError::UnknownPeriod(period_id))?;

    let others: Vec<&Period> = dataset
        .periods_for_frequency(frequency_id)
        .into_iter()
        .filter(|p| p.period_id != period_id)
        .collect();
    check_candidate(&others, &draft, label)?;

    if let Some(p) = dataset.periods.iter_mut().find(|p| p.period_id == period_id) {
        debug!(period_id, name = %draft.name, "updating period");
        p.name = draft.name;
        p.start_date = draft.start_date;
        p.end_date = draft.end_date;
    }
    Ok(())
}

/// Name for the `index`-th (0-based) of `count` periods in `year`
fn period_name(count: u32, index: u32, start: NaiveDate, year: i32) -> String {
    match count {
        12 => start.format("%B %Y").to_string(),
        4 => format!("Q{} {}", index + 1, year),
        2 => format!("H{} {}", index + 1, year),
        1 => year.to_string(),
        _ => format!("{} ({}/{})", year, index + 1, count),
    }
}

/// Suggest calendar periods for one year of a frequency: the year is split
/// into `periods_in_year` equal runs of whole months, each ending the day
/// before the next begins.
pub fn generate_periods(frequency: &Frequency, year: i32) -> Result<Vec<PeriodDraft>, PeriodOpError> {
    let count = frequency.periods_in_year;
    if count == 0 || 12 % count != 0 {
        return Err(PeriodOpError::UnsupportedCount(count));
    }
    let months = 12 / count;

    let month_start = |m: u32| -> Result<NaiveDate, PeriodOpError> {
        // month index past December rolls into January of the next year
        let (y, m) = if m > 12 { (year + 1, m - 12) } else { (year, m) };
        NaiveDate::from_ymd_opt(y, m, 1).ok_or(PeriodOpError::InvalidYear(year))
    };

    let mut drafts = Vec::with_capacity(count as usize);
    for index in 0..count {
        let start = month_start(1 + index * months)?;
        let next = month_start(1 + (index + 1) * months)?;
        let end = next.pred_opt().ok_or(PeriodOpError::InvalidYear(year))?;
        drafts.push(PeriodDraft::new(
            period_name(count, index, start, year),
            start,
            end,
        ));
    }
    Ok(drafts)
}
