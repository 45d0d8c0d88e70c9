use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One concrete date range of a frequency (e.g. "Q1 2024").
///
/// Bounds are calendar dates; time of day never takes part in comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub period_id: u32,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub frequency_id: u32,
}

/// A period being created or edited, not yet assigned an ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodDraft {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl PeriodDraft {
    pub fn new(name: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        PeriodDraft {
            name: name.into(),
            start_date,
            end_date,
        }
    }

    pub fn into_period(self, period_id: u32, frequency_id: u32) -> Period {
        Period {
            period_id,
            name: self.name,
            start_date: self.start_date,
            end_date: self.end_date,
            frequency_id,
        }
    }
}

impl From<&Period> for PeriodDraft {
    fn from(p: &Period) -> Self {
        PeriodDraft::new(p.name.clone(), p.start_date, p.end_date)
    }
}
