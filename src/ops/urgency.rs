use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::Serialize;

use crate::model::config::KpiConfig;
use crate::model::period::Period;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// How close a period is to its end date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    Overdue,
    DueSoon,
    Normal,
}

impl Urgency {
    pub fn is_urgent(self) -> bool {
        matches!(self, Urgency::Overdue | Urgency::DueSoon)
    }

    pub fn label(self) -> &'static str {
        match self {
            Urgency::Overdue => "overdue",
            Urgency::DueSoon => "due-soon",
            Urgency::Normal => "normal",
        }
    }
}

/// Where midnight falls and how many days count as "due soon"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UrgencyPolicy {
    pub due_soon_days: i64,
    pub offset: FixedOffset,
}

impl Default for UrgencyPolicy {
    fn default() -> Self {
        let config = crate::model::config::DateConfig::default();
        UrgencyPolicy {
            due_soon_days: 7,
            offset: config.offset(),
        }
    }
}

impl UrgencyPolicy {
    pub fn from_config(config: &KpiConfig) -> Self {
        UrgencyPolicy {
            due_soon_days: config.urgency.due_soon_days,
            offset: config.dates.offset(),
        }
    }

    /// Midnight at the start of `date` in the policy's offset, as UTC
    pub fn midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_time(NaiveTime::MIN);
        (local - TimeDelta::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }

    /// Calendar date of `now` in the policy's offset
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }
}

/// Whole days until `end_date`, rounded up. Negative once the end has passed.
pub fn days_remaining(end_date: NaiveDate, now: DateTime<Utc>, policy: &UrgencyPolicy) -> i64 {
    let diff = (policy.midnight(end_date) - now).num_milliseconds();
    let q = diff.div_euclid(MILLIS_PER_DAY);
    if diff.rem_euclid(MILLIS_PER_DAY) != 0 {
        q + 1
    } else {
        q
    }
}

/// Classify a period relative to `now`. Zero days remaining is due soon.
pub fn classify_urgency(period: &Period, now: DateTime<Utc>, policy: &UrgencyPolicy) -> Urgency {
    let days = days_remaining(period.end_date, now, policy);
    if days < 0 {
        Urgency::Overdue
    } else if days <= policy.due_soon_days {
        Urgency::DueSoon
    } else {
        Urgency::Normal
    }
}
