use serde::Serialize;

use crate::model::entry::EntrySheet;
use crate::model::indicator::Indicator;
use crate::model::period::Period;

/// Periods measured for this indicator: those of its frequency
pub fn relevant_periods<'a>(indicator: &Indicator, periods: &'a [Period]) -> Vec<&'a Period> {
    periods
        .iter()
        .filter(|p| p.frequency_id == indicator.frequency_id())
        .collect()
}

/// Sum of entered values for the indicator and its sub-indicators over the
/// given periods. Periods of another frequency are ignored.
pub fn total_for_periods<'a, I>(indicator: &Indicator, periods: I, entries: &EntrySheet) -> f64
where
    I: IntoIterator<Item = &'a Period>,
{
    periods
        .into_iter()
        .filter(|p| p.frequency_id == indicator.frequency_id())
        .map(|p| {
            indicator
                .member_ids()
                .map(|id| entries.numeric_value(id, p.period_id))
                .sum::<f64>()
        })
        .sum()
}

/// Sum of entered values over every relevant period
pub fn total(indicator: &Indicator, periods: &[Period], entries: &EntrySheet) -> f64 {
    total_for_periods(indicator, periods, entries)
}

/// A target of zero (or less) is met by definition
pub fn target_met(indicator: &Indicator, total: f64) -> bool {
    indicator.target_value <= 0.0 || total >= indicator.target_value
}

/// Every relevant period has a non-blank value for the indicator and for
/// each of its sub-indicators
pub fn all_filled(indicator: &Indicator, periods: &[Period], entries: &EntrySheet) -> bool {
    relevant_periods(indicator, periods).iter().all(|p| {
        indicator
            .member_ids()
            .all(|id| !entries.is_blank(id, p.period_id))
    })
}

pub fn is_completed(indicator: &Indicator, periods: &[Period], entries: &EntrySheet) -> bool {
    target_met(indicator, total(indicator, periods, entries)) && all_filled(indicator, periods, entries)
}

/// Progress summary for one indicator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub indicator_id: u32,
    pub total: f64,
    pub target: f64,
    pub completed: bool,
    /// Non-blank cells across the indicator, its sub-indicators, and relevant periods
    pub filled: usize,
    pub required: usize,
}

impl Progress {
    /// total / target, or None when there is no target
    pub fn ratio(&self) -> Option<f64> {
        if self.target > 0.0 {
            Some(self.total / self.target)
        } else {
            None
        }
    }
}

pub fn progress(indicator: &Indicator, periods: &[Period], entries: &EntrySheet) -> Progress {
    let relevant = relevant_periods(indicator, periods);
    let mut filled = 0;
    let mut required = 0;
    for p in &relevant {
        for id in indicator.member_ids() {
            required += 1;
            if !entries.is_blank(id, p.period_id) {
                filled += 1;
            }
        }
    }
    let total = total(indicator, periods, entries);
    Progress {
        indicator_id: indicator.id,
        total,
        target: indicator.target_value,
        completed: target_met(indicator, total) && filled == required,
        filled,
        required,
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn target_reached_with_all_periods_filled() {
        let ind = indicator(1, "Visits", 100.0, monthly());
        let periods = two_months();
        let entries = sheet(&[(1, 1, "40"), (1, 2, "60")]);
        assert_eq!(total(&ind, &periods, &entries), 100.0);
        assert!(is_completed(&ind, &periods, &entries));
    }

    #[test]
    fn all_filled_but_below_target() {
        let ind = indicator(1, "Visits", 100.0, monthly());
        let periods = two_months();
        let entries = sheet(&[(1, 1, "1"), (1, 2, "2")]);
        assert!(!is_completed(&ind, &periods, &entries));
    }

    #[test]
    fn target_reached_but_one_period_blank() {
        let ind = indicator(1, "Visits", 100.0, monthly());
        let periods = two_months();
        let entries = sheet(&[(1, 1, "150"), (1, 2, "  ")]);
        assert!(total(&ind, &periods, &entries) >= 100.0);
        assert!(!is_completed(&ind, &periods, &entries));
    }

    #[test]
    fn zero_counts_as_entered() {
        let ind = indicator(1, "Incidents", 0.0, monthly());
        let periods = two_months();
        let entries = sheet(&[(1, 1, "0"), (1, 2, "0")]);
        assert!(is_completed(&ind, &periods, &entries));
    }

    #[test]
    fn sub_indicator_values_roll_up_and_must_be_filled() {
        let mut ind = indicator(1, "Revenue", 100.0, monthly());
        ind.sub_indicators = vec![sub(10, "Ward", 1), sub(11, "Clinic", 2)];
        let periods = two_months();

        let entries = sheet(&[
            (1, 1, "10"),
            (1, 2, "10"),
            (10, 1, "20"),
            (10, 2, "20"),
            (11, 1, "20"),
            (11, 2, "20"),
        ]);
        assert_eq!(total(&ind, &periods, &entries), 100.0);
        assert!(is_completed(&ind, &periods, &entries));

        let missing_sub = sheet(&[
            (1, 1, "10"),
            (1, 2, "10"),
            (10, 1, "50"),
            (10, 2, "50"),
            (11, 1, "20"),
        ]);
        assert!(!is_completed(&ind, &periods, &missing_sub));
    }

    #[test]
    fn other_frequency_periods_are_ignored() {
        let ind = indicator(1, "Visits", 10.0, monthly());
        let mut periods = two_months();
        periods.push(period(3, "2024-01-01", "2024-03-31", 2));
        let entries = sheet(&[(1, 1, "5"), (1, 2, "5"), (1, 3, "99")]);
        assert_eq!(total(&ind, &periods, &entries), 10.0);
        assert_eq!(relevant_periods(&ind, &periods).len(), 2);
    }

    #[test]
    fn non_numeric_values_contribute_zero_but_are_present() {
        let ind = indicator(1, "Visits", 10.0, monthly());
        let periods = two_months();
        let entries = sheet(&[(1, 1, "abc"), (1, 2, "10")]);
        assert_eq!(total(&ind, &periods, &entries), 10.0);
        assert!(is_completed(&ind, &periods, &entries));
    }

    #[test]
    fn progress_counts_cells() {
        let mut ind = indicator(1, "Revenue", 200.0, monthly());
        ind.sub_indicators = vec![sub(10, "Ward", 1)];
        let periods = two_months();
        let entries = sheet(&[(1, 1, "50"), (10, 1, "50")]);
        let p = progress(&ind, &periods, &entries);
        assert_eq!(p.filled, 2);
        assert_eq!(p.required, 4);
        assert_eq!(p.total, 100.0);
        assert_eq!(p.ratio(), Some(0.5));
        assert!(!p.completed);
    }
}
