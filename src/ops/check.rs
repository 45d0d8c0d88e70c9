use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::dataset::Dataset;
use crate::model::period::Period;
use crate::ops::entry_ops::{EntryError, validate_cell};
use crate::ops::overlap::{find_overlap, validate_range};

/// Structured result from `kpi check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A validation error (something that should be fixed).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// A period ends on or before the day it starts
    #[serde(rename = "invalid_range")]
    InvalidRange {
        period_id: u32,
        name: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    /// Two periods of one frequency share at least one day
    #[serde(rename = "overlap")]
    Overlap {
        frequency_id: u32,
        first_period_id: u32,
        second_period_id: u32,
    },
    /// The same period ID is used more than once
    #[serde(rename = "duplicate_period_id")]
    DuplicatePeriodId { period_id: u32 },
    /// An entry points at a period that doesn't exist
    #[serde(rename = "dangling_period")]
    DanglingPeriod { indicator_id: u32, period_id: u32 },
}

/// A validation warning (non-critical issue).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// Indicators use a frequency that has no periods yet
    #[serde(rename = "frequency_without_periods")]
    FrequencyWithoutPeriods { frequency_id: u32, name: String },
    /// An indicator is also listed as another indicator's sub-indicator
    #[serde(rename = "nested_listed_top_level")]
    NestedListedTopLevel { indicator_id: u32, parent_id: u32 },
    /// An entry belongs to an indicator that doesn't exist
    #[serde(rename = "orphan_entry")]
    OrphanEntry { indicator_id: u32, period_id: u32 },
    /// An entry uses a period from another frequency than its indicator's
    #[serde(rename = "foreign_period_entry")]
    ForeignPeriodEntry { indicator_id: u32, period_id: u32 },
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a dataset and return structured results.
///
/// Read-only. Checks performed:
/// 1. Every period ends after it starts
/// 2. No two periods of a frequency overlap (first conflict per frequency)
/// 3. Period IDs are unique
/// 4. Entries point at known indicators and periods of the right frequency
/// 5. Warnings for frequencies without periods and doubly-listed indicators
pub fn check_dataset(dataset: &Dataset) -> CheckResult {
    let mut result = CheckResult::default();

    check_periods(&dataset.periods, &mut result);
    check_entries(dataset, &mut result);
    check_indicators(dataset, &mut result);

    result.valid = result.errors.is_empty();
    result
}

fn check_periods(periods: &[Period], result: &mut CheckResult) {
    let mut seen = HashSet::new();
    for p in periods {
        if !seen.insert(p.period_id) {
            result
                .errors
                .push(CheckError::DuplicatePeriodId { period_id: p.period_id });
        }
        if validate_range(p.start_date, p.end_date).is_err() {
            result.errors.push(CheckError::InvalidRange {
                period_id: p.period_id,
                name: p.name.clone(),
                start_date: p.start_date,
                end_date: p.end_date,
            });
        }
    }

    // Only well-formed ranges take part in the overlap scan
    let mut by_frequency: Vec<(u32, Vec<&Period>)> = Vec::new();
    for p in periods {
        if validate_range(p.start_date, p.end_date).is_err() {
            continue;
        }
        match by_frequency.iter_mut().find(|(fid, _)| *fid == p.frequency_id) {
            Some((_, list)) => list.push(p),
            None => by_frequency.push((p.frequency_id, vec![p])),
        }
    }
    for (frequency_id, list) in &by_frequency {
        if let Some(o) = find_overlap(list) {
            result.errors.push(CheckError::Overlap {
                frequency_id: *frequency_id,
                first_period_id: list[o.first].period_id,
                second_period_id: list[o.second].period_id,
            });
        }
    }
}

fn check_entries(dataset: &Dataset, result: &mut CheckResult) {
    for (key, _) in dataset.entries.iter() {
        match validate_cell(dataset, key.indicator_id, key.period_id) {
            Ok(()) => {}
            Err(EntryError::UnknownIndicator(_)) => {
                result.warnings.push(CheckWarning::OrphanEntry {
                    indicator_id: key.indicator_id,
                    period_id: key.period_id,
                })
            }
            Err(EntryError::UnknownPeriod(_)) => result.errors.push(CheckError::DanglingPeriod {
                indicator_id: key.indicator_id,
                period_id: key.period_id,
            }),
            Err(_) => result.warnings.push(CheckWarning::ForeignPeriodEntry {
                indicator_id: key.indicator_id,
                period_id: key.period_id,
            }),
        }
    }
}

fn check_indicators(dataset: &Dataset, result: &mut CheckResult) {
    let mut parent_of: HashMap<u32, u32> = HashMap::new();
    for ind in &dataset.indicators {
        for s in &ind.sub_indicators {
            parent_of.entry(s.id).or_insert(ind.id);
        }
    }
    for ind in &dataset.indicators {
        if let Some(parent_id) = parent_of.get(&ind.id) {
            result.warnings.push(CheckWarning::NestedListedTopLevel {
                indicator_id: ind.id,
                parent_id: *parent_id,
            });
        }
    }

    for freq in dataset.frequencies() {
        if dataset.periods_for_frequency(freq.frequency_id).is_empty() {
            result.warnings.push(CheckWarning::FrequencyWithoutPeriods {
                frequency_id: freq.frequency_id,
                name: freq.name.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::completion::fixtures::*;

    #[test]
    fn clean_dataset_is_valid() {
        let ds = test_dataset(vec![indicator(1, "A", 10.0, monthly())], two_months());
        let result = check_dataset(&ds);
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn overlapping_and_inverted_periods_are_errors() {
        let periods = vec![
            period(1, "2024-01-01", "2024-01-31", 1),
            period(2, "2024-01-15", "2024-02-15", 1),
            period(3, "2024-05-10", "2024-05-01", 1),
            period(4, "2024-06-01", "2024-06-01", 1),
        ];
        let ds = test_dataset(vec![indicator(1, "A", 10.0, monthly())], periods);
        let result = check_dataset(&ds);
        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec![
                CheckError::InvalidRange {
                    period_id: 3,
                    name: "P3".into(),
                    start_date: date("2024-05-10"),
                    end_date: date("2024-05-01"),
                },
                CheckError::InvalidRange {
                    period_id: 4,
                    name: "P4".into(),
                    start_date: date("2024-06-01"),
                    end_date: date("2024-06-01"),
                },
                CheckError::Overlap {
                    frequency_id: 1,
                    first_period_id: 1,
                    second_period_id: 2,
                },
            ]
        );
    }

    #[test]
    fn same_dates_in_different_frequencies_do_not_overlap() {
        let periods = vec![
            period(1, "2024-01-01", "2024-03-31", 1),
            period(2, "2024-01-01", "2024-03-31", 2),
        ];
        let ds = test_dataset(
            vec![
                indicator(1, "A", 10.0, monthly()),
                indicator(2, "B", 10.0, quarterly()),
            ],
            periods,
        );
        assert!(check_dataset(&ds).valid);
    }

    #[test]
    fn entry_problems() {
        let mut ds = test_dataset(vec![indicator(1, "A", 10.0, monthly())], two_months());
        ds.periods.push(period(3, "2024-01-01", "2024-03-31", 2));
        ds.entries = sheet(&[(1, 1, "5"), (7, 1, "5"), (1, 9, "5"), (1, 3, "5")]);

        let result = check_dataset(&ds);
        assert_eq!(
            result.errors,
            vec![CheckError::DanglingPeriod {
                indicator_id: 1,
                period_id: 9
            }]
        );
        assert!(result.warnings.contains(&CheckWarning::OrphanEntry {
            indicator_id: 7,
            period_id: 1
        }));
        assert!(result.warnings.contains(&CheckWarning::ForeignPeriodEntry {
            indicator_id: 1,
            period_id: 3
        }));
    }

    #[test]
    fn indicator_warnings() {
        let mut parent = indicator(1, "Revenue", 10.0, monthly());
        parent.sub_indicators = vec![sub(2, "Ward", 1)];
        let ds = test_dataset(
            vec![
                parent,
                indicator(2, "Ward", 5.0, monthly()),
                indicator(3, "Audit", 1.0, quarterly()),
            ],
            two_months(),
        );
        let result = check_dataset(&ds);
        assert!(result.valid);
        assert_eq!(
            result.warnings,
            vec![
                CheckWarning::NestedListedTopLevel {
                    indicator_id: 2,
                    parent_id: 1
                },
                CheckWarning::FrequencyWithoutPeriods {
                    frequency_id: 2,
                    name: "Quarterly".into()
                },
            ]
        );
    }

    #[test]
    fn serializes_with_type_tag() {
        let err = CheckError::Overlap {
            frequency_id: 1,
            first_period_id: 1,
            second_period_id: 2,
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"type\":\"overlap\""));
    }
}
