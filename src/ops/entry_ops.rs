use tracing::debug;

use crate::model::dataset::Dataset;
use crate::model::entry::{EntryKey, parse_value};

/// Error type for data-entry operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntryError {
    #[error("indicator not found: {0}")]
    UnknownIndicator(u32),
    #[error("period not found: {0}")]
    UnknownPeriod(u32),
    #[error("period {period_id} belongs to another frequency than indicator {indicator_id}")]
    WrongFrequency { indicator_id: u32, period_id: u32 },
    #[error("not a number: {0:?}")]
    NotANumber(String),
    #[error("invalid entry {0:?}: expected INDICATOR:PERIOD=VALUE")]
    BadSyntax(String),
}

/// One requested cell edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInput {
    pub indicator_id: u32,
    pub period_id: u32,
    pub value: String,
}

impl EntryInput {
    /// Parse `IND:PERIOD=VALUE`. An empty VALUE clears the cell.
    pub fn parse(s: &str) -> Result<Self, EntryError> {
        let bad = || EntryError::BadSyntax(s.to_string());
        let (key, value) = s.split_once('=').ok_or_else(bad)?;
        let (ind, per) = key.split_once(':').ok_or_else(bad)?;
        Ok(EntryInput {
            indicator_id: ind.trim().parse().map_err(|_| bad())?,
            period_id: per.trim().parse().map_err(|_| bad())?,
            value: value.trim().to_string(),
        })
    }

    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.indicator_id, self.period_id)
    }
}

/// Check that a cell exists: the indicator (or sub-indicator) is known, the
/// period is known, and the period belongs to the owning indicator's
/// frequency.
pub fn validate_cell(dataset: &Dataset, indicator_id: u32, period_id: u32) -> Result<(), EntryError> {
    let owner = dataset
        .owning_indicator(indicator_id)
        .ok_or(EntryError::UnknownIndicator(indicator_id))?;
    let period = dataset
        .find_period(period_id)
        .ok_or(EntryError::UnknownPeriod(period_id))?;
    if period.frequency_id != owner.frequency_id() {
        return Err(EntryError::WrongFrequency {
            indicator_id,
            period_id,
        });
    }
    Ok(())
}

/// Apply a batch of edits to the dataset's entry map.
///
/// All inputs are validated before any is applied, so a bad input leaves the
/// map untouched. Returns the keys whose text changed; every applied key is
/// left dirty for the next save.
pub fn enter_values(dataset: &mut Dataset, inputs: &[EntryInput]) -> Result<Vec<EntryKey>, EntryError> {
    for input in inputs {
        validate_cell(dataset, input.indicator_id, input.period_id)?;
        if !input.value.is_empty() && parse_value(&input.value).is_none() {
            return Err(EntryError::NotANumber(input.value.clone()));
        }
    }

    let mut changed = Vec::new();
    for input in inputs {
        if dataset.entries.set_value(input.key(), input.value.clone()) {
            changed.push(input.key());
        }
        debug!(
            indicator_id = input.indicator_id,
            period_id = input.period_id,
            value = %input.value,
            "entry set"
        );
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::completion::fixtures::*;

    fn dataset() -> Dataset {
        let mut parent = indicator(1, "Revenue", 100.0, monthly());
        parent.sub_indicators = vec![sub(10, "Ward", 1)];
        let mut periods = two_months();
        periods.push(period(3, "2024-01-01", "2024-03-31", 2));
        test_dataset(vec![parent], periods)
    }

    #[test]
    fn parse_entry_input() {
        assert_eq!(
            EntryInput::parse("1:2=40.5").unwrap(),
            EntryInput {
                indicator_id: 1,
                period_id: 2,
                value: "40.5".into()
            }
        );
        assert_eq!(EntryInput::parse("1:2=").unwrap().value, "");
        assert!(matches!(
            EntryInput::parse("1-2=3"),
            Err(EntryError::BadSyntax(_))
        ));
        assert!(EntryInput::parse("a:2=3").is_err());
    }

    #[test]
    fn sub_indicator_uses_parent_frequency() {
        let ds = dataset();
        assert!(validate_cell(&ds, 10, 1).is_ok());
        assert_eq!(
            validate_cell(&ds, 10, 3),
            Err(EntryError::WrongFrequency {
                indicator_id: 10,
                period_id: 3
            })
        );
        assert_eq!(validate_cell(&ds, 99, 1), Err(EntryError::UnknownIndicator(99)));
        assert_eq!(validate_cell(&ds, 1, 99), Err(EntryError::UnknownPeriod(99)));
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let mut ds = dataset();
        let inputs = vec![
            EntryInput::parse("1:1=40").unwrap(),
            EntryInput::parse("1:2=lots").unwrap(),
        ];
        assert_eq!(
            enter_values(&mut ds, &inputs),
            Err(EntryError::NotANumber("lots".into()))
        );
        assert!(ds.entries.is_empty());
    }

    #[test]
    fn stray_commas_are_rejected() {
        let mut ds = dataset();
        let inputs = vec![EntryInput::parse("1:1=1,2,3").unwrap()];
        assert_eq!(
            enter_values(&mut ds, &inputs),
            Err(EntryError::NotANumber("1,2,3".into()))
        );
        let inputs = vec![EntryInput::parse("1:1=1,200").unwrap()];
        enter_values(&mut ds, &inputs).unwrap();
        assert_eq!(ds.entries.numeric_value(1, 1), 1200.0);
    }

    #[test]
    fn applied_entries_are_dirty() {
        let mut ds = dataset();
        let inputs = vec![
            EntryInput::parse("1:1=40").unwrap(),
            EntryInput::parse("10:1=0").unwrap(),
        ];
        let changed = enter_values(&mut ds, &inputs).unwrap();
        assert_eq!(changed, vec![EntryKey::new(1, 1), EntryKey::new(10, 1)]);
        assert_eq!(ds.entries.dirty_keys().len(), 2);
        assert_eq!(ds.entries.raw_value(10, 1), "0");
    }
}
