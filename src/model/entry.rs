use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Composite key of one data-entry cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    pub indicator_id: u32,
    pub period_id: u32,
}

impl EntryKey {
    pub fn new(indicator_id: u32, period_id: u32) -> Self {
        EntryKey {
            indicator_id,
            period_id,
        }
    }
}

/// A user-supplied actual value for one (indicator, period) cell
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    /// Raw text as typed; parsed on demand
    pub actual_value: String,
    /// Set on edit, cleared after a successful save
    pub is_modified: bool,
}

impl Entry {
    /// Blank means nothing but whitespace. "0" is not blank.
    pub fn is_blank(&self) -> bool {
        self.actual_value.trim().is_empty()
    }

    /// Parsed numeric value; anything unparseable counts as zero
    pub fn numeric(&self) -> f64 {
        parse_value(&self.actual_value).unwrap_or(0.0)
    }
}

/// Parse a typed value, accepting thousands separators ("1,250.5")
pub fn parse_value(raw: &str) -> Option<f64> {
    let cleaned = strip_thousands(raw.trim())?;
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Drop commas that separate groups of three integer digits; any other comma
/// makes the value unparseable.
fn strip_thousands(s: &str) -> Option<String> {
    if !s.contains(',') {
        return Some(s.to_string());
    }
    let unsigned = s.strip_prefix(['-', '+']).unwrap_or(s);
    let (int_part, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if fraction.contains(',') {
        return None;
    }
    let is_digits = |g: &str| g.bytes().all(|b| b.is_ascii_digit());
    let mut groups = int_part.split(',');
    let lead = groups.next()?;
    if !(1..=3).contains(&lead.len()) || !is_digits(lead) {
        return None;
    }
    if !groups.all(|g| g.len() == 3 && is_digits(g)) {
        return None;
    }
    Some(s.replace(',', ""))
}

/// Wire shape of a stored entry (`entries.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub indicator_id: u32,
    pub period_id: u32,
    #[serde(default, deserialize_with = "deserialize_actual_value")]
    pub actual_value: String,
}

/// Accept a number, a string, or null for `actual_value`
fn deserialize_actual_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawValue {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<RawValue>::deserialize(deserializer)? {
        Some(RawValue::Number(n)) => format_number(n),
        Some(RawValue::Text(s)) => s,
        None => String::new(),
    })
}

/// Render a number without a trailing `.0` for whole values
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// The in-memory entry map for a data-entry table.
///
/// Seeded from stored records, mutated by user input, and written back by
/// saving only the dirty cells. Entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct EntrySheet {
    entries: BTreeMap<EntryKey, Entry>,
}

impl EntrySheet {
    pub fn new() -> Self {
        EntrySheet::default()
    }

    /// Seed from stored records. Later duplicates of a key win.
    pub fn from_records(records: &[EntryRecord]) -> Self {
        let mut sheet = EntrySheet::new();
        for r in records {
            sheet.entries.insert(
                EntryKey::new(r.indicator_id, r.period_id),
                Entry {
                    actual_value: r.actual_value.clone(),
                    is_modified: false,
                },
            );
        }
        sheet
    }

    pub fn get(&self, key: EntryKey) -> Option<&Entry> {
        self.entries.get(&key)
    }

    /// Raw text for a cell, empty if never entered
    pub fn raw_value(&self, indicator_id: u32, period_id: u32) -> &str {
        self.get(EntryKey::new(indicator_id, period_id))
            .map(|e| e.actual_value.as_str())
            .unwrap_or("")
    }

    /// Numeric value for a cell; missing or non-numeric is zero
    pub fn numeric_value(&self, indicator_id: u32, period_id: u32) -> f64 {
        self.get(EntryKey::new(indicator_id, period_id))
            .map(Entry::numeric)
            .unwrap_or(0.0)
    }

    pub fn is_blank(&self, indicator_id: u32, period_id: u32) -> bool {
        self.get(EntryKey::new(indicator_id, period_id))
            .is_none_or(Entry::is_blank)
    }

    /// Set a cell's value and flag it dirty. Returns true if the text changed.
    pub fn set_value(&mut self, key: EntryKey, value: impl Into<String>) -> bool {
        let value = value.into();
        let entry = self.entries.entry(key).or_default();
        if entry.actual_value == value && !entry.is_modified {
            return false;
        }
        let changed = entry.actual_value != value;
        entry.actual_value = value;
        entry.is_modified = true;
        changed
    }

    pub fn dirty_keys(&self) -> Vec<EntryKey> {
        self.entries
            .iter()
            .filter(|(_, e)| e.is_modified)
            .map(|(k, _)| *k)
            .collect()
    }

    pub fn has_unsaved(&self) -> bool {
        self.entries.values().any(|e| e.is_modified)
    }

    /// Clear the dirty flag on the given keys after they were persisted
    pub fn mark_saved(&mut self, keys: &[EntryKey]) {
        for key in keys {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.is_modified = false;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntryKey, &Entry)> {
        self.entries.iter()
    }

    /// Records for every entry, in key order
    pub fn to_records(&self) -> Vec<EntryRecord> {
        self.entries
            .iter()
            .map(|(k, e)| EntryRecord {
                indicator_id: k.indicator_id,
                period_id: k.period_id,
                actual_value: e.actual_value.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actual_value_accepts_number_string_and_null() {
        let json = r#"[
            {"indicator_id": 1, "period_id": 1, "actual_value": 40},
            {"indicator_id": 1, "period_id": 2, "actual_value": "12.5"},
            {"indicator_id": 1, "period_id": 3, "actual_value": null},
            {"indicator_id": 1, "period_id": 4}
        ]"#;
        let records: Vec<EntryRecord> = serde_json::from_str(json).unwrap();
        let values: Vec<&str> = records.iter().map(|r| r.actual_value.as_str()).collect();
        assert_eq!(values, vec!["40", "12.5", "", ""]);
    }

    #[test]
    fn blank_is_distinct_from_zero() {
        let mut sheet = EntrySheet::new();
        sheet.set_value(EntryKey::new(1, 1), "0");
        sheet.set_value(EntryKey::new(1, 2), "   ");
        assert!(!sheet.is_blank(1, 1));
        assert!(sheet.is_blank(1, 2));
        assert!(sheet.is_blank(1, 3));
    }

    #[test]
    fn non_numeric_values_count_as_zero() {
        let mut sheet = EntrySheet::new();
        sheet.set_value(EntryKey::new(1, 1), "n/a");
        sheet.set_value(EntryKey::new(1, 2), "1,250.5");
        assert_eq!(sheet.numeric_value(1, 1), 0.0);
        assert_eq!(sheet.numeric_value(1, 2), 1250.5);
        assert_eq!(sheet.numeric_value(9, 9), 0.0);
    }

    #[test]
    fn commas_only_group_thousands() {
        assert_eq!(parse_value("1,250.5"), Some(1250.5));
        assert_eq!(parse_value("-12,000,000"), Some(-12_000_000.0));
        assert_eq!(parse_value("999"), Some(999.0));
        assert_eq!(parse_value("1,2,3"), None);
        assert_eq!(parse_value("12,34"), None);
        assert_eq!(parse_value("1234,567"), None);
        assert_eq!(parse_value(",100"), None);
        assert_eq!(parse_value("1.5,0"), None);
    }

    #[test]
    fn dirty_flag_lifecycle() {
        let records = vec![EntryRecord {
            indicator_id: 1,
            period_id: 1,
            actual_value: "10".into(),
        }];
        let mut sheet = EntrySheet::from_records(&records);
        assert!(!sheet.has_unsaved());

        assert!(sheet.set_value(EntryKey::new(1, 1), "15"));
        assert!(sheet.set_value(EntryKey::new(2, 1), "3"));
        assert_eq!(
            sheet.dirty_keys(),
            vec![EntryKey::new(1, 1), EntryKey::new(2, 1)]
        );

        sheet.mark_saved(&[EntryKey::new(1, 1)]);
        assert_eq!(sheet.dirty_keys(), vec![EntryKey::new(2, 1)]);
        assert_eq!(sheet.raw_value(1, 1), "15");
    }

    #[test]
    fn setting_same_value_on_clean_entry_is_a_no_op() {
        let records = vec![EntryRecord {
            indicator_id: 1,
            period_id: 1,
            actual_value: "10".into(),
        }];
        let mut sheet = EntrySheet::from_records(&records);
        assert!(!sheet.set_value(EntryKey::new(1, 1), "10"));
        assert!(!sheet.has_unsaved());
    }

    #[test]
    fn format_number_drops_trailing_zero() {
        assert_eq!(format_number(40.0), "40");
        assert_eq!(format_number(12.5), "12.5");
        assert_eq!(format_number(-3.0), "-3");
    }
}
