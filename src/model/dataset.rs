use std::path::PathBuf;

use super::config::KpiConfig;
use super::entry::EntrySheet;
use super::indicator::{Category, Frequency, Indicator};
use super::period::Period;

/// A fully loaded KPI dataset
#[derive(Debug)]
pub struct Dataset {
    /// Root directory (parent of `kpi/`)
    pub root: PathBuf,
    /// Path to the `kpi/` directory
    pub data_dir: PathBuf,
    /// Parsed kpi.toml
    pub config: KpiConfig,
    pub indicators: Vec<Indicator>,
    pub periods: Vec<Period>,
    pub categories: Vec<Category>,
    /// Entry map owned by this dataset; the only writer of entry state
    pub entries: EntrySheet,
}

impl Dataset {
    pub fn find_indicator(&self, id: u32) -> Option<&Indicator> {
        self.indicators.iter().find(|i| i.id == id)
    }

    /// The top-level indicator that owns `id`, either directly or as a
    /// sub-indicator
    pub fn owning_indicator(&self, id: u32) -> Option<&Indicator> {
        self.indicators
            .iter()
            .find(|i| i.id != id && i.owns(id))
            .or_else(|| self.find_indicator(id))
    }

    pub fn find_period(&self, period_id: u32) -> Option<&Period> {
        self.periods.iter().find(|p| p.period_id == period_id)
    }

    pub fn find_category(&self, id: u32) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Distinct frequencies referenced by indicators, in first-seen order
    pub fn frequencies(&self) -> Vec<&Frequency> {
        let mut seen = Vec::new();
        for ind in &self.indicators {
            if !seen
                .iter()
                .any(|f: &&Frequency| f.frequency_id == ind.frequency.frequency_id)
            {
                seen.push(&ind.frequency);
            }
        }
        seen
    }

    pub fn find_frequency(&self, frequency_id: u32) -> Option<&Frequency> {
        self.indicators
            .iter()
            .map(|i| &i.frequency)
            .find(|f| f.frequency_id == frequency_id)
    }

    /// Periods of one frequency, in stored order
    pub fn periods_for_frequency(&self, frequency_id: u32) -> Vec<&Period> {
        self.periods
            .iter()
            .filter(|p| p.frequency_id == frequency_id)
            .collect()
    }

    /// Indicators in a category (all indicators when `category_id` is None)
    pub fn indicators_in_category(&self, category_id: Option<u32>) -> Vec<Indicator> {
        self.indicators
            .iter()
            .filter(|i| category_id.is_none() || i.category_id == category_id)
            .cloned()
            .collect()
    }

    /// Periods used by a category: those whose frequency belongs to one of
    /// the category's indicators
    pub fn periods_in_category(&self, category_id: Option<u32>) -> Vec<Period> {
        let freq_ids: Vec<u32> = self
            .indicators_in_category(category_id)
            .iter()
            .map(Indicator::frequency_id)
            .collect();
        self.periods
            .iter()
            .filter(|p| category_id.is_none() || freq_ids.contains(&p.frequency_id))
            .cloned()
            .collect()
    }

    pub fn next_period_id(&self) -> u32 {
        self.periods.iter().map(|p| p.period_id).max().unwrap_or(0) + 1
    }
}
