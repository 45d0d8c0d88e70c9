//! View models for the data-entry table, built fresh from a dataset snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::config::ViewMode;
use crate::model::dataset::Dataset;
use crate::model::indicator::{Frequency, Indicator};
use crate::model::period::Period;
use crate::ops::completion::{Progress, progress};
use crate::ops::grouping::{
    FrequencyGroup, group_by_frequency, sort_frequency_groups_by_urgency,
    sort_indicators_by_deadline, sort_indicators_default,
};
use crate::ops::urgency::{Urgency, UrgencyPolicy, classify_urgency, days_remaining};

#[derive(Debug, Clone, Serialize)]
pub struct PeriodView {
    #[serde(flatten)]
    pub period: Period,
    pub urgency: Urgency,
    pub days_remaining: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubRowView {
    pub id: u32,
    pub name: String,
    /// One value per group period, blank when not entered
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowView {
    pub id: u32,
    pub name: String,
    pub unit: String,
    pub progress: Progress,
    pub values: Vec<String>,
    pub sub_rows: Vec<SubRowView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupView {
    pub frequency: Frequency,
    /// Triage score, present in deadline mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub periods: Vec<PeriodView>,
    pub rows: Vec<RowView>,
}

/// A period with its urgency relative to `now`
pub fn period_view(period: &Period, now: DateTime<Utc>, policy: &UrgencyPolicy) -> PeriodView {
    PeriodView {
        period: period.clone(),
        urgency: classify_urgency(period, now, policy),
        days_remaining: days_remaining(period.end_date, now, policy),
    }
}

fn row_view(ind: &Indicator, group: &FrequencyGroup, dataset: &Dataset) -> RowView {
    let values_for = |id: u32| -> Vec<String> {
        group
            .relevant_periods
            .iter()
            .map(|p| dataset.entries.raw_value(id, p.period_id).to_string())
            .collect()
    };
    RowView {
        id: ind.id,
        name: ind.name.clone(),
        unit: ind.unit.name.clone(),
        progress: progress(ind, &group.relevant_periods, &dataset.entries),
        values: values_for(ind.id),
        sub_rows: ind
            .sorted_sub_indicators()
            .into_iter()
            .map(|s| SubRowView {
                id: s.id,
                name: s.name.clone(),
                values: values_for(s.id),
            })
            .collect(),
    }
}

fn group_view(
    group: &FrequencyGroup,
    score: Option<f64>,
    rows: Vec<Indicator>,
    dataset: &Dataset,
    now: DateTime<Utc>,
    policy: &UrgencyPolicy,
) -> GroupView {
    GroupView {
        frequency: group.frequency.clone(),
        score,
        periods: group
            .relevant_periods
            .iter()
            .map(|p| period_view(p, now, policy))
            .collect(),
        rows: rows.iter().map(|ind| row_view(ind, group, dataset)).collect(),
    }
}

/// Build the grouped table for a category (or everything).
///
/// Default mode keeps groups in first-seen order with incomplete rows first.
/// Deadline mode orders groups by triage score and rows by least progress
/// under deadline pressure.
pub fn build_view(
    dataset: &Dataset,
    category_id: Option<u32>,
    mode: ViewMode,
    now: DateTime<Utc>,
) -> Vec<GroupView> {
    let indicators = dataset.indicators_in_category(category_id);
    // sub-indicators listed outside the category still need to be dropped
    let nested: Vec<u32> = dataset
        .indicators
        .iter()
        .flat_map(|i| i.sub_indicators.iter().map(|s| s.id))
        .collect();
    let indicators: Vec<Indicator> = indicators
        .into_iter()
        .filter(|i| !nested.contains(&i.id))
        .collect();
    let periods = dataset.periods_in_category(category_id);

    let groups = group_by_frequency(&indicators, &periods);
    let policy = UrgencyPolicy::from_config(&dataset.config);

    match mode {
        ViewMode::Default => groups
            .values()
            .map(|g| {
                let rows = sort_indicators_default(g, &dataset.entries);
                group_view(g, None, rows, dataset, now, &policy)
            })
            .collect(),
        ViewMode::Deadline => sort_frequency_groups_by_urgency(
            &groups,
            &dataset.entries,
            now,
            &policy,
            &dataset.config.urgency,
        )
        .into_iter()
        .map(|(score, g)| {
            let rows = sort_indicators_by_deadline(&g, &dataset.entries, now, &policy);
            group_view(&g, Some(score), rows, dataset, now, &policy)
        })
        .collect(),
    }
}
