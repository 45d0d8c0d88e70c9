//! Frequency grouping and the two row orderings of the data-entry table.
//!
//! Everything here is recomputed from a snapshot of indicators, periods and
//! entries; nothing is cached between calls.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;

use crate::model::config::UrgencyConfig;
use crate::model::entry::EntrySheet;
use crate::model::indicator::{Frequency, Indicator};
use crate::model::period::Period;
use crate::ops::completion::{is_completed, total_for_periods};
use crate::ops::urgency::{Urgency, UrgencyPolicy, classify_urgency};

/// Indicators sharing one frequency, with the periods they are measured over
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyGroup {
    pub frequency: Frequency,
    pub indicators: Vec<Indicator>,
    pub relevant_periods: Vec<Period>,
}

/// Drop indicators that are listed as a sub-indicator of another indicator.
/// Those are rendered nested under their parent instead.
pub fn top_level_indicators(indicators: &[Indicator]) -> Vec<&Indicator> {
    let nested: HashSet<u32> = indicators
        .iter()
        .flat_map(|i| i.sub_indicators.iter().map(|s| s.id))
        .collect();
    indicators
        .iter()
        .filter(|i| !nested.contains(&i.id))
        .collect()
}

/// Bucket top-level indicators by frequency, in first-seen order
pub fn group_by_frequency(
    indicators: &[Indicator],
    periods: &[Period],
) -> IndexMap<u32, FrequencyGroup> {
    let mut groups: IndexMap<u32, FrequencyGroup> = IndexMap::new();
    for ind in top_level_indicators(indicators) {
        let fid = ind.frequency_id();
        groups
            .entry(fid)
            .or_insert_with(|| FrequencyGroup {
                frequency: ind.frequency.clone(),
                indicators: Vec::new(),
                relevant_periods: periods
                    .iter()
                    .filter(|p| p.frequency_id == fid)
                    .cloned()
                    .collect(),
            })
            .indicators
            .push(ind.clone());
    }
    groups
}

/// Start date of the earliest relevant period the indicator has not filled yet
pub fn earliest_open_start(
    indicator: &Indicator,
    periods: &[Period],
    entries: &EntrySheet,
) -> Option<NaiveDate> {
    periods
        .iter()
        .filter(|p| p.frequency_id == indicator.frequency_id())
        .filter(|p| entries.is_blank(indicator.id, p.period_id))
        .map(|p| p.start_date)
        .min()
}

/// None sorts after every date
fn cmp_open_start(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Default row order: incomplete before completed, then by the start of the
/// earliest still-open period. Stable.
pub fn sort_indicators_default(group: &FrequencyGroup, entries: &EntrySheet) -> Vec<Indicator> {
    let mut keyed: Vec<(bool, Option<NaiveDate>, &Indicator)> = group
        .indicators
        .iter()
        .map(|ind| {
            (
                is_completed(ind, &group.relevant_periods, entries),
                earliest_open_start(ind, &group.relevant_periods, entries),
                ind,
            )
        })
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| cmp_open_start(a.1, b.1)));
    keyed.into_iter().map(|(_, _, ind)| ind.clone()).collect()
}

/// The group's periods that are overdue or due soon, with their urgency
pub fn urgent_in_group<'a>(
    group: &'a FrequencyGroup,
    now: DateTime<Utc>,
    policy: &UrgencyPolicy,
) -> Vec<(&'a Period, Urgency)> {
    group
        .relevant_periods
        .iter()
        .map(|p| (p, classify_urgency(p, now, policy)))
        .filter(|(_, u)| u.is_urgent())
        .collect()
}

/// Entered total over the urgent periods divided by target (target 0 -> 1)
pub fn urgent_progress_ratio(
    indicator: &Indicator,
    urgent: &[&Period],
    entries: &EntrySheet,
) -> f64 {
    let target = if indicator.target_value > 0.0 {
        indicator.target_value
    } else {
        1.0
    };
    total_for_periods(indicator, urgent.iter().copied(), entries) / target
}

/// Deadline row order for triage.
///
/// Incomplete indicators come first. Inside the incomplete block, when the
/// group has overdue or due-soon periods, the indicator with the least
/// progress over those periods leads; ties and groups without urgent periods
/// fall back to larger targets first. Completed indicators keep the
/// larger-target-first order.
pub fn sort_indicators_by_deadline(
    group: &FrequencyGroup,
    entries: &EntrySheet,
    now: DateTime<Utc>,
    policy: &UrgencyPolicy,
) -> Vec<Indicator> {
    let urgent: Vec<&Period> = urgent_in_group(group, now, policy)
        .into_iter()
        .map(|(p, _)| p)
        .collect();

    let mut keyed: Vec<(bool, Option<f64>, &Indicator)> = group
        .indicators
        .iter()
        .map(|ind| {
            let completed = is_completed(ind, &group.relevant_periods, entries);
            let ratio = if !completed && !urgent.is_empty() {
                Some(urgent_progress_ratio(ind, &urgent, entries))
            } else {
                None
            };
            (completed, ratio, ind)
        })
        .collect();

    keyed.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| match (a.1, b.1) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            })
            .then_with(|| {
                b.2.target_value
                    .partial_cmp(&a.2.target_value)
                    .unwrap_or(Ordering::Equal)
            })
    });
    keyed.into_iter().map(|(_, _, ind)| ind.clone()).collect()
}

/// Heuristic triage score for a whole group; higher needs attention sooner.
///
/// Each overdue period adds `overdue_points`, each due-soon period adds
/// `due_soon_points`, and when any period is urgent every incomplete
/// indicator adds up to `progress_penalty` scaled by how far it is from its
/// target over the urgent periods. Completed indicators add nothing.
pub fn group_urgency_score(
    group: &FrequencyGroup,
    entries: &EntrySheet,
    now: DateTime<Utc>,
    policy: &UrgencyPolicy,
    weights: &UrgencyConfig,
) -> f64 {
    let urgent = urgent_in_group(group, now, policy);
    let mut score = 0.0;
    for (_, u) in &urgent {
        score += match u {
            Urgency::Overdue => weights.overdue_points,
            Urgency::DueSoon => weights.due_soon_points,
            Urgency::Normal => 0.0,
        };
    }
    if urgent.is_empty() {
        return score;
    }

    let urgent_periods: Vec<&Period> = urgent.iter().map(|(p, _)| *p).collect();
    for ind in &group.indicators {
        if is_completed(ind, &group.relevant_periods, entries) {
            continue;
        }
        let ratio = urgent_progress_ratio(ind, &urgent_periods, entries);
        score += (1.0 - ratio.min(1.0)) * weights.progress_penalty;
    }
    score
}

/// Groups ordered by descending urgency score. Equal scores keep their
/// incoming order.
pub fn sort_frequency_groups_by_urgency(
    groups: &IndexMap<u32, FrequencyGroup>,
    entries: &EntrySheet,
    now: DateTime<Utc>,
    policy: &UrgencyPolicy,
    weights: &UrgencyConfig,
) -> Vec<(f64, FrequencyGroup)> {
    let mut scored: Vec<(f64, FrequencyGroup)> = groups
        .values()
        .map(|g| (group_urgency_score(g, entries, now, policy, weights), g.clone()))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::completion::fixtures::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn ids(inds: &[Indicator]) -> Vec<u32> {
        inds.iter().map(|i| i.id).collect()
    }

    #[test]
    fn sub_indicators_never_top_level() {
        let mut parent = indicator(1, "Revenue", 100.0, monthly());
        parent.sub_indicators = vec![sub(2, "Ward", 1)];
        let also_listed = indicator(2, "Ward", 50.0, monthly());
        let other = indicator(3, "Visits", 10.0, quarterly());
        let inds = vec![parent, also_listed, other];

        let groups = group_by_frequency(&inds, &two_months());
        let members: Vec<u32> = groups
            .values()
            .flat_map(|g| g.indicators.iter().map(|i| i.id))
            .collect();
        assert_eq!(members, vec![1, 3]);
    }

    #[test]
    fn groups_carry_matching_periods() {
        let inds = vec![
            indicator(1, "A", 1.0, monthly()),
            indicator(2, "B", 1.0, quarterly()),
            indicator(3, "C", 1.0, monthly()),
        ];
        let mut periods = two_months();
        periods.push(period(3, "2024-01-01", "2024-03-31", 2));

        let groups = group_by_frequency(&inds, &periods);
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(ids(&groups[&1].indicators), vec![1, 3]);
        assert_eq!(groups[&1].relevant_periods.len(), 2);
        assert_eq!(groups[&2].relevant_periods.len(), 1);
    }

    #[test]
    fn frequency_without_periods_yields_empty_group_periods() {
        let inds = vec![indicator(1, "A", 1.0, quarterly())];
        let groups = group_by_frequency(&inds, &two_months());
        assert!(groups[&2].relevant_periods.is_empty());
    }

    #[test]
    fn empty_input_gives_empty_map() {
        assert!(group_by_frequency(&[], &[]).is_empty());
    }

    #[test]
    fn default_order_incomplete_first_then_earliest_open() {
        let inds = vec![
            indicator(1, "done", 10.0, monthly()),
            indicator(2, "open-feb", 10.0, monthly()),
            indicator(3, "open-jan", 10.0, monthly()),
            indicator(4, "filled-short", 1000.0, monthly()),
        ];
        let entries = sheet(&[
            (1, 1, "5"),
            (1, 2, "5"),
            (2, 1, "1"),
            (4, 1, "1"),
            (4, 2, "1"),
        ]);
        let groups = group_by_frequency(&inds, &two_months());
        let sorted = sort_indicators_default(&groups[&1], &entries);
        // 4 is incomplete with nothing open, so it sorts after the open ones
        assert_eq!(ids(&sorted), vec![3, 2, 4, 1]);
    }

    #[test]
    fn urgent_in_group_skips_normal_periods() {
        let inds = vec![indicator(1, "A", 1.0, monthly())];
        let groups = group_by_frequency(&inds, &two_months());
        let policy = UrgencyPolicy::default();
        let now = policy.midnight(date("2024-02-02"));
        let urgent = urgent_in_group(&groups[&1], now, &policy);
        assert_eq!(urgent.len(), 1);
        assert_eq!(urgent[0].0.period_id, 1);
        assert_eq!(urgent[0].1, Urgency::Overdue);
    }

    #[test]
    fn deadline_order_least_progress_first() {
        let inds = vec![
            indicator(1, "half", 100.0, monthly()),
            indicator(2, "tenth", 100.0, monthly()),
            indicator(3, "complete", 10.0, monthly()),
        ];
        let entries = sheet(&[
            (1, 1, "50"),
            (2, 1, "10"),
            (3, 1, "5"),
            (3, 2, "5"),
        ]);
        let groups = group_by_frequency(&inds, &two_months());
        let policy = UrgencyPolicy::default();
        // Jan overdue, Feb normal
        let now = policy.midnight(date("2024-02-03"));
        let sorted = sort_indicators_by_deadline(&groups[&1], &entries, now, &policy);
        assert_eq!(ids(&sorted), vec![2, 1, 3]);
    }

    #[test]
    fn deadline_order_without_urgency_uses_target() {
        let inds = vec![
            indicator(1, "small", 10.0, monthly()),
            indicator(2, "large", 500.0, monthly()),
        ];
        let groups = group_by_frequency(&inds, &two_months());
        let policy = UrgencyPolicy::default();
        let now = policy.midnight(date("2023-06-01"));
        let sorted =
            sort_indicators_by_deadline(&groups[&1], &EntrySheet::new(), now, &policy);
        assert_eq!(ids(&sorted), vec![2, 1]);
    }

    #[test]
    fn deadline_ties_fall_back_to_target() {
        let inds = vec![
            indicator(1, "small", 10.0, monthly()),
            indicator(2, "large", 500.0, monthly()),
        ];
        let groups = group_by_frequency(&inds, &two_months());
        let policy = UrgencyPolicy::default();
        let now = policy.midnight(date("2024-02-03"));
        let sorted =
            sort_indicators_by_deadline(&groups[&1], &EntrySheet::new(), now, &policy);
        assert_eq!(ids(&sorted), vec![2, 1]);
    }

    #[test]
    fn group_score_overdue_plus_progress_penalty() {
        let policy = UrgencyPolicy::default();
        let weights = UrgencyConfig::default();
        let urgent_group_inds = vec![indicator(1, "A", 100.0, monthly())];
        let calm_group_inds = vec![indicator(2, "B", 100.0, quarterly())];
        let periods = vec![
            period(1, "2024-01-01", "2024-01-31", 1),
            period(2, "2024-01-01", "2024-06-30", 2),
        ];
        let mut inds = calm_group_inds;
        inds.extend(urgent_group_inds);
        let entries = sheet(&[(1, 1, "50")]);

        let groups = group_by_frequency(&inds, &periods);
        let now = policy.midnight(date("2024-01-31")) + Duration::days(3);

        let urgent_score = group_urgency_score(&groups[&1], &entries, now, &policy, &weights);
        assert_eq!(urgent_score, 112.5);
        let calm_score = group_urgency_score(&groups[&2], &entries, now, &policy, &weights);
        assert_eq!(calm_score, 0.0);

        let ordered = sort_frequency_groups_by_urgency(&groups, &entries, now, &policy, &weights);
        let order: Vec<u32> = ordered.iter().map(|(_, g)| g.frequency.frequency_id).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn due_soon_scores_half_of_overdue() {
        let policy = UrgencyPolicy::default();
        let weights = UrgencyConfig::default();
        let inds = vec![indicator(1, "A", 0.0, monthly())];
        let periods = vec![period(1, "2024-01-01", "2024-01-31", 1)];
        let groups = group_by_frequency(&inds, &periods);
        let now = policy.midnight(date("2024-01-28"));
        // target 0 divides by 1; blank cell keeps it incomplete, so full penalty
        let score = group_urgency_score(&groups[&1], &EntrySheet::new(), now, &policy, &weights);
        assert_eq!(score, 75.0);
    }

    #[test]
    fn completed_indicators_add_no_penalty() {
        let policy = UrgencyPolicy::default();
        let weights = UrgencyConfig::default();
        let inds = vec![
            indicator(1, "done", 10.0, monthly()),
            indicator(2, "zero-target", 0.0, monthly()),
        ];
        let entries = sheet(&[(1, 1, "2"), (1, 2, "8"), (2, 1, "0"), (2, 2, "0")]);
        let groups = group_by_frequency(&inds, &two_months());
        // Jan overdue, Feb normal
        let now = policy.midnight(date("2024-02-03"));
        let score = group_urgency_score(&groups[&1], &entries, now, &policy, &weights);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn equal_scores_keep_incoming_order() {
        let policy = UrgencyPolicy::default();
        let weights = UrgencyConfig::default();
        let inds = vec![
            indicator(1, "A", 1.0, quarterly()),
            indicator(2, "B", 1.0, monthly()),
        ];
        let groups = group_by_frequency(&inds, &[]);
        let now = policy.midnight(date("2024-01-01"));
        let ordered =
            sort_frequency_groups_by_urgency(&groups, &EntrySheet::new(), now, &policy, &weights);
        let order: Vec<u32> = ordered.iter().map(|(_, g)| g.frequency.frequency_id).collect();
        assert_eq!(order, vec![2, 1]);
    }
}
