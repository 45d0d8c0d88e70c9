use std::ops::Range;

use serde::Serialize;

use crate::model::entry::format_number;
use crate::model::indicator::{Frequency, Indicator};
use crate::model::period::PeriodDraft;
use crate::ops::completion::Progress;
use crate::ops::overlap::Overlap;
use crate::ops::search::SearchHit;
use crate::ops::urgency::Urgency;
use crate::ops::view::{GroupView, PeriodView};
use crate::util::unicode::{pad_left, pad_right};

/// Width of the indicator-name column in tables
const NAME_WIDTH: usize = 28;
/// Minimum width of a period value column
const VALUE_WIDTH: usize = 9;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct StatusJson<'a> {
    pub indicator: &'a Indicator,
    pub progress: Progress,
    pub periods: Vec<PeriodView>,
}

#[derive(Serialize)]
pub struct OverlapJson {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<PeriodDraft>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second: Option<PeriodDraft>,
}

#[derive(Serialize)]
pub struct EnterJson {
    pub saved: usize,
    pub changed: usize,
}

#[derive(Serialize)]
pub struct TriageGroupJson<'a> {
    pub frequency: &'a Frequency,
    pub score: f64,
    pub urgent_periods: Vec<&'a PeriodView>,
    pub indicators: Vec<u32>,
}

pub fn overlap_to_json(ranges: &[PeriodDraft], overlap: Option<Overlap>) -> OverlapJson {
    OverlapJson {
        valid: overlap.is_none(),
        first: overlap.map(|o| ranges[o.first].clone()),
        second: overlap.map(|o| ranges[o.second].clone()),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// Trim trailing spaces left by column padding
fn finish(line: String) -> String {
    line.trim_end().to_string()
}

fn check_char(completed: bool) -> char {
    if completed { 'x' } else { ' ' }
}

/// Short urgency marker for table headers
fn urgency_mark(u: Urgency) -> &'static str {
    match u {
        Urgency::Overdue => "overdue",
        Urgency::DueSoon => "due soon",
        Urgency::Normal => "",
    }
}

/// "3 days late", "due today", "5 days left"
pub fn format_days(days: i64) -> String {
    match days {
        d if d < -1 => format!("{} days late", -d),
        -1 => "1 day late".to_string(),
        0 => "due today".to_string(),
        1 => "1 day left".to_string(),
        d => format!("{} days left", d),
    }
}

/// Format an indicator as a one-line summary
pub fn format_indicator_line(ind: &Indicator) -> String {
    format!(
        "{:>4}  {}  target {} {}  [{}]",
        ind.id,
        ind.name,
        format_number(ind.target_value),
        ind.unit.name,
        ind.frequency.name
    )
}

/// Format an indicator with its sub-indicators beneath it
pub fn format_indicator_tree(ind: &Indicator) -> Vec<String> {
    let mut lines = vec![format_indicator_line(ind)];
    for s in ind.sorted_sub_indicators() {
        lines.push(format!("{:>4}    - {}", s.id, s.name));
    }
    lines
}

/// Wrap each matched span of a search hit in brackets
pub fn mark_spans(text: &str, spans: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len() + spans.len() * 2);
    let mut pos = 0;
    for span in spans {
        out.push_str(&text[pos..span.start]);
        out.push('[');
        out.push_str(&text[span.clone()]);
        out.push(']');
        pos = span.end;
    }
    out.push_str(&text[pos..]);
    out
}

/// `    ~ sub-indicator: I[CU] beds`
pub fn format_search_hit(hit: &SearchHit) -> String {
    format!("    ~ {}: {}", hit.field.label(), mark_spans(&hit.text, &hit.spans))
}

pub fn format_period_line(p: &PeriodView) -> String {
    let mark = match p.urgency {
        Urgency::Normal => String::new(),
        u => format!("  {}, {}", u.label(), format_days(p.days_remaining)),
    };
    format!(
        "{:>4}  {}  {} to {}{}",
        p.period.period_id,
        pad_right(&p.period.name, 16),
        p.period.start_date,
        p.period.end_date,
        mark
    )
}

fn column_width(p: &PeriodView) -> usize {
    crate::util::unicode::display_width(&p.period.name).max(VALUE_WIDTH)
}

fn format_total(progress: &Progress, unit: &str) -> String {
    format!(
        "{} / {} {}",
        format_number(progress.total),
        format_number(progress.target),
        unit
    )
}

/// Render one frequency group as a text table
pub fn format_group_table(group: &GroupView) -> Vec<String> {
    let mut lines = Vec::new();
    let header = match group.score {
        Some(score) => format!("== {} (score {}) ==", group.frequency.name, format_number(score)),
        None => format!("== {} ==", group.frequency.name),
    };
    lines.push(header);

    if group.periods.is_empty() {
        lines.push("  (no periods)".to_string());
    }

    let widths: Vec<usize> = group.periods.iter().map(column_width).collect();
    let lead = " ".repeat(4 + NAME_WIDTH);

    if !group.periods.is_empty() {
        let mut names = lead.clone();
        let mut marks = lead.clone();
        for (p, w) in group.periods.iter().zip(&widths) {
            names.push_str(&format!(" {}", pad_left(&p.period.name, *w)));
            marks.push_str(&format!(" {}", pad_left(urgency_mark(p.urgency), *w)));
        }
        names.push_str("  total");
        lines.push(finish(names));
        if group.periods.iter().any(|p| p.urgency.is_urgent()) {
            lines.push(finish(marks));
        }
    }

    for row in &group.rows {
        let mut line = format!(
            "[{}] {}",
            check_char(row.progress.completed),
            pad_right(&format!("{} {}", row.id, row.name), NAME_WIDTH)
        );
        for (v, w) in row.values.iter().zip(&widths) {
            line.push_str(&format!(" {}", pad_left(v, *w)));
        }
        line.push_str(&format!("  {}", format_total(&row.progress, &row.unit)));
        lines.push(finish(line));

        for sub in &row.sub_rows {
            let mut line = format!(
                "    {}",
                pad_right(&format!("  {} {}", sub.id, sub.name), NAME_WIDTH)
            );
            for (v, w) in sub.values.iter().zip(&widths) {
                line.push_str(&format!(" {}", pad_left(v, *w)));
            }
            lines.push(finish(line));
        }
    }
    lines
}

/// Render the triage summary for one group
pub fn format_triage_group(group: &GroupView, limit: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "{}  score {}",
        group.frequency.name,
        format_number(group.score.unwrap_or(0.0))
    )];
    let urgent: Vec<&PeriodView> = group
        .periods
        .iter()
        .filter(|p| p.urgency.is_urgent())
        .collect();
    if urgent.is_empty() {
        lines.push("  nothing due".to_string());
    }
    for p in &urgent {
        lines.push(format!(
            "  {}: {} ({})",
            p.urgency.label(),
            p.period.name,
            format_days(p.days_remaining)
        ));
    }
    for row in group.rows.iter().filter(|r| !r.progress.completed).take(limit) {
        lines.push(format!(
            "  [ ] {} {}  {}",
            row.id,
            row.name,
            format_total(&row.progress, &row.unit)
        ));
    }
    lines
}

pub fn format_status(status: &StatusJson<'_>) -> Vec<String> {
    let ind = status.indicator;
    let p = &status.progress;
    let mut lines = vec![format!("{} {} [{}]", ind.id, ind.name, ind.frequency.name)];
    lines.push(format!("  total:     {}", format_total(p, &ind.unit.name)));
    if let Some(ratio) = p.ratio() {
        lines.push(format!("  progress:  {}%", format_number((ratio * 100.0).round())));
    }
    lines.push(format!("  filled:    {}/{} cells", p.filled, p.required));
    lines.push(format!(
        "  completed: {}",
        if p.completed { "yes" } else { "no" }
    ));
    for period in &status.periods {
        if period.urgency.is_urgent() {
            lines.push(format!(
                "  {}: {} ({})",
                period.urgency.label(),
                period.period.name,
                format_days(period.days_remaining)
            ));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::ViewMode;
    use crate::ops::completion::fixtures::*;
    use crate::ops::urgency::UrgencyPolicy;
    use crate::ops::view::build_view;
    use insta::assert_snapshot;

    #[test]
    fn search_hit_brackets_matches() {
        let hit = SearchHit {
            indicator_id: 1,
            field: crate::ops::search::MatchField::SubIndicator,
            text: "ICU beds".into(),
            spans: vec![1..3, 5..7],
        };
        assert_eq!(format_search_hit(&hit), "    ~ sub-indicator: I[CU] [be]ds");
        assert_eq!(mark_spans("Ward", &[]), "Ward");
    }

    #[test]
    fn format_days_wording() {
        assert_eq!(format_days(-3), "3 days late");
        assert_eq!(format_days(-1), "1 day late");
        assert_eq!(format_days(0), "due today");
        assert_eq!(format_days(1), "1 day left");
        assert_eq!(format_days(12), "12 days left");
    }

    #[test]
    fn indicator_tree_lists_subs_in_position_order() {
        let mut ind = indicator(1, "Revenue", 1500.0, monthly());
        ind.sub_indicators = vec![sub(12, "Clinic", 2), sub(11, "Ward", 1)];
        assert_eq!(
            format_indicator_tree(&ind),
            vec![
                "   1  Revenue  target 1500 cases  [Monthly]",
                "  11    - Ward",
                "  12    - Clinic",
            ]
        );
    }

    #[test]
    fn group_table_rendering() {
        let mut visits = indicator(1, "Visits", 100.0, monthly());
        visits.sub_indicators = vec![sub(4, "Ward", 1)];
        let mut ds = test_dataset(
            vec![visits, indicator(3, "Complaints", 0.0, monthly())],
            two_months(),
        );
        ds.entries = sheet(&[(3, 1, "0"), (3, 2, "0"), (1, 1, "30"), (4, 1, "5")]);
        let now = UrgencyPolicy::default().midnight(date("2024-02-25"));
        let view = build_view(&ds, None, ViewMode::Default, now);

        let text = format_group_table(&view[0]).join("\n");
        assert_snapshot!(text, @r"
        == Monthly ==
                                                P1        P2  total
                                           overdue  due soon
        [ ] 1 Visits                            30            35 / 100 cases
              4 Ward                             5
        [x] 3 Complaints                         0         0  0 / 0 cases
        ");
    }

    #[test]
    fn triage_group_rendering() {
        let mut ds = test_dataset(vec![indicator(1, "Visits", 100.0, monthly())], two_months());
        ds.entries = sheet(&[(1, 1, "50")]);
        let now = UrgencyPolicy::default().midnight(date("2024-02-03"));
        let view = build_view(&ds, None, ViewMode::Deadline, now);
        assert_eq!(
            format_triage_group(&view[0], 5),
            vec![
                "Monthly  score 112.5",
                "  overdue: P1 (3 days late)",
                "  [ ] 1 Visits  50 / 100 cases",
            ]
        );
    }
}
