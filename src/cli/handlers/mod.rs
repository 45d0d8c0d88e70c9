mod init;
pub use init::cmd_init;

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

/// Global override for the dataset directory (set by -C flag)
static DATA_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::dataset_io::{self, DatasetError};
use crate::io::recovery;
use crate::model::config::ViewMode;
use crate::model::dataset::Dataset;
use crate::model::period::PeriodDraft;
use crate::ops::completion::{progress, relevant_periods};
use crate::ops::entry_ops::{EntryInput, enter_values};
use crate::ops::grouping::top_level_indicators;
use crate::ops::overlap::{describe, find_overlap, validate_range};
use crate::ops::period_ops::{add_period, generate_periods, update_period};
use crate::ops::urgency::UrgencyPolicy;
use crate::ops::view::{build_view, period_view};
use crate::ops::{check, search};

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.json;

    // Store -C override for load_dataset_cwd()
    if let Some(ref dir) = cli.data_dir {
        let abs = std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?;
        DATA_DIR_OVERRIDE
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(abs);
    }
    let today = cli.today.as_deref().map(parse_date).transpose()?;

    match cli.command {
        Commands::Init(args) => cmd_init(args, start_dir()?),

        // Read commands
        Commands::Indicators(args) => cmd_indicators(args, json),
        Commands::Periods(args) => cmd_periods(args, today, json),
        Commands::Table(args) => cmd_table(args, today, json),
        Commands::Triage(args) => cmd_triage(args, today, json),
        Commands::Status(args) => cmd_status(args, today, json),
        Commands::CheckPeriods(args) => cmd_check_periods(args, json),
        Commands::SuggestPeriods(args) => cmd_suggest_periods(args, json),
        Commands::Check => cmd_check(json),

        // Write commands
        Commands::Enter(args) => cmd_enter(args, json),
        Commands::AddPeriod(args) => cmd_add_period(args, json),
        Commands::EditPeriod(args) => cmd_edit_period(args, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn start_dir() -> Result<PathBuf, std::io::Error> {
    match DATA_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .as_ref()
    {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir(),
    }
}

fn load_dataset_cwd() -> Result<Dataset, DatasetError> {
    let start = start_dir().map_err(|e| DatasetError::ReadError {
        path: PathBuf::from("."),
        source: e,
    })?;
    let root = dataset_io::discover_dataset(&start)?;
    dataset_io::load_dataset(&root)
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}': expected YYYY-MM-DD", s))
}

/// Reference instant for urgency: midnight of `--today` in the dataset's
/// offset, or the current time
fn reference_now(today: Option<NaiveDate>, policy: &UrgencyPolicy) -> DateTime<Utc> {
    match today {
        Some(date) => policy.midnight(date),
        None => Utc::now(),
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_indicators(args: IndicatorsArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = load_dataset_cwd()?;
    let in_category = dataset.indicators_in_category(args.category);
    let mut shown = top_level_indicators(&in_category);

    let mut hits = Vec::new();
    if let Some(ref pattern) = args.search {
        let re = Regex::new(pattern)?;
        hits = search::search_indicators(&dataset, &re, args.category);
        let ids = search::matched_indicator_ids(&hits);
        shown.retain(|ind| ids.contains(&ind.id));
    }

    if json {
        return print_json(&shown);
    }
    if shown.is_empty() {
        println!("no indicators");
        return Ok(());
    }
    if let Some(category) = args.category.and_then(|id| dataset.find_category(id)) {
        println!("{}:", category.name);
    }
    for ind in shown {
        for line in format_indicator_tree(ind) {
            println!("{}", line);
        }
        for hit in hits.iter().filter(|h| h.indicator_id == ind.id) {
            println!("{}", format_search_hit(hit));
        }
    }
    Ok(())
}

fn cmd_periods(
    args: PeriodsArgs,
    today: Option<NaiveDate>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = load_dataset_cwd()?;
    let policy = UrgencyPolicy::from_config(&dataset.config);
    let now = reference_now(today, &policy);

    let views: Vec<_> = dataset
        .periods
        .iter()
        .filter(|p| args.frequency.is_none_or(|f| p.frequency_id == f))
        .map(|p| period_view(p, now, &policy))
        .collect();

    if json {
        return print_json(&views);
    }
    for fid in views
        .iter()
        .map(|v| v.period.frequency_id)
        .fold(Vec::new(), |mut acc, f| {
            if !acc.contains(&f) {
                acc.push(f);
            }
            acc
        })
    {
        let name = dataset
            .find_frequency(fid)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| format!("frequency {}", fid));
        println!("{}:", name);
        for v in views.iter().filter(|v| v.period.frequency_id == fid) {
            println!("{}", format_period_line(v));
        }
    }
    Ok(())
}

fn cmd_table(
    args: TableArgs,
    today: Option<NaiveDate>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = load_dataset_cwd()?;
    let policy = UrgencyPolicy::from_config(&dataset.config);
    let now = reference_now(today, &policy);
    let mode = if args.deadline {
        ViewMode::Deadline
    } else if args.grouped {
        ViewMode::Default
    } else {
        dataset.config.view.default_mode
    };

    let view = build_view(&dataset, args.category, mode, now);
    if json {
        return print_json(&view);
    }
    if view.is_empty() {
        println!("no indicators");
        return Ok(());
    }
    for (i, group) in view.iter().enumerate() {
        if i > 0 {
            println!();
        }
        for line in format_group_table(group) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_triage(
    args: TriageArgs,
    today: Option<NaiveDate>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = load_dataset_cwd()?;
    let policy = UrgencyPolicy::from_config(&dataset.config);
    let now = reference_now(today, &policy);
    let view = build_view(&dataset, args.category, ViewMode::Deadline, now);

    if json {
        let groups: Vec<TriageGroupJson> = view
            .iter()
            .map(|g| TriageGroupJson {
                frequency: &g.frequency,
                score: g.score.unwrap_or(0.0),
                urgent_periods: g.periods.iter().filter(|p| p.urgency.is_urgent()).collect(),
                indicators: g
                    .rows
                    .iter()
                    .filter(|r| !r.progress.completed)
                    .take(args.limit)
                    .map(|r| r.id)
                    .collect(),
            })
            .collect();
        return print_json(&groups);
    }
    if view.is_empty() {
        println!("no indicators");
        return Ok(());
    }
    for (i, group) in view.iter().enumerate() {
        if i > 0 {
            println!();
        }
        for line in format_triage_group(group, args.limit) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_status(
    args: StatusArgs,
    today: Option<NaiveDate>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = load_dataset_cwd()?;
    let indicator = dataset
        .find_indicator(args.id)
        .ok_or_else(|| format!("indicator not found: {}", args.id))?;
    let policy = UrgencyPolicy::from_config(&dataset.config);
    let now = reference_now(today, &policy);

    let status = StatusJson {
        indicator,
        progress: progress(indicator, &dataset.periods, &dataset.entries),
        periods: relevant_periods(indicator, &dataset.periods)
            .into_iter()
            .map(|p| period_view(p, now, &policy))
            .collect(),
    };
    if json {
        return print_json(&status);
    }
    for line in format_status(&status) {
        println!("{}", line);
    }
    Ok(())
}

fn parse_draft(index: usize, s: &str) -> Result<PeriodDraft, String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid draft '{}': expected START:END", s))?;
    Ok(PeriodDraft::new(
        format!("draft {}", index + 1),
        parse_date(start)?,
        parse_date(end)?,
    ))
}

fn cmd_check_periods(args: CheckPeriodsArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut ranges: Vec<PeriodDraft> = Vec::new();
    if let Some(fid) = args.frequency {
        let dataset = load_dataset_cwd()?;
        ranges.extend(
            dataset
                .periods_for_frequency(fid)
                .into_iter()
                .map(PeriodDraft::from),
        );
    }
    for (i, raw) in args.draft.iter().enumerate() {
        let draft = parse_draft(i, raw)?;
        validate_range(draft.start_date, draft.end_date)
            .map_err(|e| format!("{}: {}", draft.name, e))?;
        ranges.push(draft);
    }
    if ranges.is_empty() {
        return Err("nothing to check: give --frequency or --draft".into());
    }

    let overlap = find_overlap(&ranges);
    if json {
        print_json(&overlap_to_json(&ranges, overlap))?;
    } else if overlap.is_none() {
        println!("✓ {} periods, no overlaps", ranges.len());
    }
    match overlap {
        Some(o) => Err(format!(
            "{} overlaps {}",
            describe(&ranges[o.first]),
            describe(&ranges[o.second])
        )
        .into()),
        None => Ok(()),
    }
}

fn cmd_suggest_periods(args: SuggestPeriodsArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut dataset = load_dataset_cwd()?;
    let frequency = dataset
        .find_frequency(args.frequency)
        .cloned()
        .ok_or_else(|| format!("frequency not found: {}", args.frequency))?;
    let drafts = generate_periods(&frequency, args.year)?;

    let mut added = Vec::new();
    if args.apply {
        for draft in &drafts {
            added.push(add_period(&mut dataset, frequency.frequency_id, draft.clone())?);
        }
        dataset_io::save_periods(&dataset)?;
    }

    if json {
        return print_json(&drafts);
    }
    for draft in &drafts {
        println!("{}", describe(draft));
    }
    if args.apply {
        println!("added {} periods to {}", added.len(), frequency.name);
    }
    Ok(())
}

fn cmd_check(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = load_dataset_cwd()?;
    let result = check::check_dataset(&dataset);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        if !result.errors.is_empty() {
            println!("Errors:");
            for err in &result.errors {
                match err {
                    check::CheckError::InvalidRange {
                        period_id,
                        name,
                        start_date,
                        end_date,
                    } => {
                        println!(
                            "  period {} ({}) ends on or before it starts: {} to {}",
                            period_id, name, start_date, end_date
                        );
                    }
                    check::CheckError::Overlap {
                        frequency_id,
                        first_period_id,
                        second_period_id,
                    } => {
                        println!(
                            "  [frequency {}] period {} overlaps period {}",
                            frequency_id, first_period_id, second_period_id
                        );
                    }
                    check::CheckError::DuplicatePeriodId { period_id } => {
                        println!("  period ID {} is used more than once", period_id);
                    }
                    check::CheckError::DanglingPeriod {
                        indicator_id,
                        period_id,
                    } => {
                        println!(
                            "  entry {}:{} points at unknown period {}",
                            indicator_id, period_id, period_id
                        );
                    }
                }
            }
        }
        if !result.warnings.is_empty() {
            if !result.errors.is_empty() {
                println!();
            }
            println!("Warnings:");
            for warn in &result.warnings {
                match warn {
                    check::CheckWarning::FrequencyWithoutPeriods { frequency_id, name } => {
                        println!("  [frequency {}] {} has no periods", frequency_id, name);
                    }
                    check::CheckWarning::NestedListedTopLevel {
                        indicator_id,
                        parent_id,
                    } => {
                        println!(
                            "  indicator {} is also a sub-indicator of {}",
                            indicator_id, parent_id
                        );
                    }
                    check::CheckWarning::OrphanEntry {
                        indicator_id,
                        period_id,
                    } => {
                        println!(
                            "  entry {}:{} belongs to unknown indicator {}",
                            indicator_id, period_id, indicator_id
                        );
                    }
                    check::CheckWarning::ForeignPeriodEntry {
                        indicator_id,
                        period_id,
                    } => {
                        println!(
                            "  entry {}:{} uses a period of another frequency",
                            indicator_id, period_id
                        );
                    }
                }
            }
        }
        if result.valid {
            println!("✓ dataset is valid");
        } else {
            println!("✗ dataset has errors");
        }
        let pending = recovery::recovery_entry_count(&dataset.data_dir);
        if pending > 0 {
            println!(
                "note: {} unsaved write(s) kept in {}",
                pending,
                recovery::recovery_log_path(&dataset.data_dir).display()
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

fn cmd_enter(args: EnterArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let inputs = args
        .entries
        .iter()
        .map(|s| EntryInput::parse(s))
        .collect::<Result<Vec<_>, _>>()?;

    let mut dataset = load_dataset_cwd()?;
    let changed = enter_values(&mut dataset, &inputs)?;
    let saved = dataset_io::save_entries(&mut dataset)?;

    if json {
        return print_json(&EnterJson {
            saved: saved.len(),
            changed: changed.len(),
        });
    }
    println!("saved {} entries ({} changed)", saved.len(), changed.len());
    Ok(())
}

fn cmd_add_period(args: AddPeriodArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let draft = PeriodDraft::new(args.name, parse_date(&args.start)?, parse_date(&args.end)?);
    let mut dataset = load_dataset_cwd()?;
    let period_id = add_period(&mut dataset, args.frequency, draft)?;
    dataset_io::save_periods(&dataset)?;

    let period = dataset
        .find_period(period_id)
        .ok_or_else(|| format!("period not found: {}", period_id))?;
    if json {
        return print_json(period);
    }
    println!("added period {}: {}", period_id, describe(&PeriodDraft::from(period)));
    Ok(())
}

fn cmd_edit_period(args: EditPeriodArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut dataset = load_dataset_cwd()?;
    let current = dataset
        .find_period(args.id)
        .ok_or_else(|| format!("period not found: {}", args.id))?;
    let name = args.name.unwrap_or_else(|| current.name.clone());
    let draft = PeriodDraft::new(name, parse_date(&args.start)?, parse_date(&args.end)?);

    update_period(&mut dataset, args.id, draft)?;
    dataset_io::save_periods(&dataset)?;

    let period = dataset
        .find_period(args.id)
        .ok_or_else(|| format!("period not found: {}", args.id))?;
    if json {
        return print_json(period);
    }
    println!("updated period {}: {}", args.id, describe(&PeriodDraft::from(period)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso_only() {
        assert_eq!(
            parse_date("2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(parse_date("29/02/2024").is_err());
        assert!(parse_date("2023-02-29").is_err());
    }

    #[test]
    fn parse_draft_names_by_position() {
        let d = parse_draft(1, "2024-01-01:2024-03-31").unwrap();
        assert_eq!(d.name, "draft 2");
        assert_eq!(d.end_date, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        assert!(parse_draft(0, "2024-01-01").is_err());
    }

    #[test]
    fn reference_now_uses_offset_midnight() {
        let policy = UrgencyPolicy::default();
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let now = reference_now(Some(date), &policy);
        assert_eq!(policy.today(now), date);
    }
}
