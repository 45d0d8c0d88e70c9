use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kpi", about = concat!("kpi v", env!("CARGO_PKG_VERSION"), " - indicator data entry and deadline triage"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different dataset directory
    #[arg(short = 'C', long = "data-dir", global = true)]
    pub data_dir: Option<String>,

    /// Reference date for urgency (YYYY-MM-DD, default: now)
    #[arg(long, global = true)]
    pub today: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new kpi dataset in the current directory
    Init(InitArgs),
    /// List indicators
    Indicators(IndicatorsArgs),
    /// List periods with their urgency
    Periods(PeriodsArgs),
    /// Show the data-entry table grouped by frequency
    Table(TableArgs),
    /// Show frequency groups ordered by deadline pressure
    Triage(TriageArgs),
    /// Show total and completion for one indicator
    Status(StatusArgs),
    /// Enter values: IND:PERIOD=VALUE (repeatable, saved as one batch)
    Enter(EnterArgs),
    /// Add a period to a frequency
    AddPeriod(AddPeriodArgs),
    /// Change a period's dates or name
    EditPeriod(EditPeriodArgs),
    /// Check a frequency's periods (and optional drafts) for overlaps
    CheckPeriods(CheckPeriodsArgs),
    /// Suggest a year of periods for a frequency
    SuggestPeriods(SuggestPeriodsArgs),
    /// Validate dataset integrity
    Check,
}

#[derive(Args)]
pub struct InitArgs {
    /// Organization name (default: inferred from directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Reinitialize even if kpi/ already exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct IndicatorsArgs {
    /// Only indicators in this category
    #[arg(long)]
    pub category: Option<u32>,
    /// Regex matched against names, sub-indicators, units and job titles
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Args)]
pub struct PeriodsArgs {
    /// Only periods of this frequency
    #[arg(long)]
    pub frequency: Option<u32>,
}

#[derive(Args)]
pub struct TableArgs {
    /// Only indicators in this category
    #[arg(long)]
    pub category: Option<u32>,
    /// Order by deadline pressure instead of the configured default
    #[arg(long, conflicts_with = "grouped")]
    pub deadline: bool,
    /// Order by completion, grouped by frequency
    #[arg(long)]
    pub grouped: bool,
}

#[derive(Args)]
pub struct TriageArgs {
    /// Only indicators in this category
    #[arg(long)]
    pub category: Option<u32>,
    /// Maximum indicators listed per group
    #[arg(long, default_value = "5")]
    pub limit: usize,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Indicator ID
    pub id: u32,
}

#[derive(Args)]
pub struct EnterArgs {
    /// Cells to set, e.g. 12:3=40.5 (empty value clears)
    #[arg(required = true, num_args = 1..)]
    pub entries: Vec<String>,
}

#[derive(Args)]
pub struct AddPeriodArgs {
    /// Frequency ID
    pub frequency: u32,
    /// Period name
    pub name: String,
    /// Start date (YYYY-MM-DD)
    pub start: String,
    /// End date (YYYY-MM-DD)
    pub end: String,
}

#[derive(Args)]
pub struct EditPeriodArgs {
    /// Period ID
    pub id: u32,
    /// New start date (YYYY-MM-DD)
    pub start: String,
    /// New end date (YYYY-MM-DD)
    pub end: String,
    /// New name
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct CheckPeriodsArgs {
    /// Include the stored periods of this frequency
    #[arg(long)]
    pub frequency: Option<u32>,
    /// Extra range to check: START:END (repeatable)
    #[arg(long)]
    pub draft: Vec<String>,
}

#[derive(Args)]
pub struct SuggestPeriodsArgs {
    /// Frequency ID
    pub frequency: u32,
    /// Calendar year
    pub year: i32,
    /// Add the suggested periods to the dataset
    #[arg(long)]
    pub apply: bool,
}
