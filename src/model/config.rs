use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Configuration from kpi.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiConfig {
    pub organization: OrganizationInfo,
    #[serde(default)]
    pub dates: DateConfig,
    #[serde(default)]
    pub urgency: UrgencyConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationInfo {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateConfig {
    /// Fixed offset used to place "midnight" for period boundaries.
    /// Default: 7 (Asia/Bangkok)
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for DateConfig {
    fn default() -> Self {
        DateConfig {
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

impl DateConfig {
    /// The configured offset, falling back to UTC when out of range
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }
}

fn default_utc_offset_hours() -> i32 {
    7
}

/// Thresholds and weights for deadline triage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrgencyConfig {
    /// Periods ending within this many days (inclusive) are due soon
    #[serde(default = "default_due_soon_days")]
    pub due_soon_days: i64,
    #[serde(default = "default_overdue_points")]
    pub overdue_points: f64,
    #[serde(default = "default_due_soon_points")]
    pub due_soon_points: f64,
    /// Maximum penalty per indicator with no progress under deadline pressure
    #[serde(default = "default_progress_penalty")]
    pub progress_penalty: f64,
}

impl Default for UrgencyConfig {
    fn default() -> Self {
        UrgencyConfig {
            due_soon_days: default_due_soon_days(),
            overdue_points: default_overdue_points(),
            due_soon_points: default_due_soon_points(),
            progress_penalty: default_progress_penalty(),
        }
    }
}

fn default_due_soon_days() -> i64 {
    7
}

fn default_overdue_points() -> f64 {
    100.0
}

fn default_due_soon_points() -> f64 {
    50.0
}

fn default_progress_penalty() -> f64 {
    25.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Frequency-grouped, incomplete first
    #[default]
    Default,
    /// Least progress under deadline pressure first
    Deadline,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub default_mode: ViewMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: KpiConfig = toml::from_str("[organization]\nname = \"Clinic\"\n").unwrap();
        assert_eq!(config.organization.name, "Clinic");
        assert_eq!(config.dates.utc_offset_hours, 7);
        assert_eq!(config.urgency, UrgencyConfig::default());
        assert_eq!(config.view.default_mode, ViewMode::Default);
    }

    #[test]
    fn partial_urgency_section_keeps_other_defaults() {
        let config: KpiConfig = toml::from_str(
            "[organization]\nname = \"x\"\n\n[urgency]\ndue_soon_days = 3\n\n[view]\ndefault_mode = \"deadline\"\n",
        )
        .unwrap();
        assert_eq!(config.urgency.due_soon_days, 3);
        assert_eq!(config.urgency.overdue_points, 100.0);
        assert_eq!(config.view.default_mode, ViewMode::Deadline);
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        let dates = DateConfig {
            utc_offset_hours: 40,
        };
        assert_eq!(dates.offset().local_minus_utc(), 0);
        assert_eq!(DateConfig::default().offset().local_minus_utc(), 7 * 3600);
    }
}
