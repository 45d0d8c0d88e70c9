use serde::{Deserialize, Serialize};

/// Unit of measure shown next to a target (e.g. "%", "baht", "cases")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: u32,
    pub name: String,
}

/// A named measurement cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frequency {
    pub frequency_id: u32,
    pub name: String,
    /// Number of periods in a calendar year (12 = monthly, 4 = quarterly, ...)
    #[serde(default)]
    pub periods_in_year: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTitle {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u32,
    pub name: String,
}

/// A child KPI whose values roll up into its parent's total.
///
/// Measured on the parent's frequency, so it carries no frequency of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubIndicator {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub target_value: f64,
    #[serde(default)]
    pub unit: Option<Unit>,
    /// Display order under the parent
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub responsible: Vec<JobTitle>,
}

/// A KPI tracked against a numeric target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub id: u32,
    pub name: String,
    /// Missing targets deserialize as 0, which counts as already met
    #[serde(default)]
    pub target_value: f64,
    pub unit: Unit,
    pub frequency: Frequency,
    #[serde(default)]
    pub responsible: Vec<JobTitle>,
    #[serde(default)]
    pub sub_indicators: Vec<SubIndicator>,
    #[serde(default)]
    pub category_id: Option<u32>,
}

impl Indicator {
    pub fn frequency_id(&self) -> u32 {
        self.frequency.frequency_id
    }

    /// IDs of this indicator and all of its sub-indicators, parent first
    pub fn member_ids(&self) -> impl Iterator<Item = u32> + '_ {
        std::iter::once(self.id).chain(self.sub_indicators.iter().map(|s| s.id))
    }

    /// Sub-indicators in display order
    pub fn sorted_sub_indicators(&self) -> Vec<&SubIndicator> {
        let mut subs: Vec<&SubIndicator> = self.sub_indicators.iter().collect();
        subs.sort_by_key(|s| s.position);
        subs
    }

    /// Whether `id` names this indicator or one of its sub-indicators
    pub fn owns(&self, id: u32) -> bool {
        self.member_ids().any(|m| m == id)
    }
}
