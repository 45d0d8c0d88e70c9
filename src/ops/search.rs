use std::ops::Range;

use regex::Regex;

use crate::model::dataset::Dataset;

/// Which field of an indicator matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Name,
    SubIndicator,
    Unit,
    Responsible,
}

impl MatchField {
    pub fn label(self) -> &'static str {
        match self {
            MatchField::Name => "name",
            MatchField::SubIndicator => "sub-indicator",
            MatchField::Unit => "unit",
            MatchField::Responsible => "responsible",
        }
    }
}

/// A search hit. `indicator_id` is always the top-level indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub indicator_id: u32,
    pub field: MatchField,
    /// The text that matched
    pub text: String,
    pub spans: Vec<Range<usize>>,
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

fn push_hit(hits: &mut Vec<SearchHit>, re: &Regex, indicator_id: u32, field: MatchField, text: &str) {
    let spans = find_matches(re, text);
    if !spans.is_empty() {
        hits.push(SearchHit {
            indicator_id,
            field,
            text: text.to_string(),
            spans,
        });
    }
}

/// Search indicator names, sub-indicator names, units, and responsible job
/// titles. Restrict to one category with `category_id`.
pub fn search_indicators(dataset: &Dataset, re: &Regex, category_id: Option<u32>) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for ind in &dataset.indicators {
        if category_id.is_some() && ind.category_id != category_id {
            continue;
        }
        push_hit(&mut hits, re, ind.id, MatchField::Name, &ind.name);
        for s in ind.sorted_sub_indicators() {
            push_hit(&mut hits, re, ind.id, MatchField::SubIndicator, &s.name);
        }
        push_hit(&mut hits, re, ind.id, MatchField::Unit, &ind.unit.name);
        for jt in &ind.responsible {
            push_hit(&mut hits, re, ind.id, MatchField::Responsible, &jt.name);
        }
    }
    hits
}

/// Distinct indicator IDs among the hits, in hit order
pub fn matched_indicator_ids(hits: &[SearchHit]) -> Vec<u32> {
    let mut ids = Vec::new();
    for h in hits {
        if !ids.contains(&h.indicator_id) {
            ids.push(h.indicator_id);
        }
    }
    ids
}
