use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::model::{CutoffRecord, FacetField};

/// The sentinel meaning "no constraint on this field".
pub const ALL: &str = "All";

/// Placeholder spellings that never make it into a dropdown.
const PLACEHOLDERS: [&str; 4] = ["nan", "null", "none", "not specified"];

// ---------------------------------------------------------------------------
// FacetSet – distinct values per filterable column
// ---------------------------------------------------------------------------

/// For each facet column the sorted distinct values, prefixed with [`ALL`].
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct FacetSet {
    values: BTreeMap<FacetField, Vec<String>>,
}

impl FacetSet {
    /// Run [`build_facets`] for every facet column.
    pub fn build(records: &[CutoffRecord]) -> Self {
        let values = FacetField::ALL
            .iter()
            .map(|&field| (field, build_facets(records, field)))
            .collect();
        FacetSet { values }
    }

    /// Dropdown values for one column, sentinel first.
    pub fn get(&self, field: FacetField) -> &[String] {
        self.values.get(&field).map(Vec::as_slice).unwrap_or_default()
    }
}

impl Default for FacetSet {
    fn default() -> Self {
        FacetSet::build(&[])
    }
}

/// Distinct observed values of `field`, sorted, with [`ALL`] prepended.
///
/// Blank values, null-like placeholders and "Not Specified" are skipped, as is
/// any spelling of "All" so the sentinel appears exactly once.
pub fn build_facets(records: &[CutoffRecord], field: FacetField) -> Vec<String> {
    let distinct: BTreeSet<&str> = records
        .iter()
        .filter_map(|rec| field.value_of(rec))
        .map(str::trim)
        .filter(|v| is_selectable(v))
        .collect();

    std::iter::once(ALL.to_string())
        .chain(distinct.into_iter().map(str::to_string))
        .collect()
}

fn is_selectable(value: &str) -> bool {
    if value.is_empty() || is_sentinel(value) {
        return false;
    }
    let lowered = value.to_ascii_lowercase();
    !PLACEHOLDERS.contains(&lowered.as_str())
}

/// Whether a user-supplied filter value is the "no constraint" sentinel.
pub fn is_sentinel(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case(ALL)
}
