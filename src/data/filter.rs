use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use thiserror::Error;

use super::facets::is_sentinel;
use super::model::{CutoffRecord, Dataset, FacetField, SortField, SortOrder};

/// Default half-width of the rank window.
pub const DEFAULT_RANK_RADIUS: i64 = 1000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A request that cannot be turned into a search. Always recoverable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Please enter a rank")]
    MissingRank,

    #[error("Rank must be a whole number, got '{0}'")]
    InvalidRank(String),

    #[error("Please enter a valid rank (greater than 0)")]
    NonPositiveRank(i64),

    #[error("Rank radius must be a whole number, got '{0}'")]
    InvalidRadius(String),

    #[error("Rank radius cannot be negative ({0})")]
    NegativeRadius(i64),

    #[error("Unknown sort field '{0}'")]
    UnknownSortField(String),

    #[error("Unknown sort order '{0}' (expected asc or desc)")]
    UnknownSortOrder(String),

    #[error("Page must be a whole number of at least 1, got '{0}'")]
    InvalidPage(String),

    #[error("Page size must be a whole number of at least 1, got '{0}'")]
    InvalidPageSize(String),

    #[error("Only one value may be selected for {0}")]
    TooManyValues(FacetField),

    #[error("Unknown filter field '{0}'")]
    UnknownFacet(String),
}

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

/// Membership test over normalized values. A single-value filter is simply a
/// one-element set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueFilter {
    accepted: BTreeSet<String>,
}

impl ValueFilter {
    /// Build a filter from user-supplied values.
    ///
    /// Returns `None` (no constraint) when no usable value is given or when any
    /// value is the "All" sentinel.
    pub fn from_values<I, S>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut accepted = BTreeSet::new();
        for value in values {
            let value = value.as_ref();
            if is_sentinel(value) {
                return None;
            }
            let normalized = normalize(value);
            if !normalized.is_empty() {
                accepted.insert(normalized);
            }
        }
        if accepted.is_empty() {
            None
        } else {
            Some(ValueFilter { accepted })
        }
    }

    /// Equality/membership test. An absent value never matches.
    pub fn matches(&self, value: Option<&str>) -> bool {
        value.is_some_and(|v| self.accepted.contains(&normalize(v)))
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Ordering applied to the matching rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

/// A validated-on-search request against the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub rank: i64,
    pub radius: i64,
    pub filters: BTreeMap<FacetField, ValueFilter>,
    pub sort: SortSpec,
    pub page: Option<PageRequest>,
}

impl SearchQuery {
    /// Rank-only query with the default window and ordering.
    pub fn new(rank: i64) -> Self {
        SearchQuery {
            rank,
            radius: DEFAULT_RANK_RADIUS,
            filters: BTreeMap::new(),
            sort: SortSpec::default(),
            page: None,
        }
    }

    pub fn with_radius(mut self, radius: i64) -> Self {
        self.radius = radius;
        self
    }

    /// Add a filter for `field`; a sentinel or empty list clears it.
    pub fn with_filter<I, S>(mut self, field: FacetField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match ValueFilter::from_values(values) {
            Some(filter) => {
                self.filters.insert(field, filter);
            }
            None => {
                self.filters.remove(&field);
            }
        }
        self
    }

    pub fn with_sort(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort = SortSpec { field, order };
        self
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = Some(PageRequest { page, page_size });
        self
    }

    /// Inclusive rank window `[rank - radius, rank + radius]`.
    pub fn window(&self) -> (i64, i64) {
        (
            self.rank.saturating_sub(self.radius),
            self.rank.saturating_add(self.radius),
        )
    }

    fn validate(&self) -> Result<(), QueryError> {
        if self.rank <= 0 {
            return Err(QueryError::NonPositiveRank(self.rank));
        }
        if self.radius < 0 {
            return Err(QueryError::NegativeRadius(self.radius));
        }
        if let Some(page) = self.page {
            if page.page == 0 {
                return Err(QueryError::InvalidPage(page.page.to_string()));
            }
            if page.page_size == 0 {
                return Err(QueryError::InvalidPageSize(page.page_size.to_string()));
            }
        }
        Ok(())
    }

    /// Whether a record lies in the window and satisfies every filter.
    pub fn admits(&self, record: &CutoffRecord) -> bool {
        let (low, high) = self.window();
        if record.rank < low || record.rank > high {
            return false;
        }
        self.filters
            .iter()
            .all(|(field, filter)| filter.matches(field.value_of(record)))
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Summary over the filtered, unpaginated match set. All zero when empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SearchStats {
    pub total_matches: usize,
    pub rank_min: i64,
    pub rank_max: i64,
    pub unique_colleges: usize,
    pub unique_branches: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub records: Vec<CutoffRecord>,
    pub stats: SearchStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageInfo>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Return indices of records that pass the rank window and all filters, in
/// dataset order.
pub fn filtered_indices(dataset: &Dataset, query: &SearchQuery) -> Vec<usize> {
    dataset
        .records
        .iter()
        .enumerate()
        .filter(|(_, rec)| query.admits(rec))
        .map(|(i, _)| i)
        .collect()
}

/// Stable sort of row indices. Descending compares reversed keys rather than
/// reversing the output, so ties keep their source order either way.
pub fn sort_indices(dataset: &Dataset, indices: &mut [usize], sort: SortSpec) {
    let records = &dataset.records;
    indices.sort_by(|&a, &b| {
        let ord = sort.field.compare(&records[a], &records[b]);
        match sort.order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });
}

fn compute_stats(dataset: &Dataset, indices: &[usize]) -> SearchStats {
    if indices.is_empty() {
        return SearchStats::default();
    }

    let mut rank_min = i64::MAX;
    let mut rank_max = i64::MIN;
    let mut colleges = HashSet::new();
    let mut branches = HashSet::new();
    for &i in indices {
        let rec = &dataset.records[i];
        rank_min = rank_min.min(rec.rank);
        rank_max = rank_max.max(rec.rank);
        colleges.insert(rec.college_name.as_str());
        branches.insert(rec.branch_name.as_str());
    }

    SearchStats {
        total_matches: indices.len(),
        rank_min,
        rank_max,
        unique_colleges: colleges.len(),
        unique_branches: branches.len(),
    }
}

/// Run a query: window + filters, stable sort, stats, then optional paging.
///
/// No match is an empty result, never an error. The dataset is not touched.
pub fn search(dataset: &Dataset, query: &SearchQuery) -> Result<SearchResult, QueryError> {
    query.validate()?;

    let mut indices = filtered_indices(dataset, query);
    sort_indices(dataset, &mut indices, query.sort);
    let stats = compute_stats(dataset, &indices);

    let (selected, page) = match query.page {
        Some(PageRequest { page, page_size }) => {
            let start = (page - 1).saturating_mul(page_size);
            let selected: &[usize] = indices
                .get(start..)
                .map(|rest| &rest[..rest.len().min(page_size)])
                .unwrap_or_default();
            let info = PageInfo {
                page,
                page_size,
                total_pages: indices.len().div_ceil(page_size),
            };
            (selected, Some(info))
        }
        None => (indices.as_slice(), None),
    };

    let records = selected
        .iter()
        .map(|&i| dataset.records[i].clone())
        .collect();

    Ok(SearchResult {
        records,
        stats,
        page,
    })
}
