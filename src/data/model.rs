use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::facets::FacetSet;
use super::filter::QueryError;

// ---------------------------------------------------------------------------
// CutoffRecord – one row of the cutoff table
// ---------------------------------------------------------------------------

/// A single cutoff entry (one row of the source table).
///
/// Field order is also the column order used by the CSV export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoffRecord {
    pub college_code: String,
    pub college_name: String,
    pub branch_code: String,
    pub branch_name: String,
    pub category_code: String,
    pub category: String,
    pub quota_type: String,
    pub allocation_type: String,
    /// Closing rank for this seat.
    pub rank: i64,
    pub percentile: Option<f64>,
    pub city: Option<String>,
}

impl CutoffRecord {
    /// Column names in serialization order.
    pub const COLUMNS: [&'static str; 11] = [
        "college_code",
        "college_name",
        "branch_code",
        "branch_name",
        "category_code",
        "category",
        "quota_type",
        "allocation_type",
        "rank",
        "percentile",
        "city",
    ];
}

// ---------------------------------------------------------------------------
// FacetField – the filterable categorical columns
// ---------------------------------------------------------------------------

/// A categorical column offered as a filter in the search form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetField {
    Category,
    QuotaType,
    BranchName,
    CollegeName,
    City,
}

impl FacetField {
    pub const ALL: [FacetField; 5] = [
        FacetField::Category,
        FacetField::QuotaType,
        FacetField::BranchName,
        FacetField::CollegeName,
        FacetField::City,
    ];

    /// Column name in the source table.
    pub fn column(self) -> &'static str {
        match self {
            FacetField::Category => "category",
            FacetField::QuotaType => "quota_type",
            FacetField::BranchName => "branch_name",
            FacetField::CollegeName => "college_name",
            FacetField::City => "city",
        }
    }

    /// Short request parameter name (`category=`, `quota=`, ...).
    pub fn param(self) -> &'static str {
        match self {
            FacetField::Category => "category",
            FacetField::QuotaType => "quota",
            FacetField::BranchName => "branch",
            FacetField::CollegeName => "college",
            FacetField::City => "city",
        }
    }

    /// Value of this field on a record, `None` when the record has no value.
    pub fn value_of(self, record: &CutoffRecord) -> Option<&str> {
        match self {
            FacetField::Category => Some(&record.category),
            FacetField::QuotaType => Some(&record.quota_type),
            FacetField::BranchName => Some(&record.branch_name),
            FacetField::CollegeName => Some(&record.college_name),
            FacetField::City => record.city.as_deref(),
        }
    }
}

impl fmt::Display for FacetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for FacetField {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "category" => Ok(FacetField::Category),
            "quota" | "quota_type" => Ok(FacetField::QuotaType),
            "branch" | "branch_name" => Ok(FacetField::BranchName),
            "college" | "college_name" => Ok(FacetField::CollegeName),
            "city" => Ok(FacetField::City),
            _ => Err(QueryError::UnknownFacet(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// SortField – any column a result can be ordered by
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Rank,
    Percentile,
    CollegeCode,
    CollegeName,
    BranchCode,
    BranchName,
    CategoryCode,
    Category,
    QuotaType,
    AllocationType,
    City,
}

impl SortField {
    /// Ascending comparison of two records on this field.
    ///
    /// Missing optional values sort after present ones.
    pub fn compare(self, a: &CutoffRecord, b: &CutoffRecord) -> Ordering {
        match self {
            SortField::Rank => a.rank.cmp(&b.rank),
            SortField::Percentile => match (a.percentile, b.percentile) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            SortField::CollegeCode => a.college_code.cmp(&b.college_code),
            SortField::CollegeName => a.college_name.cmp(&b.college_name),
            SortField::BranchCode => a.branch_code.cmp(&b.branch_code),
            SortField::BranchName => a.branch_name.cmp(&b.branch_name),
            SortField::CategoryCode => a.category_code.cmp(&b.category_code),
            SortField::Category => a.category.cmp(&b.category),
            SortField::QuotaType => a.quota_type.cmp(&b.quota_type),
            SortField::AllocationType => a.allocation_type.cmp(&b.allocation_type),
            SortField::City => match (&a.city, &b.city) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        }
    }
}

impl FromStr for SortField {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s.trim().to_ascii_lowercase().as_str() {
            "rank" => SortField::Rank,
            "percentile" => SortField::Percentile,
            "college_code" => SortField::CollegeCode,
            "college_name" | "college" => SortField::CollegeName,
            "branch_code" => SortField::BranchCode,
            "branch_name" | "branch" => SortField::BranchName,
            "category_code" => SortField::CategoryCode,
            "category" => SortField::Category,
            "quota_type" | "quota" => SortField::QuotaType,
            "allocation_type" => SortField::AllocationType,
            "city" => SortField::City,
            _ => return Err(QueryError::UnknownSortField(s.to_string())),
        };
        Ok(field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            _ => Err(QueryError::UnknownSortOrder(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The full parsed cutoff table with pre-computed facet values.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// All records in source order.
    pub records: Vec<CutoffRecord>,
    /// Distinct filter values per facet column.
    pub facets: FacetSet,
}

impl Dataset {
    /// Build facet indices from the loaded records.
    pub fn from_records(records: Vec<CutoffRecord>) -> Self {
        let facets = FacetSet::build(&records);
        Dataset { records, facets }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every seat offered by one college, ordered by closing rank.
    ///
    /// The code is matched after trimming. `None` when no row carries it.
    pub fn college(&self, code: &str) -> Option<CollegeDetail> {
        let code = code.trim();
        let mut rows: Vec<&CutoffRecord> = self
            .records
            .iter()
            .filter(|rec| rec.college_code == code)
            .collect();
        let first = rows.first()?;

        let name = first.college_name.clone();
        let location = rows.iter().find_map(|rec| rec.city.clone());
        rows.sort_by_key(|rec| rec.rank);

        Some(CollegeDetail {
            code: code.to_string(),
            name,
            location,
            seats: rows
                .into_iter()
                .map(|rec| CollegeSeat {
                    branch_code: rec.branch_code.clone(),
                    branch: rec.branch_name.clone(),
                    category: rec.category.clone(),
                    quota_type: rec.quota_type.clone(),
                    allocation_type: rec.allocation_type.clone(),
                    cutoff_rank: rec.rank,
                    percentile: rec.percentile,
                })
                .collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// CollegeDetail – all seats of one college
// ---------------------------------------------------------------------------

/// One branch/category seat of a college with its closing rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollegeSeat {
    pub branch_code: String,
    pub branch: String,
    pub category: String,
    pub quota_type: String,
    pub allocation_type: String,
    pub cutoff_rank: i64,
    pub percentile: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollegeDetail {
    pub code: String,
    pub name: String,
    /// First city recorded for the college, if any.
    pub location: Option<String>,
    pub seats: Vec<CollegeSeat>,
}
