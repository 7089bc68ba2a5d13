//! Translate loosely typed form / query-string pairs into a [`SearchQuery`].

use std::collections::BTreeSet;

use crate::config::{Config, FilterMode};
use crate::data::facets::is_sentinel;
use crate::data::filter::{PageRequest, QueryError, SearchQuery, SortSpec};
use crate::data::model::FacetField;

/// Build a query from request pairs. Repeated keys are allowed, blank values
/// count as absent and unknown keys are ignored.
pub fn parse_query(pairs: &[(String, String)], config: &Config) -> Result<SearchQuery, QueryError> {
    let rank = match first(pairs, "rank") {
        Some(raw) => parse_int(raw, QueryError::InvalidRank)?,
        None => return Err(QueryError::MissingRank),
    };
    let radius = match first(pairs, "radius") {
        Some(raw) => parse_int(raw, QueryError::InvalidRadius)?,
        None => config.rank_radius,
    };

    let mut query = SearchQuery::new(rank).with_radius(radius);

    for field in FacetField::ALL {
        let values: Vec<&str> = all(pairs, field.param()).collect();
        if config.filter_mode == FilterMode::Single {
            let distinct: BTreeSet<String> = values
                .iter()
                .filter(|v| !is_sentinel(v))
                .map(|v| v.trim().to_lowercase())
                .collect();
            if distinct.len() > 1 {
                return Err(QueryError::TooManyValues(field));
            }
        }
        query = query.with_filter(field, values);
    }

    let mut sort = SortSpec::default();
    if let Some(raw) = first(pairs, "sort_by") {
        sort.field = raw.parse()?;
    }
    if let Some(raw) = first(pairs, "order") {
        sort.order = raw.parse()?;
    }
    query.sort = sort;

    let page = first(pairs, "page")
        .map(|raw| parse_count(raw, QueryError::InvalidPage))
        .transpose()?;
    let page_size = first(pairs, "page_size")
        .map(|raw| parse_count(raw, QueryError::InvalidPageSize))
        .transpose()?;
    query.page = match (page, page_size) {
        (None, None) => None,
        (page, page_size) => Some(PageRequest {
            page: page.unwrap_or(1),
            page_size: page_size.unwrap_or(config.default_page_size),
        }),
    };

    Ok(query)
}

/// Same request with pagination stripped, for full-result exports.
pub fn parse_unpaged(pairs: &[(String, String)], config: &Config) -> Result<SearchQuery, QueryError> {
    let mut query = parse_query(pairs, config)?;
    query.page = None;
    Ok(query)
}

fn all<'a>(pairs: &'a [(String, String)], key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    pairs
        .iter()
        .filter(move |(k, _)| k == key)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

fn first<'a>(pairs: &'a [(String, String)], key: &'a str) -> Option<&'a str> {
    all(pairs, key).next()
}

fn parse_int(raw: &str, err: fn(String) -> QueryError) -> Result<i64, QueryError> {
    raw.parse::<i64>().map_err(|_| err(raw.to_string()))
}

/// Page numbers and sizes: whole numbers of at least 1.
fn parse_count(raw: &str, err: fn(String) -> QueryError) -> Result<usize, QueryError> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(err(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::ValueFilter;
    use crate::data::model::{SortField, SortOrder};

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn form_from_search_page() {
        let query = parse_query(
            &pairs(&[
                ("rank", " 1200 "),
                ("category", "All"),
                ("quota", "Home University"),
                ("branch", ""),
            ]),
            &Config::default(),
        )
        .unwrap();

        assert_eq!(query.rank, 1200);
        assert_eq!(query.radius, 1000);
        assert_eq!(query.filters.len(), 1);
        assert_eq!(
            query.filters.get(&FacetField::QuotaType),
            ValueFilter::from_values(["home university"]).as_ref()
        );
        assert_eq!(query.sort, SortSpec::default());
        assert_eq!(query.page, None);
    }

    #[test]
    fn rank_must_be_present_and_whole() {
        let config = Config::default();
        assert_eq!(parse_query(&pairs(&[]), &config), Err(QueryError::MissingRank));
        assert_eq!(
            parse_query(&pairs(&[("rank", "")]), &config),
            Err(QueryError::MissingRank)
        );
        assert_eq!(
            parse_query(&pairs(&[("rank", "12.5")]), &config),
            Err(QueryError::InvalidRank("12.5".into()))
        );
        assert_eq!(
            parse_query(&pairs(&[("rank", "ten")]), &config),
            Err(QueryError::InvalidRank("ten".into()))
        );
    }

    #[test]
    fn repeated_keys_form_a_membership_set() {
        let query = parse_query(
            &pairs(&[("rank", "500"), ("category", "OPEN"), ("category", "OBC")]),
            &Config::default(),
        )
        .unwrap();
        assert_eq!(query.filters[&FacetField::Category].len(), 2);
    }

    #[test]
    fn single_mode_rejects_several_values() {
        let config = Config {
            filter_mode: FilterMode::Single,
            ..Config::default()
        };
        let input = pairs(&[("rank", "500"), ("branch", "Civil"), ("branch", "Mechanical")]);
        assert_eq!(
            parse_query(&input, &config),
            Err(QueryError::TooManyValues(FacetField::BranchName))
        );

        let same_twice = pairs(&[("rank", "500"), ("branch", "Civil"), ("branch", "civil ")]);
        assert!(parse_query(&same_twice, &config).is_ok());
    }

    #[test]
    fn sort_and_pagination() {
        let config = Config::default();
        let query = parse_query(
            &pairs(&[
                ("rank", "500"),
                ("radius", "50"),
                ("sort_by", "percentile"),
                ("order", "desc"),
                ("page", "3"),
            ]),
            &config,
        )
        .unwrap();
        assert_eq!(query.radius, 50);
        assert_eq!(query.sort.field, SortField::Percentile);
        assert_eq!(query.sort.order, SortOrder::Descending);
        assert_eq!(
            query.page,
            Some(PageRequest {
                page: 3,
                page_size: config.default_page_size
            })
        );

        let sized = parse_query(&pairs(&[("rank", "500"), ("page_size", "20")]), &config).unwrap();
        assert_eq!(sized.page, Some(PageRequest { page: 1, page_size: 20 }));

        let unpaged = parse_unpaged(&pairs(&[("rank", "500"), ("page", "2")]), &config).unwrap();
        assert_eq!(unpaged.page, None);
    }

    #[test]
    fn bad_sort_and_page_values() {
        let config = Config::default();
        assert_eq!(
            parse_query(&pairs(&[("rank", "5"), ("sort_by", "seats")]), &config),
            Err(QueryError::UnknownSortField("seats".into()))
        );
        assert_eq!(
            parse_query(&pairs(&[("rank", "5"), ("page", "0")]), &config),
            Err(QueryError::InvalidPage("0".into()))
        );
        assert_eq!(
            parse_query(&pairs(&[("rank", "5"), ("page_size", "-1")]), &config),
            Err(QueryError::InvalidPageSize("-1".into()))
        );
        assert_eq!(
            parse_query(&pairs(&[("rank", "5"), ("radius", "wide")]), &config),
            Err(QueryError::InvalidRadius("wide".into()))
        );
    }

    #[test]
    fn non_positive_rank_passes_translation() {
        // rejected by the engine, not here
        let query = parse_query(&pairs(&[("rank", "-3")]), &Config::default()).unwrap();
        assert_eq!(query.rank, -3);
    }
}
