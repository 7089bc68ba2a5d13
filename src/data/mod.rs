/// Data layer: core types, loading, facets, searching and export.
///
/// Architecture:
/// ```text
///  .csv (latin-1) / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  parse file → validate schema → drop bad rows
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │   Dataset    │  Vec<CutoffRecord>, FacetSet (dropdown values)
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter  │  rank window + facet membership → sort → stats → page
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export  │  SearchResult → CSV bytes
///   └──────────┘
/// ```

pub mod encoding;
pub mod export;
pub mod facets;
pub mod filter;
pub mod loader;
pub mod model;
