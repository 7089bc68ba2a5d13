use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::{ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use arrow::error::ArrowError;
use arrow::util::display::array_value_to_string;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::errors::ParquetError;
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::encoding::TextEncoding;
use super::model::{CutoffRecord, Dataset};

/// Columns every source must provide, in reporting order.
pub const REQUIRED_COLUMNS: [&str; 10] = [
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
];

const CITY_COLUMN: &str = "city";

// ---------------------------------------------------------------------------
// Errors and options
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("{}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

/// How delimited files are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub encoding: TextEncoding,
    pub delimiter: u8,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            encoding: TextEncoding::Latin1,
            delimiter: b',',
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a cutoff table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.tsv` / `.txt` – delimited text, decoded per [`LoadOptions`]
/// * `.json`    – `[{ "college_code": ..., "rank": 1234, ... }, ...]`
/// * `.parquet` – one column per field, as written by `df.to_parquet()`
///
/// Rows with an unusable rank or without a college/branch name are dropped.
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<Dataset, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" | "txt" => load_delimited(path, options)?,
        "tsv" => load_delimited(
            path,
            &LoadOptions {
                delimiter: b'\t',
                ..*options
            },
        )?,
        "json" => load_json(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => return Err(LoadError::UnsupportedFormat(other.to_string())),
    };

    let read = table.rows.len();
    let dataset = build_dataset(table)?;
    info!(
        "Loaded {} cutoff records from {} ({} rows dropped)",
        dataset.len(),
        path.display(),
        read - dataset.len()
    );
    Ok(dataset)
}

/// Untyped cells as read from a source, before validation.
struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

fn open(path: &Path) -> Result<File, LoadError> {
    File::open(path).map_err(|source| LoadError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Delimited loader
// ---------------------------------------------------------------------------

fn load_delimited(path: &Path, options: &LoadOptions) -> Result<RawTable, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .flexible(true)
        .from_reader(open(path)?);

    let decode = |bytes: &[u8], row: &str| {
        options
            .encoding
            .decode(bytes)
            .ok_or_else(|| LoadError::Malformed {
                path: path.to_path_buf(),
                reason: format!("{row} is not valid {:?} text", options.encoding),
            })
    };

    let headers = reader
        .byte_headers()?
        .iter()
        .map(|h| decode(h, "header row"))
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::new();
    for (row_no, result) in reader.byte_records().enumerate() {
        let record = result?;
        let label = format!("row {}", row_no + 1);
        let cells = record
            .iter()
            .map(|field| decode(field, &label).map(non_blank))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(cells);
    }

    Ok(RawTable { headers, rows })
}

fn non_blank(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "college_code": "01002", "college_name": "...", "rank": 10234, "percentile": 97.1, ... },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<RawTable, LoadError> {
    let root: JsonValue = serde_json::from_reader(std::io::BufReader::new(open(path)?))?;

    let records = root.as_array().ok_or_else(|| LoadError::Malformed {
        path: path.to_path_buf(),
        reason: "expected top-level JSON array".to_string(),
    })?;

    if records.is_empty() {
        return Ok(RawTable {
            headers: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        });
    }

    let mut headers: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    let mut objects = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec.as_object().ok_or_else(|| LoadError::Malformed {
            path: path.to_path_buf(),
            reason: format!("row {i} is not a JSON object"),
        })?;
        for key in obj.keys() {
            if seen.insert(key.as_str()) {
                headers.push(key.clone());
            }
        }
        objects.push(obj);
    }

    let rows: Vec<Vec<Option<String>>> = objects
        .iter()
        .map(|obj| {
            headers
                .iter()
                .map(|h| obj.get(h).and_then(json_to_cell))
                .collect::<Vec<_>>()
        })
        .collect();

    Ok(RawTable { headers, rows })
}

fn json_to_cell(val: &JsonValue) -> Option<String> {
    match val {
        JsonValue::Null => None,
        JsonValue::String(s) => non_blank(s.clone()),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one column per field.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`); rank may be stored as int or float.
fn load_parquet(path: &Path) -> Result<RawTable, LoadError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(open(path)?)?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build()?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        for row in 0..batch.num_rows() {
            let cells = batch
                .columns()
                .iter()
                .map(|col| extract_cell(col, row))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(cells);
        }
    }

    Ok(RawTable { headers, rows })
}

/// Render a single Arrow cell as text, `None` for nulls.
fn extract_cell(col: &ArrayRef, row: usize) -> Result<Option<String>, LoadError> {
    if col.is_null(row) {
        return Ok(None);
    }
    let text = match col.data_type() {
        DataType::Utf8 => col.as_string::<i32>().value(row).to_string(),
        DataType::LargeUtf8 => col.as_string::<i64>().value(row).to_string(),
        DataType::Int32 => col.as_primitive::<Int32Type>().value(row).to_string(),
        DataType::Int64 => col.as_primitive::<Int64Type>().value(row).to_string(),
        DataType::Float32 => col.as_primitive::<Float32Type>().value(row).to_string(),
        DataType::Float64 => col.as_primitive::<Float64Type>().value(row).to_string(),
        _ => array_value_to_string(col, row)?,
    };
    Ok(non_blank(text))
}

// ---------------------------------------------------------------------------
// Validation and coercion
// ---------------------------------------------------------------------------

/// Positions of the known columns within a source row.
struct ColumnMap {
    required: [usize; REQUIRED_COLUMNS.len()],
    city: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &[String]) -> Result<Self, LoadError> {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, h) in headers.iter().enumerate() {
            let name = h.trim_start_matches('\u{feff}').trim().to_ascii_lowercase();
            index.entry(name).or_insert(i);
        }

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !index.contains_key(**c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(LoadError::Schema { missing });
        }

        let mut required = [0; REQUIRED_COLUMNS.len()];
        for (slot, name) in required.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = index[name];
        }
        Ok(ColumnMap {
            required,
            city: index.get(CITY_COLUMN).copied(),
        })
    }
}

fn build_dataset(table: RawTable) -> Result<Dataset, LoadError> {
    let columns = ColumnMap::resolve(&table.headers)?;

    let mut records = Vec::with_capacity(table.rows.len());
    for (row_no, row) in table.rows.iter().enumerate() {
        let cell = |i: usize| {
            row.get(i)
                .and_then(|c| c.as_deref())
                .map(str::trim)
                .unwrap_or("")
        };
        let [
            college_code,
            college_name,
            branch_code,
            branch_name,
            category_code,
            category,
            quota_type,
            allocation_type,
            rank,
            percentile,
        ] = columns.required.map(cell);

        let Some(rank) = parse_rank(rank) else {
            debug!("Dropping row {row_no}: unusable rank '{rank}'");
            continue;
        };
        if college_name.is_empty() || branch_name.is_empty() {
            debug!("Dropping row {row_no}: missing college or branch name");
            continue;
        }

        records.push(CutoffRecord {
            college_code: college_code.to_string(),
            college_name: college_name.to_string(),
            branch_code: branch_code.to_string(),
            branch_name: branch_name.to_string(),
            category_code: category_code.to_string(),
            category: category.to_string(),
            quota_type: quota_type.to_string(),
            allocation_type: allocation_type.to_string(),
            rank,
            percentile: percentile.parse::<f64>().ok().filter(|p| p.is_finite()),
            city: columns
                .city
                .map(cell)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        });
    }

    Ok(Dataset::from_records(records))
}

/// Coerce a rank cell: integers, or floats with no fractional part.
fn parse_rank(s: &str) -> Option<i64> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(i);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use arrow::array::{Float64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use tempfile::NamedTempFile;

    use super::*;

    const HEADER: &str = "college_code,college_name,branch_code,branch_name,category_code,category,quota_type,allocation_type,rank,percentile,city\n";

    fn temp_file(suffix: &str, bytes: &[u8]) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_latin1_csv() {
        let mut bytes = HEADER.as_bytes().to_vec();
        bytes.extend_from_slice(
            b"01002,Coll\xe8ge of Engineering,0100219110,Civil Engineering,GOPENS,OPEN,Home University,State Level,1234,97.25,Amravati\n",
        );
        let file = temp_file(".csv", &bytes);

        let dataset = load_file(file.path(), &LoadOptions::default()).unwrap();
        assert_eq!(dataset.len(), 1);
        let rec = &dataset.records[0];
        assert_eq!(rec.college_name, "Collège of Engineering");
        assert_eq!(rec.rank, 1234);
        assert_eq!(rec.percentile, Some(97.25));
        assert_eq!(rec.city.as_deref(), Some("Amravati"));
    }

    #[test]
    fn utf8_option_rejects_latin1_bytes() {
        let mut bytes = HEADER.as_bytes().to_vec();
        bytes.extend_from_slice(b"1,Coll\xe8ge,2,Civil,G,OPEN,HU,SL,10,90,Pune\n");
        let file = temp_file(".csv", &bytes);
        let options = LoadOptions {
            encoding: TextEncoding::Utf8,
            ..LoadOptions::default()
        };
        assert!(matches!(
            load_file(file.path(), &options),
            Err(LoadError::Malformed { .. })
        ));
    }

    #[test]
    fn drops_unusable_rows() {
        let body = format!(
            "{HEADER}\
             1,Alpha,10,Civil,G,OPEN,HU,SL,1500.0,90,\n\
             2,Beta,11,Civil,G,OPEN,HU,SL,abc,90,\n\
             3,Gamma,12,Civil,G,OPEN,HU,SL,,90,\n\
             4,,13,Civil,G,OPEN,HU,SL,1700,90,\n\
             5,Delta,14,,G,OPEN,HU,SL,1800,90,\n\
             6,Epsilon,15,Mechanical,G,OBC,HU,SL,1900.5,n/a,Nagpur\n\
             7,Zeta,16,Mechanical,G,OBC,HU,SL,2000,,Nagpur\n"
        );
        let file = temp_file(".csv", body.as_bytes());

        let dataset = load_file(file.path(), &LoadOptions::default()).unwrap();
        let kept: Vec<_> = dataset.records.iter().map(|r| r.college_name.as_str()).collect();
        assert_eq!(kept, vec!["Alpha", "Zeta"]);
        assert_eq!(dataset.records[0].rank, 1500);
        assert_eq!(dataset.records[0].city, None);
        assert_eq!(dataset.records[1].percentile, None);
    }

    #[test]
    fn missing_columns_are_a_schema_error() {
        let file = temp_file(".csv", b"college_code,college_name,rank\n1,Alpha,10\n");
        match load_file(file.path(), &LoadOptions::default()) {
            Err(LoadError::Schema { missing }) => assert_eq!(
                missing,
                vec![
                    "branch_code",
                    "branch_name",
                    "category_code",
                    "category",
                    "quota_type",
                    "allocation_type",
                    "percentile",
                ]
            ),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn city_column_is_optional_and_headers_are_normalized() {
        let body = " College_Code ,COLLEGE_NAME,branch_code,branch_name,category_code,category,quota_type,allocation_type,Rank,percentile\n\
                    1,Alpha,10,Civil,G,OPEN,HU,SL,42,99.1\n";
        let file = temp_file(".csv", body.as_bytes());
        let dataset = load_file(file.path(), &LoadOptions::default()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records[0].college_code, "1");
        assert_eq!(dataset.records[0].city, None);
    }

    #[test]
    fn tsv_uses_tab_delimiter() {
        let body = HEADER.replace(',', "\t") + "1\tAlpha\t10\tCivil\tG\tOPEN\tHU\tSL\t42\t99.1\tPune\n";
        let file = temp_file(".tsv", body.as_bytes());
        let dataset = load_file(file.path(), &LoadOptions::default()).unwrap();
        assert_eq!(dataset.records[0].city.as_deref(), Some("Pune"));
    }

    #[test]
    fn missing_file_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        assert!(matches!(
            load_file(&path, &LoadOptions::default()),
            Err(LoadError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = temp_file(".xlsx", b"");
        assert!(matches!(
            load_file(file.path(), &LoadOptions::default()),
            Err(LoadError::UnsupportedFormat(ext)) if ext == "xlsx"
        ));
    }

    #[test]
    fn loads_json_records() {
        let json = r#"[
            {"college_code": "1", "college_name": "Alpha", "branch_code": "10", "branch_name": "Civil",
             "category_code": "GOPENS", "category": "OPEN", "quota_type": "HU", "allocation_type": "SL",
             "rank": 1200.0, "percentile": 98.5, "city": null},
            {"college_code": "2", "college_name": "Beta", "branch_code": "11", "branch_name": "Civil",
             "category_code": "GOPENS", "category": "OPEN", "quota_type": "HU", "allocation_type": "SL",
             "rank": null, "percentile": null, "city": "Pune"}
        ]"#;
        let file = temp_file(".json", json.as_bytes());
        let dataset = load_file(file.path(), &LoadOptions::default()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records[0].rank, 1200);
        assert_eq!(dataset.records[0].percentile, Some(98.5));
    }

    #[test]
    fn empty_json_array_is_an_empty_dataset() {
        let file = temp_file(".json", b"[]");
        let dataset = load_file(file.path(), &LoadOptions::default()).unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn loads_parquet_with_float_rank() {
        let text_columns = [
            ("college_code", "1"),
            ("college_name", "Alpha"),
            ("branch_code", "10"),
            ("branch_name", "Civil"),
            ("category_code", "GOPENS"),
            ("category", "OPEN"),
            ("quota_type", "HU"),
            ("allocation_type", "SL"),
        ];
        let mut fields: Vec<Field> = text_columns
            .iter()
            .map(|(name, _)| Field::new(*name, DataType::Utf8, false))
            .collect();
        fields.push(Field::new("rank", DataType::Float64, true));
        fields.push(Field::new("percentile", DataType::Float64, true));
        let schema = Arc::new(Schema::new(fields));

        let mut columns: Vec<ArrayRef> = text_columns
            .iter()
            .map(|(_, value)| Arc::new(StringArray::from(vec![*value, *value])) as ArrayRef)
            .collect();
        columns.push(Arc::new(Float64Array::from(vec![Some(2500.0), None])));
        columns.push(Arc::new(Float64Array::from(vec![Some(95.5), Some(90.0)])));
        let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let dataset = load_file(file.path(), &LoadOptions::default()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records[0].rank, 2500);
        assert_eq!(dataset.records[0].percentile, Some(95.5));
    }

    #[test]
    fn rank_coercion_policy() {
        assert_eq!(parse_rank("1500"), Some(1500));
        assert_eq!(parse_rank("1500.0"), Some(1500));
        assert_eq!(parse_rank("1500.5"), None);
        assert_eq!(parse_rank("NaN"), None);
        assert_eq!(parse_rank(""), None);
    }
}
