use std::io;

use thiserror::Error;

use super::filter::SearchResult;
use super::model::CutoffRecord;

/// Download name offered by the export endpoint.
pub const EXPORT_FILE_NAME: &str = "college_results.csv";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Write records as CSV. The header row is always present, even with no rows.
pub fn write_csv<W: io::Write>(records: &[CutoffRecord], out: W) -> Result<W, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);

    writer.write_record(CutoffRecord::COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

/// Render a whole result as CSV bytes.
pub fn to_csv_bytes(result: &SearchResult) -> Result<Vec<u8>, ExportError> {
    write_csv(&result.records, Vec::new())
}
