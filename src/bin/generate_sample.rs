use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use cutoff_finder::data::encoding::TextEncoding;
use cutoff_finder::data::model::CutoffRecord;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_f64() * n as f64) as usize % n.max(1)
    }
}

const COLLEGES: [(&str, &str, &str); 6] = [
    ("01002", "Government College of Engineering, Amravati", "Amravati"),
    ("03012", "Veermata Jijabai Technological Institute(VJTI), Matunga, Mumbai", "Mumbai"),
    ("06006", "College of Engineering, Pune", "Pune"),
    ("06271", "Pimpri Chinchwad Education Trust's Pimpri Chinchwad College of Engineering", "Pune"),
    ("04004", "Shri Guru Gobind Singhji Institute of Engineering and Technology, Nanded", "Nanded"),
    ("05303", "Coll\u{e8}ge Saint-Fran\u{e7}ois d'Ing\u{e9}nierie, Nashik", "Not Specified"),
];

const BRANCHES: [(&str, &str, f64); 5] = [
    ("24210", "Computer Engineering", 0.15),
    ("24610", "Information Technology", 0.25),
    ("37210", "Electronics and Telecommunication Engg", 0.45),
    ("61210", "Mechanical Engineering", 0.7),
    ("19110", "Civil Engineering", 0.9),
];

const CATEGORIES: [(&str, &str, f64); 5] = [
    ("GOPENS", "OPEN", 1.0),
    ("GOBCS", "OBC", 1.25),
    ("GSCS", "SC", 2.5),
    ("GSTS", "ST", 4.0),
    ("EWS", "EWS", 1.4),
];

const QUOTAS: [(&str, &str, f64); 3] = [
    ("Home University", "State Level", 1.0),
    ("Other Than Home University", "State Level", 0.8),
    ("State Level", "All India", 0.6),
];

/// Candidates appearing in the exam; ranks run from 1 to this.
const CANDIDATES: f64 = 150_000.0;

fn generate(rng: &mut SimpleRng) -> Vec<CutoffRecord> {
    let mut records = Vec::new();
    for (college_idx, (college_code, college_name, city)) in COLLEGES.iter().enumerate() {
        let prestige = 0.2 + college_idx as f64 * 0.15;
        for (branch_code, branch_name, demand) in BRANCHES {
            for (category_code, category, relax) in CATEGORIES {
                for (quota, allocation, competition) in QUOTAS {
                    // Not every seat type is offered everywhere.
                    if rng.below(10) == 0 {
                        continue;
                    }
                    let base =
                        CANDIDATES * 0.12 * prestige * (0.4 + demand) * relax * competition;
                    let noise = 0.85 + rng.next_f64() * 0.3;
                    let rank = (base * noise).clamp(1.0, CANDIDATES).round() as i64;
                    let percentile = 100.0 * (1.0 - rank as f64 / CANDIDATES);
                    let city = (*city != "Not Specified" || rng.below(2) == 0)
                        .then(|| city.to_string());

                    records.push(CutoffRecord {
                        college_code: college_code.to_string(),
                        college_name: college_name.to_string(),
                        branch_code: format!("{college_code}{branch_code}"),
                        branch_name: branch_name.to_string(),
                        category_code: category_code.to_string(),
                        category: category.to_string(),
                        quota_type: quota.to_string(),
                        allocation_type: allocation.to_string(),
                        rank,
                        percentile: Some((percentile * 1e4).round() / 1e4),
                        city,
                    });
                }
            }
        }
    }
    records
}

/// Latin-1 CSV, the format the server reads by default.
fn write_csv(records: &[CutoffRecord], path: &Path) -> Result<()> {
    let encoding = TextEncoding::Latin1;
    let mut writer = csv::Writer::from_path(path).context("creating output file")?;
    writer.write_record(CutoffRecord::COLUMNS)?;
    for rec in records {
        let fields = [
            rec.college_code.clone(),
            rec.college_name.clone(),
            rec.branch_code.clone(),
            rec.branch_name.clone(),
            rec.category_code.clone(),
            rec.category.clone(),
            rec.quota_type.clone(),
            rec.allocation_type.clone(),
            rec.rank.to_string(),
            rec.percentile.map(|p| p.to_string()).unwrap_or_default(),
            rec.city.clone().unwrap_or_default(),
        ];
        writer.write_record(fields.iter().map(|f| encoding.encode(f)))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(records: &[CutoffRecord], path: &Path) -> Result<()> {
    let text = |f: fn(&CutoffRecord) -> &str| -> ArrayRef {
        Arc::new(StringArray::from(records.iter().map(f).collect::<Vec<_>>()))
    };

    let mut fields: Vec<Field> = CutoffRecord::COLUMNS[..8]
        .iter()
        .map(|name| Field::new(*name, DataType::Utf8, false))
        .collect();
    fields.push(Field::new("rank", DataType::Int64, false));
    fields.push(Field::new("percentile", DataType::Float64, true));
    fields.push(Field::new("city", DataType::Utf8, true));
    let schema = Arc::new(Schema::new(fields));

    let columns: Vec<ArrayRef> = vec![
        text(|r| r.college_code.as_str()),
        text(|r| r.college_name.as_str()),
        text(|r| r.branch_code.as_str()),
        text(|r| r.branch_name.as_str()),
        text(|r| r.category_code.as_str()),
        text(|r| r.category.as_str()),
        text(|r| r.quota_type.as_str()),
        text(|r| r.allocation_type.as_str()),
        Arc::new(Int64Array::from(records.iter().map(|r| r.rank).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.percentile).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            records.iter().map(|r| r.city.as_deref()).collect::<Vec<_>>(),
        )),
    ];

    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;
    let file = std::fs::File::create(path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let output_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_cutoffs.csv"));

    let mut rng = SimpleRng::new(42);
    let records = generate(&mut rng);

    let ext = output_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" => write_csv(&records, &output_path)?,
        "parquet" | "pq" => write_parquet(&records, &output_path)?,
        other => bail!("Unsupported output extension: .{other}"),
    }

    println!(
        "Wrote {} cutoff records to {}",
        records.len(),
        output_path.display()
    );
    Ok(())
}
