use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Panel, PanelBuilder};
use crate::error::{PanelError, Result};

/// Layout of a delimited panel file: two index columns, every other column a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub timestamp_column: String,
    pub entity_column: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            timestamp_column: "date".to_string(),
            entity_column: "ticker".to_string(),
        }
    }
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parses RFC 3339, naive `Y-m-d[ H:M:S]` (taken as UTC) or integer epoch seconds.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }
    s.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

fn parse_cell(raw: &str, row: usize, field: &str) -> Result<Option<f64>> {
    let s = raw.trim();
    if s.is_empty() || matches!(s, "nan" | "NaN" | "NA" | "N/A" | "null" | "None") {
        return Ok(None);
    }
    let v: f64 = s.parse().map_err(|_| PanelError::NonNumeric {
        row,
        field: field.to_string(),
        value: s.to_string(),
    })?;
    if !v.is_finite() {
        return Err(PanelError::NonFinite {
            row,
            field: field.to_string(),
        });
    }
    Ok(Some(v))
}

impl Panel {
    pub fn from_csv_path(path: impl AsRef<Path>, opts: &CsvOptions) -> Result<Panel> {
        let file = File::open(path)?;
        Self::from_csv_reader(file, opts)
    }

    pub fn from_csv_reader<R: Read>(reader: R, opts: &CsvOptions) -> Result<Panel> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(opts.delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| PanelError::MissingIndexColumn(name.to_string()))
        };
        let ts_col = find(&opts.timestamp_column)?;
        let entity_col = find(&opts.entity_column)?;
        let field_cols: Vec<usize> = (0..headers.len())
            .filter(|c| *c != ts_col && *c != entity_col)
            .collect();
        let field_names: Vec<&str> = field_cols.iter().map(|c| &headers[*c]).collect();
        let mut builder = PanelBuilder::new(field_names.as_slice())?;

        let mut values = vec![None; field_cols.len()];
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let raw_ts = record.get(ts_col).unwrap_or("");
            let ts = parse_timestamp(raw_ts).ok_or_else(|| PanelError::Timestamp {
                row,
                value: raw_ts.to_string(),
            })?;
            let entity = record.get(entity_col).unwrap_or("");
            for (slot, (&c, name)) in values.iter_mut().zip(field_cols.iter().zip(&field_names)) {
                *slot = parse_cell(record.get(c).unwrap_or(""), row, name)?;
            }
            builder.push_row(entity, ts, &values)?;
        }
        Ok(builder.build())
    }

    /// Parses `{"fields": [...], "rows": [{"entity", "timestamp", "values": [...]}]}`.
    pub fn from_json_records(json: &str) -> Result<Panel> {
        let records: PanelRecords = serde_json::from_str(json)?;
        records.into_panel()
    }

    pub fn to_records(&self) -> PanelRecords {
        PanelRecords {
            fields: self.fields().to_vec(),
            rows: (0..self.len())
                .filter_map(|row| {
                    let (entity, ts) = self.index().key(row)?;
                    Some(RowRecord {
                        entity: entity.to_string(),
                        timestamp: ts.to_rfc3339(),
                        values: (0..self.fields().len()).map(|f| self.value(row, f)).collect(),
                    })
                })
                .collect(),
        }
    }
}

/// Serde form of a panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelRecords {
    pub fields: Vec<String>,
    pub rows: Vec<RowRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowRecord {
    pub entity: String,
    pub timestamp: String,
    pub values: Vec<Option<f64>>,
}

impl PanelRecords {
    pub fn into_panel(self) -> Result<Panel> {
        let mut builder = PanelBuilder::new(self.fields.as_slice())?;
        for (row, rec) in self.rows.iter().enumerate() {
            let ts = parse_timestamp(&rec.timestamp).ok_or_else(|| PanelError::Timestamp {
                row,
                value: rec.timestamp.clone(),
            })?;
            builder.push_row(&rec.entity, ts, &rec.values)?;
        }
        Ok(builder.build())
    }
}
