use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dates::DateNormalizer;
use crate::models::{normalize_status, DateField, EnrichedRow, RawRecord};

/// Per-field count of non-empty timestamp cells that could not be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseDiagnostics {
    pub created: usize,
    pub completed: usize,
    pub start: usize,
    pub end: usize,
}

impl ParseDiagnostics {
    fn record(&mut self, field: DateField) {
        match field {
            DateField::Created => self.created += 1,
            DateField::Completed => self.completed += 1,
            DateField::Start => self.start += 1,
            DateField::End => self.end += 1,
        }
    }

    pub fn get(&self, field: DateField) -> usize {
        match field {
            DateField::Created => self.created,
            DateField::Completed => self.completed,
            DateField::Start => self.start,
            DateField::End => self.end,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.completed + self.start + self.end
    }
}

/// The row set produced by one successful file load.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub load_id: Uuid,
    pub source: PathBuf,
    pub rows: Vec<EnrichedRow>,
    pub diagnostics: ParseDiagnostics,
}

fn field<'a>(raw: &'a RawRecord, name: &str) -> Option<&'a str> {
    if let Some(value) = raw.get(name) {
        return Some(value.as_str());
    }
    raw.iter()
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn date_cell<'a>(raw: &'a RawRecord, date_field: DateField) -> Option<&'a str> {
    match date_field {
        DateField::Created => field(raw, "created"),
        DateField::Completed => field(raw, "completed"),
        DateField::Start => field(raw, "starttime").or_else(|| field(raw, "start")),
        DateField::End => field(raw, "endtime").or_else(|| field(raw, "end")),
    }
}

pub fn enrich_row(
    raw: RawRecord,
    parser: &DateNormalizer,
    diagnostics: &mut ParseDiagnostics,
) -> EnrichedRow {
    let mut parsed = [None; 4];
    for (slot, date_field) in parsed.iter_mut().zip(DateField::ALL) {
        let cell = date_cell(&raw, date_field);
        *slot = parser.parse(cell);
        if slot.is_none() && cell.is_some_and(|value| !value.trim().is_empty()) {
            diagnostics.record(date_field);
        }
    }

    let status_norm = normalize_status(field(&raw, "status"));
    let [created, completed, start, end] = parsed;
    EnrichedRow::new(raw, created, completed, start, end, status_norm)
}

pub fn enrich_rows(
    records: Vec<RawRecord>,
    parser: &DateNormalizer,
) -> (Vec<EnrichedRow>, ParseDiagnostics) {
    let mut diagnostics = ParseDiagnostics::default();
    let rows = records
        .into_iter()
        .map(|raw| enrich_row(raw, parser, &mut diagnostics))
        .collect();
    (rows, diagnostics)
}

/// Reads a headed CSV into raw records. Empty lines are skipped and short rows keep
/// only the cells they have.
pub fn read_records<R: std::io::Read>(input: R) -> anyhow::Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);
    let headers = reader.headers().context("failed to read CSV header")?.clone();

    let mut records = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("malformed CSV record {}", index + 1))?;
        let raw: RawRecord = headers
            .iter()
            .zip(record.iter())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        records.push(raw);
    }

    Ok(records)
}

pub fn load_csv_blocking(path: &Path, parser: &DateNormalizer) -> anyhow::Result<LoadedDataset> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let records =
        read_records(file).with_context(|| format!("failed to parse {}", path.display()))?;
    let (rows, diagnostics) = enrich_rows(records, parser);

    let dataset = LoadedDataset {
        load_id: Uuid::new_v4(),
        source: path.to_path_buf(),
        rows,
        diagnostics,
    };

    if dataset.diagnostics.total() > 0 {
        for date_field in DateField::ALL {
            let failures = dataset.diagnostics.get(date_field);
            if failures > 0 {
                warn!(field = date_field.label(), failures, "unparseable timestamps");
            }
        }
    }
    debug!(load_id = %dataset.load_id, "dataset enriched");
    info!("CSV loaded: {} rows", dataset.rows.len());

    Ok(dataset)
}

/// Loads a CSV off the async runtime's worker threads.
pub async fn load_csv(path: PathBuf, parser: DateNormalizer) -> anyhow::Result<LoadedDataset> {
    info!(path = %path.display(), "processing CSV");
    tokio::task::spawn_blocking(move || load_csv_blocking(&path, &parser))
        .await
        .context("CSV loader task failed")?
}
