use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

/// Statuses counted as a successful finish regardless of substring checks.
pub const FINISHED_STATUSES: [&str; 4] = ["finished", "completed", "done", "success"];

/// Status key used in the distribution when a row has no status.
pub const UNKNOWN_STATUS: &str = "unknown";

/// One CSV row as delivered by the reader, header name -> cell text.
pub type RawRecord = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Created,
    Completed,
    Start,
    End,
}

impl DateField {
    pub const ALL: [DateField; 4] = [
        DateField::Created,
        DateField::Completed,
        DateField::Start,
        DateField::End,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DateField::Created => "created",
            DateField::Completed => "completed",
            DateField::Start => "starttime",
            DateField::End => "endtime",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    Error,
    Other,
}

/// Classifies a normalized status. The finished check wins over the error check,
/// so "successful_error" is a finish.
pub fn classify_status(status: &str) -> Outcome {
    if FINISHED_STATUSES.contains(&status) || status.contains("success") {
        Outcome::Finished
    } else if status.contains("error") || status.contains("fail") {
        Outcome::Error
    } else {
        Outcome::Other
    }
}

pub fn normalize_status(value: Option<&str>) -> String {
    value.map(|s| s.trim().to_lowercase()).unwrap_or_default()
}

/// A raw record plus the values derived from it at load time.
#[derive(Debug, Clone)]
pub struct EnrichedRow {
    raw: RawRecord,
    created_date: Option<NaiveDateTime>,
    completed_date: Option<NaiveDateTime>,
    start_date: Option<NaiveDateTime>,
    end_date: Option<NaiveDateTime>,
    status_norm: String,
}

impl EnrichedRow {
    pub fn new(
        raw: RawRecord,
        created_date: Option<NaiveDateTime>,
        completed_date: Option<NaiveDateTime>,
        start_date: Option<NaiveDateTime>,
        end_date: Option<NaiveDateTime>,
        status_norm: String,
    ) -> Self {
        Self {
            raw,
            created_date,
            completed_date,
            start_date,
            end_date,
            status_norm,
        }
    }

    pub fn raw(&self) -> &RawRecord {
        &self.raw
    }

    pub fn date(&self, field: DateField) -> Option<NaiveDateTime> {
        match field {
            DateField::Created => self.created_date,
            DateField::Completed => self.completed_date,
            DateField::Start => self.start_date,
            DateField::End => self.end_date,
        }
    }

    pub fn created_date(&self) -> Option<NaiveDateTime> {
        self.created_date
    }

    pub fn completed_date(&self) -> Option<NaiveDateTime> {
        self.completed_date
    }

    pub fn start_date(&self) -> Option<NaiveDateTime> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<NaiveDateTime> {
        self.end_date
    }

    pub fn status_norm(&self) -> &str {
        &self.status_norm
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        DateField::ALL.into_iter().filter_map(|field| self.date(field))
    }
}

/// Index-aligned labels and values ready for a chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl Series {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyHistogram {
    pub labels: Vec<String>,
    pub success: Vec<usize>,
    pub fails: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Kpis {
    pub created_count: usize,
    pub finished_count: usize,
    pub error_count: usize,
    pub other_count: usize,
    pub avg_processing_minutes: Option<f64>,
    pub total_hours: Option<f64>,
    pub status_counts: BTreeMap<String, usize>,
}
