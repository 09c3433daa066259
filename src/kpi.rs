use std::collections::BTreeMap;

use crate::models::{classify_status, EnrichedRow, Kpis, Outcome, UNKNOWN_STATUS};
use crate::window::WindowSubsets;

pub fn aggregate(subsets: &WindowSubsets<'_>) -> Kpis {
    let mut finished_count = 0;
    let mut error_count = 0;
    let mut other_count = 0;
    let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut processing_minutes = 0.0;
    let mut processing_count = 0usize;

    for row in &subsets.completed {
        let status = match row.status_norm() {
            "" => UNKNOWN_STATUS,
            status => status,
        };
        *status_counts.entry(status.to_string()).or_insert(0) += 1;

        match classify_status(row.status_norm()) {
            Outcome::Finished => finished_count += 1,
            Outcome::Error => error_count += 1,
            Outcome::Other => other_count += 1,
        }

        if let Some(minutes) = processing_minutes_of(row) {
            processing_minutes += minutes;
            processing_count += 1;
        }
    }

    let avg_processing_minutes =
        (processing_count > 0).then(|| processing_minutes / processing_count as f64);

    let hours: f64 = subsets.started.iter().filter_map(|row| worked_hours(row)).sum();
    let total_hours = (hours != 0.0).then_some(hours);

    Kpis {
        created_count: subsets.created.len(),
        finished_count,
        error_count,
        other_count,
        avg_processing_minutes,
        total_hours,
        status_counts,
    }
}

fn processing_minutes_of(row: &EnrichedRow) -> Option<f64> {
    let created = row.created_date()?;
    let completed = row.completed_date()?;
    let minutes = (completed - created).num_milliseconds() as f64 / 60_000.0;
    (minutes >= 0.0 && minutes.is_finite()).then_some(minutes)
}

fn worked_hours(row: &EnrichedRow) -> Option<f64> {
    let start = row.start_date()?;
    let end = row.end_date()?;
    let millis = (end - start).num_milliseconds();
    (millis > 0).then(|| millis as f64 / 3_600_000.0)
}
