use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};

use crate::models::{classify_status, DateField, EnrichedRow, HourlyHistogram, Outcome, Series};

pub const HALF_HOUR_BINS: usize = 48;

fn day_key(instant: NaiveDateTime) -> String {
    instant.format("%Y-%m-%d").to_string()
}

fn hours_between(start: NaiveDateTime, end: NaiveDateTime) -> Option<f64> {
    let millis = (end - start).num_milliseconds();
    (millis > 0).then(|| millis as f64 / 3_600_000.0)
}

fn into_series<V: Into<f64>>(map: BTreeMap<String, V>) -> Series {
    let (labels, values) = map
        .into_iter()
        .map(|(label, value)| (label, value.into()))
        .unzip();
    Series { labels, values }
}

/// Rows per calendar day of `field`, days ascending.
pub fn count_by_day(rows: &[&EnrichedRow], field: DateField) -> Series {
    let mut map: BTreeMap<String, u32> = BTreeMap::new();
    for instant in rows.iter().filter_map(|row| row.date(field)) {
        *map.entry(day_key(instant)).or_insert(0) += 1;
    }
    into_series(map)
}

/// Hours between `start_field` and `end_field`, bucketed by the start day. Rows
/// whose end is not after their start contribute nothing.
pub fn hours_by_day(rows: &[&EnrichedRow], start_field: DateField, end_field: DateField) -> Series {
    let mut map: BTreeMap<String, f64> = BTreeMap::new();
    for row in rows {
        let (Some(start), Some(end)) = (row.date(start_field), row.date(end_field)) else {
            continue;
        };
        if let Some(hours) = hours_between(start, end) {
            *map.entry(day_key(start)).or_insert(0.0) += hours;
        }
    }
    into_series(map)
}

pub fn half_hour_labels() -> Vec<String> {
    (0..HALF_HOUR_BINS)
        .map(|index| {
            let hour = index / 2;
            if index % 2 == 1 {
                format!("{hour}.5")
            } else {
                hour.to_string()
            }
        })
        .collect()
}

/// Successes and failures by half-hour of the created time of day.
pub fn hourly_success_failure(rows: &[&EnrichedRow]) -> HourlyHistogram {
    let mut success = vec![0; HALF_HOUR_BINS];
    let mut fails = vec![0; HALF_HOUR_BINS];

    for row in rows {
        let Some(created) = row.created_date() else {
            continue;
        };
        let index = created.hour() as usize * 2 + usize::from(created.minute() >= 30);
        if index >= HALF_HOUR_BINS {
            continue;
        }

        match classify_status(row.status_norm()) {
            Outcome::Finished => success[index] += 1,
            Outcome::Error => fails[index] += 1,
            Outcome::Other => {}
        }
    }

    HourlyHistogram {
        labels: half_hour_labels(),
        success,
        fails,
    }
}
