use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::dates::DateNormalizer;
use crate::models::{DateField, EnrichedRow};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("could not interpret any timestamp in the CSV")]
    NoAnchor,
    #[error("range bounds are missing")]
    MissingBounds,
    #[error("invalid date range")]
    InvalidBounds,
    #[error("\"from\" ({from}) cannot be after \"to\" ({to})")]
    Inverted {
        from: NaiveDateTime,
        to: NaiveDateTime,
    },
}

/// Closed interval `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    from: NaiveDateTime,
    to: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(from: NaiveDateTime, to: NaiveDateTime) -> Result<Self, WindowError> {
        if from > to {
            return Err(WindowError::Inverted { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> NaiveDateTime {
        self.from
    }

    pub fn to(&self) -> NaiveDateTime {
        self.to
    }

    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        instant >= self.from && instant <= self.to
    }
}

/// Optional trailing sub-window applied in range mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubWindow {
    #[default]
    All,
    Minutes(u32),
}

impl FromStr for SubWindow {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("all") {
            return Ok(SubWindow::All);
        }
        let minutes: u32 = value
            .parse()
            .map_err(|_| anyhow::anyhow!("sub-window must be \"all\" or minutes, got {value:?}"))?;
        if minutes == 0 {
            anyhow::bail!("sub-window minutes must be positive");
        }
        Ok(SubWindow::Minutes(minutes))
    }
}

impl fmt::Display for SubWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubWindow::All => write!(f, "all"),
            SubWindow::Minutes(minutes) => write!(f, "{minutes}"),
        }
    }
}

pub fn min_instant(rows: &[EnrichedRow]) -> Option<NaiveDateTime> {
    rows.iter().flat_map(|row| row.dates()).min()
}

/// Latest instant across all timestamp fields; the anchor of relative mode.
pub fn max_instant(rows: &[EnrichedRow]) -> Option<NaiveDateTime> {
    rows.iter().flat_map(|row| row.dates()).max()
}

pub fn relative_window(
    rows: &[EnrichedRow],
    window_minutes: u32,
) -> Result<TimeWindow, WindowError> {
    let anchor = max_instant(rows).ok_or(WindowError::NoAnchor)?;
    let from = anchor
        .checked_sub_signed(Duration::minutes(i64::from(window_minutes)))
        .unwrap_or(NaiveDateTime::MIN);
    TimeWindow::new(from, anchor)
}

/// Explicit range bounds as typed by the user. `None` means "use the dataset
/// bound".
#[derive(Debug, Clone, Default)]
pub struct RangeRequest {
    pub from: Option<String>,
    pub to: Option<String>,
    pub sub_window: SubWindow,
}

fn resolve_bound(
    text: Option<&str>,
    fallback: Option<NaiveDateTime>,
    parser: &DateNormalizer,
) -> Result<NaiveDateTime, WindowError> {
    match text.map(str::trim) {
        Some(value) if !value.is_empty() => {
            parser.parse(Some(value)).ok_or(WindowError::InvalidBounds)
        }
        _ => fallback.ok_or(WindowError::MissingBounds),
    }
}

/// Builds the range window. Inversion is checked on the explicit bounds, before
/// the sub-window tightens `from`.
pub fn range_window(
    rows: &[EnrichedRow],
    request: &RangeRequest,
    parser: &DateNormalizer,
) -> Result<TimeWindow, WindowError> {
    let from = resolve_bound(request.from.as_deref(), min_instant(rows), parser)?;
    let to = resolve_bound(request.to.as_deref(), max_instant(rows), parser)?;
    let explicit = TimeWindow::new(from, to)?;
    Ok(clip_to_sub_window(explicit, request.sub_window))
}

pub fn clip_to_sub_window(window: TimeWindow, sub_window: SubWindow) -> TimeWindow {
    match sub_window {
        SubWindow::All => window,
        SubWindow::Minutes(minutes) => {
            let from = window
                .to
                .checked_sub_signed(Duration::minutes(i64::from(minutes)))
                .map_or(window.from, |trailing| window.from.max(trailing));
            TimeWindow {
                from,
                to: window.to,
            }
        }
    }
}

/// The three independent subsets a window produces.
#[derive(Debug, Clone, Default)]
pub struct WindowSubsets<'a> {
    pub created: Vec<&'a EnrichedRow>,
    pub completed: Vec<&'a EnrichedRow>,
    pub started: Vec<&'a EnrichedRow>,
}

fn rows_in<'a>(
    rows: &'a [EnrichedRow],
    window: &TimeWindow,
    field: DateField,
) -> Vec<&'a EnrichedRow> {
    rows.iter()
        .filter(|row| row.date(field).is_some_and(|instant| window.contains(instant)))
        .collect()
}

pub fn filter_window<'a>(rows: &'a [EnrichedRow], window: &TimeWindow) -> WindowSubsets<'a> {
    WindowSubsets {
        created: rows_in(rows, window, DateField::Created),
        completed: rows_in(rows, window, DateField::Completed),
        started: rows_in(rows, window, DateField::Start),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::RawRecord;

    pub(crate) fn at(h: u32, mi: u32) -> NaiveDateTime {
        day_at(1, h, mi)
    }

    pub(crate) fn day_at(d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    pub(crate) fn row(
        created: Option<NaiveDateTime>,
        completed: Option<NaiveDateTime>,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        status: &str,
    ) -> EnrichedRow {
        EnrichedRow::new(
            RawRecord::new(),
            created,
            completed,
            start,
            end,
            status.to_string(),
        )
    }

    fn sample() -> Vec<EnrichedRow> {
        vec![
            row(Some(at(8, 0)), Some(at(9, 0)), None, None, "done"),
            row(Some(at(10, 0)), None, Some(at(10, 30)), Some(at(12, 0)), "running"),
            row(None, Some(at(11, 0)), Some(at(7, 0)), None, "failed"),
            row(None, None, None, None, ""),
        ]
    }

    #[test]
    fn bounds_span_every_timestamp_field() {
        let rows = sample();
        assert_eq!(min_instant(&rows), Some(at(7, 0)));
        assert_eq!(max_instant(&rows), Some(at(12, 0)));
        assert_eq!(min_instant(&rows[3..]), None);
        assert_eq!(max_instant(&[]), None);
    }

    #[test]
    fn full_bounds_keep_every_row_with_a_value() {
        let rows = sample();
        let window = TimeWindow::new(at(7, 0), at(12, 0)).unwrap();
        let subsets = filter_window(&rows, &window);
        assert_eq!(subsets.created.len(), 2);
        assert_eq!(subsets.completed.len(), 2);
        assert_eq!(subsets.started.len(), 2);
    }

    #[test]
    fn subsets_are_independent_and_inclusive() {
        let rows = sample();
        let window = TimeWindow::new(at(9, 0), at(10, 30)).unwrap();
        let subsets = filter_window(&rows, &window);
        assert_eq!(subsets.created.len(), 1);
        assert_eq!(subsets.created[0].status_norm(), "running");
        assert_eq!(subsets.completed.len(), 1);
        assert_eq!(subsets.completed[0].status_norm(), "done");
        assert_eq!(subsets.started.len(), 1);
        assert_eq!(subsets.started[0].status_norm(), "running");
    }

    #[test]
    fn relative_window_ends_at_anchor() {
        let rows = sample();
        let window = relative_window(&rows, 90).unwrap();
        assert_eq!(window.to(), at(12, 0));
        assert_eq!(window.from(), at(10, 30));
        assert_eq!(relative_window(&rows[3..], 60), Err(WindowError::NoAnchor));
    }

    #[test]
    fn sub_window_all_leaves_range_untouched() {
        let window = TimeWindow::new(at(9, 0), at(12, 0)).unwrap();
        assert_eq!(clip_to_sub_window(window, SubWindow::All), window);
    }

    #[test]
    fn sub_window_clips_front_but_never_below_explicit_from() {
        let window = TimeWindow::new(at(9, 0), at(12, 0)).unwrap();
        let clipped = clip_to_sub_window(window, SubWindow::Minutes(60));
        assert_eq!(clipped.from(), at(11, 0));
        assert_eq!(clipped.to(), at(12, 0));

        let wide = clip_to_sub_window(window, SubWindow::Minutes(600));
        assert_eq!(wide.from(), at(9, 0));
    }

    #[test]
    fn range_defaults_to_dataset_bounds() {
        let rows = sample();
        let window =
            range_window(&rows, &RangeRequest::default(), &DateNormalizer::default()).unwrap();
        assert_eq!(window.from(), at(7, 0));
        assert_eq!(window.to(), at(12, 0));
    }

    #[test]
    fn range_rejects_bad_and_inverted_bounds() {
        let rows = sample();
        let parser = DateNormalizer::default();

        let garbage = RangeRequest {
            from: Some("yesterday".to_string()),
            ..RangeRequest::default()
        };
        assert_eq!(
            range_window(&rows, &garbage, &parser),
            Err(WindowError::InvalidBounds)
        );

        let inverted = RangeRequest {
            from: Some("2024-01-01T12:00".to_string()),
            to: Some("2024-01-01T09:00".to_string()),
            sub_window: SubWindow::Minutes(60),
        };
        assert_eq!(
            range_window(&rows, &inverted, &parser),
            Err(WindowError::Inverted {
                from: at(12, 0),
                to: at(9, 0)
            })
        );

        assert_eq!(
            range_window(&[], &RangeRequest::default(), &parser),
            Err(WindowError::MissingBounds)
        );
    }

    #[test]
    fn windows_near_the_earliest_representable_date_saturate() {
        let parser = DateNormalizer::default();
        let earliest = parser.parse(Some("-262143-01-01 00:00:00"));
        assert!(earliest.is_some());
        let rows = vec![row(earliest, None, None, None, "done")];

        let window = relative_window(&rows, 60).unwrap();
        assert!(window.from() <= window.to());
        assert_eq!(window.to(), earliest.unwrap());
        assert_eq!(filter_window(&rows, &window).created.len(), 1);

        let request = RangeRequest {
            sub_window: SubWindow::Minutes(60),
            ..RangeRequest::default()
        };
        let clipped = range_window(&rows, &request, &parser).unwrap();
        assert_eq!(clipped.from(), earliest.unwrap());
        assert_eq!(filter_window(&rows, &clipped).created.len(), 1);
    }

    #[test]
    fn sub_window_parses_all_or_minutes() {
        assert_eq!("all".parse::<SubWindow>().unwrap(), SubWindow::All);
        assert_eq!(" 60 ".parse::<SubWindow>().unwrap(), SubWindow::Minutes(60));
        assert!("0".parse::<SubWindow>().is_err());
        assert!("hour".parse::<SubWindow>().is_err());
        assert_eq!(SubWindow::Minutes(15).to_string(), "15");
    }
}
