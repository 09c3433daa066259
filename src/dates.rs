use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, Utc};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%dT%H:%M:%S",
    "%Y/%m/%dT%H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Display format used for range bounds (an HTML datetime-local value).
pub const DATETIME_LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// The zone whose wall clock all parsed instants are expressed in.
///
/// Timestamps without an offset are taken as already being wall-clock time in this
/// zone. Timestamps carrying an offset are converted into it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportZone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl ReportZone {
    fn wall_clock(&self, instant: DateTime<FixedOffset>) -> NaiveDateTime {
        match self {
            ReportZone::Local => instant.with_timezone(&Local).naive_local(),
            ReportZone::Fixed(offset) => instant.with_timezone(offset).naive_local(),
        }
    }
}

/// Parses `+HH:MM`, `-HH:MM`, `+HHMM`, `Z` or `UTC` into a fixed zone.
pub fn parse_utc_offset(value: &str) -> anyhow::Result<ReportZone> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(ReportZone::Fixed(Utc.fix()));
    }
    value
        .parse::<FixedOffset>()
        .map(ReportZone::Fixed)
        .map_err(|err| anyhow::anyhow!("UTC offset must look like +HH:MM, got {value:?}: {err}"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateNormalizer {
    zone: ReportZone,
}

impl DateNormalizer {
    pub fn new(zone: ReportZone) -> Self {
        Self { zone }
    }

    /// Lenient timestamp parse. Anything after the first `.` is discarded and the
    /// first space becomes the `T` separator before parsing. Never fails: unusable
    /// input gives `None`.
    pub fn parse(&self, value: Option<&str>) -> Option<NaiveDateTime> {
        let trimmed = value?.trim();
        if trimmed.is_empty() {
            return None;
        }

        let main_part = trimmed.split('.').next().unwrap_or_default();
        let iso_like = main_part.replacen(' ', "T", 1);
        if iso_like.is_empty() {
            return None;
        }

        if let Ok(instant) = DateTime::parse_from_rfc3339(&iso_like) {
            return Some(self.zone.wall_clock(instant));
        }
        if let Some(instant) = parse_with_short_offset(&iso_like) {
            return Some(self.zone.wall_clock(instant));
        }

        for format in NAIVE_FORMATS {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(&iso_like, format) {
                return Some(parsed);
            }
        }

        DATE_FORMATS.iter().find_map(|format| {
            NaiveDate::parse_from_str(&iso_like, format)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
    }
}

// Offsets on minute-precision timestamps, e.g. `2024-01-01T10:00Z` or
// `2024-01-01T10:00+02:00`, which RFC 3339 rejects.
fn parse_with_short_offset(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Some(stripped) = value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
        let naive = NaiveDateTime::parse_from_str(stripped, "%Y-%m-%dT%H:%M").ok()?;
        return Some(naive.and_utc().fixed_offset());
    }
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%:z")
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
}

pub fn format_datetime_local(value: NaiveDateTime) -> String {
    value.format(DATETIME_LOCAL_FORMAT).to_string()
}

pub fn format_anchor(value: NaiveDateTime) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> DateNormalizer {
        DateNormalizer::new(ReportZone::Fixed(FixedOffset::east_opt(0).unwrap()))
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn space_and_t_separators_are_equivalent() {
        let parser = DateNormalizer::default();
        let spaced = parser.parse(Some("2024-03-05 14:07:09"));
        let joined = parser.parse(Some("2024-03-05T14:07:09"));
        assert_eq!(spaced, joined);
        assert_eq!(spaced, Some(at(2024, 3, 5, 14, 7, 9)));
    }

    #[test]
    fn empty_missing_and_garbage_are_none() {
        let parser = DateNormalizer::default();
        assert_eq!(parser.parse(None), None);
        assert_eq!(parser.parse(Some("")), None);
        assert_eq!(parser.parse(Some("   ")), None);
        assert_eq!(parser.parse(Some("not a date")), None);
        assert_eq!(parser.parse(Some("2024-13-40 99:00:00")), None);
        assert_eq!(parser.parse(Some(".5")), None);
    }

    #[test]
    fn fraction_after_dot_is_dropped() {
        let parser = DateNormalizer::default();
        assert_eq!(
            parser.parse(Some(" 2024-01-01 10:00:00.123456 ")),
            Some(at(2024, 1, 1, 10, 0, 0))
        );
    }

    #[test]
    fn minute_precision_and_date_only_are_accepted() {
        let parser = DateNormalizer::default();
        assert_eq!(
            parser.parse(Some("2024-01-01 09:00")),
            Some(at(2024, 1, 1, 9, 0, 0))
        );
        assert_eq!(
            parser.parse(Some("2024/01/02 09:30:15")),
            Some(at(2024, 1, 2, 9, 30, 15))
        );
        assert_eq!(parser.parse(Some("2024-01-03")), Some(at(2024, 1, 3, 0, 0, 0)));
    }

    #[test]
    fn explicit_offsets_are_converted_into_report_zone() {
        assert_eq!(
            utc().parse(Some("2024-01-01T10:00:00+02:00")),
            Some(at(2024, 1, 1, 8, 0, 0))
        );
        assert_eq!(
            utc().parse(Some("2024-01-01T10:00:00Z")),
            Some(at(2024, 1, 1, 10, 0, 0))
        );
        assert_eq!(
            utc().parse(Some("2024-01-01T10:00-03:00")),
            Some(at(2024, 1, 1, 13, 0, 0))
        );

        let plus_five = parse_utc_offset("+05:00").unwrap();
        assert_eq!(
            DateNormalizer::new(plus_five).parse(Some("2024-01-01T23:30Z")),
            Some(at(2024, 1, 2, 4, 30, 0))
        );
    }

    #[test]
    fn utc_offset_parsing() {
        assert_eq!(
            parse_utc_offset("-03:00").unwrap(),
            ReportZone::Fixed(FixedOffset::west_opt(3 * 3600).unwrap())
        );
        assert_eq!(
            parse_utc_offset("+0530").unwrap(),
            ReportZone::Fixed(FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap())
        );
        assert_eq!(
            parse_utc_offset("utc").unwrap(),
            ReportZone::Fixed(FixedOffset::east_opt(0).unwrap())
        );
        assert!(parse_utc_offset("Z").is_ok());
        assert!(parse_utc_offset("03:00").is_err());
        assert!(parse_utc_offset("+3").is_err());
        assert!(parse_utc_offset("+01:75").is_err());
    }

    #[test]
    fn datetime_local_formatting_truncates_seconds() {
        assert_eq!(
            format_datetime_local(at(2024, 1, 1, 9, 5, 59)),
            "2024-01-01T09:05"
        );
        assert_eq!(format_anchor(at(2024, 1, 1, 9, 5, 59)), "2024-01-01 09:05:59");
    }
}
