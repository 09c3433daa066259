use serde::Serialize;
use tracing::debug;

use crate::buckets;
use crate::kpi;
use crate::models::{DateField, EnrichedRow, HourlyHistogram, Kpis, Series};
use crate::window::{filter_window, TimeWindow, WindowSubsets};

pub const OUTCOME_LABELS: [&str; 3] = ["Finished OK", "With error", "Other"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Relative,
    Range,
}

impl ViewMode {
    fn includes_hourly(self) -> bool {
        matches!(self, ViewMode::Range)
    }
}

/// Everything one dashboard panel shows for a window. `window` is `None` when the
/// loaded CSV has no rows to anchor one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowedView {
    pub mode: ViewMode,
    pub window: Option<TimeWindow>,
    pub kpis: Kpis,
    pub created_per_day: Series,
    pub hours_per_day: Series,
    pub status_distribution: Series,
    pub outcomes: Series,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly: Option<HourlyHistogram>,
}

pub fn windowed_view(rows: &[EnrichedRow], window: TimeWindow, mode: ViewMode) -> WindowedView {
    let subsets = filter_window(rows, &window);
    debug!(
        ?mode,
        created = subsets.created.len(),
        completed = subsets.completed.len(),
        started = subsets.started.len(),
        "window filtered"
    );
    assemble(&subsets, Some(window), mode)
}

/// The panel for a dataset with no rows: "no data" KPIs and empty series.
pub fn empty_view(mode: ViewMode) -> WindowedView {
    assemble(&WindowSubsets::default(), None, mode)
}

fn assemble(
    subsets: &WindowSubsets<'_>,
    window: Option<TimeWindow>,
    mode: ViewMode,
) -> WindowedView {
    let kpis = kpi::aggregate(subsets);
    let status_distribution = Series {
        labels: kpis.status_counts.keys().cloned().collect(),
        values: kpis.status_counts.values().map(|count| *count as f64).collect(),
    };
    let outcomes = Series {
        labels: OUTCOME_LABELS.iter().map(|label| label.to_string()).collect(),
        values: vec![
            kpis.finished_count as f64,
            kpis.error_count as f64,
            kpis.other_count as f64,
        ],
    };

    WindowedView {
        mode,
        window,
        created_per_day: buckets::count_by_day(&subsets.created, DateField::Created),
        hours_per_day: buckets::hours_by_day(&subsets.started, DateField::Start, DateField::End),
        hourly: mode
            .includes_hourly()
            .then(|| buckets::hourly_success_failure(&subsets.created)),
        status_distribution,
        outcomes,
        kpis,
    }
}
