use std::fmt::Write;

use clap::ValueEnum;
use serde::Serialize;

use crate::dates::{format_anchor, format_datetime_local};
use crate::ingest::LoadedDataset;
use crate::models::{DateField, Kpis};
use crate::session::Dashboard;
use crate::view::WindowedView;

/// Placeholder shown for a KPI that has no data.
pub const NO_DATA: &str = "–";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Markdown,
    Json,
}

pub fn format_minutes(value: Option<f64>) -> String {
    value.map_or_else(|| NO_DATA.to_string(), |minutes| format!("{minutes:.1} min"))
}

pub fn format_hours(value: Option<f64>) -> String {
    value.map_or_else(|| NO_DATA.to_string(), |hours| format!("{hours:.1} h"))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// KPI values as the dashboard cards display them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiDisplay {
    pub created: String,
    pub finished: String,
    pub error: String,
    pub avg_processing: String,
    pub total_hours: String,
}

impl KpiDisplay {
    pub fn from_kpis(kpis: &Kpis) -> Self {
        Self {
            created: kpis.created_count.to_string(),
            finished: kpis.finished_count.to_string(),
            error: kpis.error_count.to_string(),
            avg_processing: format_minutes(kpis.avg_processing_minutes),
            total_hours: format_hours(kpis.total_hours),
        }
    }
}

#[derive(Serialize)]
struct PanelJson {
    display: KpiDisplay,
    #[serde(flatten)]
    view: WindowedView,
}

#[derive(Serialize)]
struct RangeDefaults {
    from: String,
    to: String,
}

#[derive(Serialize)]
struct ReportJson<'a> {
    source: Option<String>,
    load_id: Option<String>,
    status: &'a str,
    range_defaults: Option<RangeDefaults>,
    relative: Option<PanelJson>,
    range: Option<PanelJson>,
}

// Hours per day go to the chart rounded to two decimals.
fn panel(view: &WindowedView) -> PanelJson {
    let mut view = view.clone();
    view.hours_per_day.values = view.hours_per_day.values.iter().copied().map(round2).collect();
    PanelJson {
        display: KpiDisplay::from_kpis(&view.kpis),
        view,
    }
}

/// Both panels as JSON for a chart front end.
pub fn build_json(dashboard: &Dashboard) -> anyhow::Result<String> {
    let report = ReportJson {
        source: dashboard
            .dataset()
            .map(|dataset| dataset.source.display().to_string()),
        load_id: dashboard.load_id().map(|id| id.to_string()),
        status: dashboard.status(),
        range_defaults: dashboard.bounds().map(|(from, to)| RangeDefaults {
            from: format_datetime_local(from),
            to: format_datetime_local(to),
        }),
        relative: dashboard.relative_view().map(panel),
        range: dashboard.range_view().map(panel),
    };

    Ok(serde_json::to_string_pretty(&report)?)
}

pub fn write_kpi_lines(output: &mut String, kpis: &Kpis) {
    let display = KpiDisplay::from_kpis(kpis);
    let _ = writeln!(output, "- Created: {}", display.created);
    let _ = writeln!(output, "- Finished OK: {}", display.finished);
    let _ = writeln!(output, "- With error: {}", display.error);
    let _ = writeln!(output, "- Average processing time: {}", display.avg_processing);
    let _ = writeln!(output, "- Hours processed: {}", display.total_hours);
}

fn write_view(output: &mut String, title: &str, view: Option<&WindowedView>) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {title}");

    let Some(view) = view else {
        let _ = writeln!(output, "No view available for the current inputs.");
        return;
    };

    match view.window {
        Some(window) => {
            let _ = writeln!(
                output,
                "Window {} to {}",
                format_anchor(window.from()),
                format_anchor(window.to())
            );
        }
        None => {
            let _ = writeln!(output, "No rows loaded.");
        }
    }
    let _ = writeln!(output);
    write_kpi_lines(output, &view.kpis);

    let _ = writeln!(output);
    let _ = writeln!(output, "### Created per day");
    if view.created_per_day.is_empty() {
        let _ = writeln!(output, "No rows created in this window.");
    } else {
        for (day, count) in view.created_per_day.iter() {
            let _ = writeln!(output, "- {day}: {count}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "### Hours per day");
    if view.hours_per_day.is_empty() {
        let _ = writeln!(output, "No processed hours in this window.");
    } else {
        for (day, hours) in view.hours_per_day.iter() {
            let _ = writeln!(output, "- {day}: {:.2} h", round2(hours));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "### Outcomes");
    for (label, count) in view.outcomes.iter() {
        let _ = writeln!(output, "- {label}: {count}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "### Status distribution");
    if view.status_distribution.is_empty() {
        let _ = writeln!(output, "No completed rows in this window.");
    } else {
        for (status, count) in view.status_distribution.iter() {
            let _ = writeln!(output, "- {status}: {count}");
        }
    }

    if let Some(hourly) = &view.hourly {
        let _ = writeln!(output);
        let _ = writeln!(output, "### Finished and failed by half hour");
        let active: Vec<usize> = (0..hourly.labels.len())
            .filter(|index| hourly.success[*index] > 0 || hourly.fails[*index] > 0)
            .collect();
        if active.is_empty() {
            let _ = writeln!(output, "No finished or failed rows in this window.");
        } else {
            let _ = writeln!(output, "| Hour | Finished | Failed |");
            let _ = writeln!(output, "| --- | --- | --- |");
            for index in active {
                let _ = writeln!(
                    output,
                    "| {} | {} | {} |",
                    hourly.labels[index], hourly.success[index], hourly.fails[index]
                );
            }
        }
    }
}

pub fn write_diagnostics(output: &mut String, dataset: &LoadedDataset) {
    if dataset.diagnostics.total() == 0 {
        let _ = writeln!(output, "All timestamps parsed.");
        return;
    }
    for field in DateField::ALL {
        let failures = dataset.diagnostics.get(field);
        if failures > 0 {
            let _ = writeln!(output, "- {}: {} unparseable", field.label(), failures);
        }
    }
}

pub fn build_report(dashboard: &Dashboard) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Operational Event Report");
    match dashboard.dataset() {
        Some(dataset) => {
            let _ = writeln!(
                output,
                "Source {} ({} rows)",
                dataset.source.display(),
                dataset.rows.len()
            );
        }
        None => {
            let _ = writeln!(output, "No CSV loaded.");
        }
    }
    let _ = writeln!(output, "{}", dashboard.status());

    if let Some((from, to)) = dashboard.bounds() {
        let _ = writeln!(
            output,
            "Data spans {} to {}",
            format_datetime_local(from),
            format_datetime_local(to)
        );
    }

    write_view(&mut output, "Relative View", dashboard.relative_view());
    write_view(&mut output, "Range View", dashboard.range_view());

    if let Some(dataset) = dashboard.dataset() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Timestamp Diagnostics");
        write_diagnostics(&mut output, dataset);
    }

    output
}
