use chrono::NaiveDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dates::{format_anchor, DateNormalizer};
use crate::ingest::LoadedDataset;
use crate::view::{empty_view, windowed_view, ViewMode, WindowedView};
use crate::window::{self, RangeRequest, WindowError};

pub const DEFAULT_WINDOW_MINUTES: u32 = 60;

/// Session state: the loaded row set and the last views computed from it.
///
/// There is exactly one writer. A failed load or a rejected window leaves whatever
/// was there before in place.
#[derive(Debug, Default)]
pub struct Dashboard {
    parser: DateNormalizer,
    dataset: Option<LoadedDataset>,
    window_minutes: u32,
    range: RangeRequest,
    relative_view: Option<WindowedView>,
    range_view: Option<WindowedView>,
    status: String,
}

impl Dashboard {
    pub fn new(parser: DateNormalizer, window_minutes: u32, range: RangeRequest) -> Self {
        Self {
            parser,
            window_minutes,
            range,
            ..Self::default()
        }
    }

    pub fn load_id(&self) -> Option<Uuid> {
        self.dataset.as_ref().map(|dataset| dataset.load_id)
    }

    pub fn dataset(&self) -> Option<&LoadedDataset> {
        self.dataset.as_ref()
    }

    pub fn relative_view(&self) -> Option<&WindowedView> {
        self.relative_view.as_ref()
    }

    pub fn range_view(&self) -> Option<&WindowedView> {
        self.range_view.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Dataset min and max, the defaults for the range inputs.
    pub fn bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let rows = &self.dataset.as_ref()?.rows;
        Some((window::min_instant(rows)?, window::max_instant(rows)?))
    }

    /// Installs the outcome of a load. On success the row set is replaced and both
    /// views are recomputed from it; on failure nothing changes.
    pub fn install_load(&mut self, result: anyhow::Result<LoadedDataset>) -> anyhow::Result<()> {
        let dataset = match result {
            Ok(dataset) => dataset,
            Err(err) => {
                warn!("error processing CSV: {err:#}");
                self.status = "Error processing the CSV".to_string();
                return Err(err);
            }
        };

        self.status = format!("CSV loaded: {} rows", dataset.rows.len());
        self.dataset = Some(dataset);
        self.relative_view = None;
        self.range_view = None;

        if let Err(err) = self.recompute_relative() {
            warn!("relative view unavailable: {err}");
        }
        if let Err(err) = self.recompute_range() {
            warn!("range view unavailable: {err}");
        }
        Ok(())
    }

    /// Replaces the range inputs. A rejected request keeps the previous inputs and
    /// the previous view.
    pub fn apply_range(&mut self, request: RangeRequest) -> Result<(), WindowError> {
        let previous = std::mem::replace(&mut self.range, request);
        let result = self.recompute_range();
        if result.is_err() {
            self.range = previous;
        }
        result
    }

    pub fn recompute_relative(&mut self) -> Result<(), WindowError> {
        let Some(dataset) = &self.dataset else {
            return Ok(());
        };
        if dataset.rows.is_empty() {
            self.relative_view = Some(empty_view(ViewMode::Relative));
            self.status = format!(
                "Relative view: window {} minutes, no rows loaded",
                self.window_minutes
            );
            return Ok(());
        }
        let window = match window::relative_window(&dataset.rows, self.window_minutes) {
            Ok(window) => window,
            Err(err) => {
                self.status = "Could not interpret the dates in the CSV".to_string();
                return Err(err);
            }
        };
        self.relative_view = Some(windowed_view(&dataset.rows, window, ViewMode::Relative));
        self.status = format!(
            "Relative view: window {} minutes, anchor = {}",
            self.window_minutes,
            format_anchor(window.to())
        );
        info!("{}", self.status);
        Ok(())
    }

    pub fn recompute_range(&mut self) -> Result<(), WindowError> {
        let Some(dataset) = &self.dataset else {
            return Ok(());
        };
        let window = match window::range_window(&dataset.rows, &self.range, &self.parser) {
            Ok(window) => window,
            Err(WindowError::MissingBounds) if dataset.rows.is_empty() => {
                self.range_view = Some(empty_view(ViewMode::Range));
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        info!(
            from = %format_anchor(window.from()),
            to = %format_anchor(window.to()),
            sub_window = %self.range.sub_window,
            "range view recomputed"
        );
        self.range_view = Some(windowed_view(&dataset.rows, window, ViewMode::Range));
        Ok(())
    }
}
