pub mod chart;
pub mod html;
pub mod table;

pub use chart::*;
pub use html::*;
pub use table::*;

use repcount_core::{CoreError, LongRecord};
use std::path::Path;
use tracing::info;

/// Everything the report needs: the page title and the reshaped records.
pub struct Dashboard {
    title: String,
    records: Vec<LongRecord>,
}

impl Dashboard {
    pub fn new(screen_name: &str, records: Vec<LongRecord>) -> Self {
        Self {
            title: format!("@{screen_name} pushups"),
            records,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn records(&self) -> &[LongRecord] {
        &self.records
    }

    pub fn chart(&self) -> ChartSpec {
        ChartSpec::attempts_bar(&self.records).with_title(&self.title)
    }

    pub fn view(&self) -> Result<String, CoreError> {
        render_html(&self.chart(), &self.title)
    }

    pub fn table(&self) -> String {
        render_table(&self.records)
    }

    pub fn summary(&self) -> Vec<AttemptSummary> {
        summarize(&self.records)
    }

    /// Writes the HTML page to `path`, replacing any previous report.
    pub fn write_to(&self, path: &Path) -> Result<(), CoreError> {
        std::fs::write(path, self.view()?)?;
        info!(
            "Wrote chart with {} points to {}",
            self.records.len(),
            path.display()
        );
        Ok(())
    }
}
