// Usage report: metrics over a result set and their HTML/text rendering.

mod format;
mod html;
mod metrics;

pub use format::{int_comma, natural_size};
pub use html::{render_html, render_text};
pub use metrics::{AccessLog, HistoricalMetrics, PeriodMetrics, RankedCount, UsageReport};

/// One point of the downloads/users trend shown at the top of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendPoint {
    /// Period file stem (`YYYY_MM_DD-YYYY_MM_DD`)
    pub label: String,
    pub downloads: u64,
    pub unique_users: u64,
}

/// Everything the renderer needs besides the metrics themselves.
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    /// Heading of the overall table and subject of the summary sentences
    pub service_name: String,
    /// Identifies the report in the footer (the period file stem)
    pub artifact_name: String,
    /// Download link for the published CSV, when the backend can presign
    pub csv_link: Option<String>,
    /// Oldest first, current period last
    pub trend: Vec<TrendPoint>,
}
