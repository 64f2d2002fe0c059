//! Summary report rendering.

pub mod pdf;

use chrono::NaiveDate;

use crate::config::ReportConfig;
use crate::error::ProcessError;

pub use pdf::PdfReportRenderer;

#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub pages: usize,
}

/// Renders a titled summary into a shareable document.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, title: &str, summary: &str) -> Result<RenderedReport, ProcessError>;

    fn content_type(&self) -> &'static str {
        "application/pdf"
    }
}

/// Report heading: `{title}` in the template becomes the record title,
/// falling back to the file stem.
pub fn report_title(config: &ReportConfig, title: Option<&str>, stem: &str) -> String {
    config
        .title_template
        .replace("{title}", title.unwrap_or(stem))
}

/// Archive file name: `{stem}` and `{date}` (YYYYMMDD) are substituted.
pub fn report_file_name(config: &ReportConfig, stem: &str, date: NaiveDate) -> String {
    config
        .file_name_template
        .replace("{stem}", stem)
        .replace("{date}", &date.format("%Y%m%d").to_string())
}
