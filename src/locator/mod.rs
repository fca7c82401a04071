//! Field locator trait and format dispatch.
//!
//! Each survey format (markup, spreadsheet, PDF text) implements
//! [`FieldLocator`] with its own addressing scheme. `locator_for()` parses a
//! payload and returns the locator for its declared format.

pub mod html;
pub mod pdf;
pub mod spreadsheet;

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::error::TmcResult;
use crate::model::{
    Approaches, Direction, DocumentFormat, Metric, PeriodLabel, TimeWindow, Volume,
};
use crate::period::classify_by_start_hour;

/// Format-specific access to the scalar fields of a parsed survey.
///
/// Every lookup is total: a field that is not where the format expects it
/// comes back as `None` and never fails the document.
pub trait FieldLocator {
    /// The format this locator reads.
    fn format(&self) -> DocumentFormat;

    /// Candidate period anchors, in detection order.
    fn anchors(&self) -> Vec<usize>;

    /// Label the window found at `anchor`.
    fn classify(&self, _anchor: usize, window: &TimeWindow) -> PeriodLabel {
        classify_by_start_hour(window)
    }

    fn locate_date(&self) -> Option<NaiveDate>;

    fn locate_weather(&self) -> Option<String>;

    fn locate_type(&self) -> Option<String>;

    fn locate_peak_window(&self, anchor: usize) -> Option<TimeWindow>;

    fn locate_volume(&self, direction: Direction, metric: Metric, anchor: usize)
    -> Option<Volume>;

    /// All twelve directional volumes for the period at `anchor`.
    fn locate_approaches(&self, anchor: usize) -> Approaches {
        let mut approaches = Approaches::default();
        for direction in Direction::ALL {
            let volumes = approaches.get_mut(direction);
            for metric in Metric::ALL {
                volumes.set(metric, self.locate_volume(direction, metric, anchor));
            }
        }
        approaches
    }
}

/// Parse `data` and return the locator for `format`.
pub fn locator_for(format: DocumentFormat, data: &[u8]) -> TmcResult<Box<dyn FieldLocator>> {
    match format {
        DocumentFormat::Html => Ok(Box::new(html::HtmlLocator::parse(data)?)),
        DocumentFormat::Spreadsheet => Ok(Box::new(spreadsheet::SpreadsheetLocator::parse(data)?)),
        DocumentFormat::Pdf => Ok(Box::new(pdf::PdfLocator::parse(data)?)),
    }
}

/// Detect the survey format from a file extension.
pub fn detect_format(path: &str) -> Option<DocumentFormat> {
    let lower = path.to_lowercase();
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        Some(DocumentFormat::Html)
    } else if lower.ends_with(".xlsx") || lower.ends_with(".xlsm") || lower.ends_with(".xls") {
        Some(DocumentFormat::Spreadsheet)
    } else if lower.ends_with(".pdf") || lower.ends_with(".txt") {
        Some(DocumentFormat::Pdf)
    } else {
        None
    }
}

// ── Shared field decoders ───────────────────────────────────────────────

static RE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Every run of ASCII digits in `text`, in order. A run too long for `u64`
/// saturates instead of being dropped, so positions stay stable.
pub(crate) fn digit_runs(text: &str) -> Vec<u64> {
    RE_DIGITS
        .find_iter(text)
        .map(|m| m.as_str().parse().unwrap_or(u64::MAX))
        .collect()
}

/// Weather is recorded as one lower-cased word: the last word of the
/// weather text, so "Weather: Partly Cloudy" reads as `cloudy`.
pub(crate) fn weather_word(text: &str) -> Option<String> {
    text.split_whitespace().last().map(str::to_lowercase)
}

const DATE_FORMATS: &[&str] = &[
    "%A, %B %d, %Y",
    "%a, %b %d, %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%b-%Y",
    "%d-%b-%y",
];

/// Parse a survey date written in any of the layouts seen across formats.
pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&text, fmt).ok())
        .or_else(|| {
            NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}
