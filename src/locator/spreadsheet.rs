//! Spreadsheet locator using the `calamine` crate.
//!
//! Count workbooks carry a `Summary` worksheet with one block per peak
//! period. Blocks start at fixed anchor rows (32, 62, 92 for AM, MD, PM)
//! and every field sits at a constant cell offset from its block's anchor.

use std::io::Cursor;

use calamine::{Data, DataType, Range, Reader, open_workbook_auto_from_rs};
use chrono::{NaiveDate, NaiveTime};

use crate::error::{TmcError, TmcResult};
use crate::locator::{FieldLocator, parse_date, weather_word};
use crate::model::{Direction, DocumentFormat, Metric, PeriodLabel, TimeWindow, Volume};
use crate::period::classify_fixed_slot;

/// Worksheet holding the peak-hour totals.
pub const SUMMARY_SHEET: &str = "Summary";

/// Anchor row (1-based) of each period block.
const PERIOD_ROWS: [(usize, PeriodLabel); 3] = [
    (32, PeriodLabel::Am),
    (62, PeriodLabel::Md),
    (92, PeriodLabel::Pm),
];

/// Locator over the `Summary` worksheet of a count workbook.
pub struct SpreadsheetLocator {
    sheet: Range<Data>,
}

impl SpreadsheetLocator {
    /// Open a workbook from bytes and load its `Summary` worksheet.
    pub fn parse(data: &[u8]) -> TmcResult<Self> {
        let mut workbook =
            open_workbook_auto_from_rs(Cursor::new(data)).map_err(|e| TmcError::ParseError {
                format: "xlsx".into(),
                message: e.to_string(),
            })?;

        if !workbook.sheet_names().iter().any(|n| n == SUMMARY_SHEET) {
            return Err(TmcError::MissingSheet {
                name: SUMMARY_SHEET.into(),
            });
        }

        let sheet = workbook
            .worksheet_range(SUMMARY_SHEET)
            .map_err(|e| TmcError::ParseError {
                format: "xlsx".into(),
                message: e.to_string(),
            })?;

        Ok(Self::from_range(sheet))
    }

    /// Wrap an already loaded worksheet.
    pub fn from_range(sheet: Range<Data>) -> Self {
        Self { sheet }
    }

    /// Cell at an A1-style column and 1-based row.
    fn cell(&self, column: &str, row: usize) -> Option<&Data> {
        let col = column_index(column)?;
        let row = u32::try_from(row.checked_sub(1)?).ok()?;
        self.sheet
            .get_value((row, col))
            .filter(|d| !matches!(d, Data::Empty))
    }
}

/// Zero-based index of an A1 column name (`A` = 0, `AA` = 26).
fn column_index(column: &str) -> Option<u32> {
    if column.is_empty() {
        return None;
    }
    column
        .bytes()
        .try_fold(0u32, |acc, b| {
            b.is_ascii_uppercase()
                .then(|| acc * 26 + u32::from(b - b'A') + 1)
        })
        .map(|n| n - 1)
}

/// Column and row offset from the period anchor for each volume.
fn volume_cell(direction: Direction, metric: Metric) -> (&'static str, usize) {
    match (direction, metric) {
        (Direction::North, Metric::Bicycles) => ("M", 1),
        (Direction::North, Metric::Pedestrians) => ("L", 2),
        (Direction::North, Metric::Vehicles) => ("M", 0),
        (Direction::East, Metric::Bicycles) => ("AA", 12),
        (Direction::East, Metric::Pedestrians) => ("Z", 11),
        (Direction::East, Metric::Vehicles) => ("AB", 12),
        (Direction::South, Metric::Bicycles) => ("P", 26),
        (Direction::South, Metric::Pedestrians) => ("Q", 25),
        (Direction::South, Metric::Vehicles) => ("P", 27),
        (Direction::West, Metric::Bicycles) => ("B", 15),
        (Direction::West, Metric::Pedestrians) => ("C", 16),
        (Direction::West, Metric::Vehicles) => ("A", 15),
    }
}

fn cell_count(data: &Data) -> Option<Volume> {
    let n = match data {
        Data::Int(i) => u32::try_from(*i).ok(),
        Data::Float(f) if f.is_finite() && *f >= 0.0 && *f <= f64::from(u32::MAX) => {
            Some(f.round() as u32)
        }
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    n.map(Volume::Count)
}

fn cell_text(data: &Data) -> Option<String> {
    let text = match data {
        Data::String(s) => s.trim().to_string(),
        Data::Empty | Data::Error(_) => return None,
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn cell_date(data: &Data) -> Option<NaiveDate> {
    match data {
        Data::String(s) | Data::DateTimeIso(s) => {
            parse_date(s).or_else(|| s.get(..10).and_then(parse_date))
        }
        other => other.as_date(),
    }
}

fn cell_time(data: &Data) -> Option<NaiveTime> {
    match data {
        Data::String(s) | Data::DateTimeIso(s) => {
            let s = s.trim();
            NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .ok()
        }
        other => other.as_time(),
    }
}

impl FieldLocator for SpreadsheetLocator {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Spreadsheet
    }

    fn anchors(&self) -> Vec<usize> {
        PERIOD_ROWS.iter().map(|(row, _)| *row).collect()
    }

    fn classify(&self, anchor: usize, window: &TimeWindow) -> PeriodLabel {
        PERIOD_ROWS
            .iter()
            .find(|(row, _)| *row == anchor)
            .map_or(PeriodLabel::Unclassified, |(_, slot)| {
                classify_fixed_slot(*slot, window)
            })
    }

    fn locate_date(&self) -> Option<NaiveDate> {
        self.cell("N", 15).and_then(cell_date)
    }

    fn locate_weather(&self) -> Option<String> {
        self.cell("V", 8)
            .and_then(cell_text)
            .and_then(|text| weather_word(&text))
    }

    /// Workbooks do not record a survey type.
    fn locate_type(&self) -> Option<String> {
        None
    }

    fn locate_peak_window(&self, anchor: usize) -> Option<TimeWindow> {
        let start = self.cell("N", anchor + 15).and_then(cell_time)?;
        let end = self.cell("P", anchor + 15).and_then(cell_time)?;
        Some(TimeWindow::new(start, end))
    }

    fn locate_volume(
        &self,
        direction: Direction,
        metric: Metric,
        anchor: usize,
    ) -> Option<Volume> {
        let (column, offset) = volume_cell(direction, metric);
        self.cell(column, anchor + offset).and_then(cell_count)
    }
}
