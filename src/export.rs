//! Flat-table export of extracted records.
//!
//! One row per document: identity and row metadata, the document fields,
//! then for each of AM, MD, PM the availability flags, the peak window and
//! twelve volume cells. Cells of an unpopulated period are empty.

use std::io::Write;

use serde::Serialize;

use crate::assemble::Extracted;
use crate::error::{TmcError, TmcResult};
use crate::model::{Direction, Metric, PeriodEntry, PeriodLabel, RowMeta, TmcRecord};

/// Output encoding of the export table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emit {
    #[default]
    Csv,
    Json,
}

impl std::str::FromStr for Emit {
    type Err = TmcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(TmcError::Export {
                message: format!("unknown output encoding \"{other}\" (expected csv or json)"),
            }),
        }
    }
}

// ── Table shape ─────────────────────────────────────────────────────────

const LEADING_COLUMNS: [&str; 7] = [
    "identity",
    "intersection",
    "longitude",
    "latitude",
    "date",
    "weather",
    "type",
];

/// Column names in output order.
pub fn header() -> Vec<String> {
    let mut columns: Vec<String> = LEADING_COLUMNS.iter().map(|c| c.to_string()).collect();
    for label in PeriodLabel::PERIODS {
        columns.push(format!("{label}_available"));
        columns.push(format!("{label}_scraped"));
        columns.push(format!("{label}_peak_hour"));
        for direction in Direction::ALL {
            for metric in Metric::ALL {
                columns.push(format!("{label}_{direction}_{}", metric.column_token()));
            }
        }
    }
    columns
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn period_cells(entry: Option<&PeriodEntry>, out: &mut Vec<String>) {
    let (available, scraped) = entry.map_or((false, false), |e| (e.available, e.scraped));
    out.push(available.to_string());
    out.push(scraped.to_string());

    let block = entry.and_then(|e| e.block.as_ref());
    out.push(opt(block.and_then(|b| b.peak_window)));
    for direction in Direction::ALL {
        for metric in Metric::ALL {
            out.push(opt(block.and_then(|b| b.approaches.volume(direction, metric))));
        }
    }
}

/// Flatten one record into cells matching [`header`].
pub fn row(identity: &str, meta: &RowMeta, record: &TmcRecord) -> Vec<String> {
    let mut cells = vec![
        identity.to_string(),
        meta.intersection.clone().unwrap_or_default(),
        opt(meta.longitude),
        opt(meta.latitude),
        opt(record.date),
        record.weather.clone().unwrap_or_default(),
        record.survey_type.clone().unwrap_or_default(),
    ];
    for label in PeriodLabel::PERIODS {
        period_cells(record.period(label), &mut cells);
    }
    cells
}

// ── Writers ─────────────────────────────────────────────────────────────

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_csv_row<W: Write>(w: &mut W, cells: &[String]) -> std::io::Result<()> {
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    writeln!(w)
}

/// Write records as CSV.
pub fn write_csv<W: Write>(mut w: W, records: &[Extracted], include_headers: bool) -> TmcResult<()> {
    if include_headers {
        write_csv_row(&mut w, &header())?;
    }
    for extracted in records {
        write_csv_row(
            &mut w,
            &row(&extracted.identity, &extracted.meta, &extracted.record),
        )?;
    }
    w.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct JsonRow<'a> {
    identity: &'a str,
    #[serde(flatten)]
    meta: &'a RowMeta,
    #[serde(flatten)]
    record: &'a TmcRecord,
}

/// Write records as a pretty-printed JSON array.
pub fn write_json<W: Write>(mut w: W, records: &[Extracted]) -> TmcResult<()> {
    let rows: Vec<JsonRow<'_>> = records
        .iter()
        .map(|e| JsonRow {
            identity: &e.identity,
            meta: &e.meta,
            record: &e.record,
        })
        .collect();
    serde_json::to_writer_pretty(&mut w, &rows).map_err(|e| TmcError::Export {
        message: e.to_string(),
    })?;
    writeln!(w)?;
    w.flush()?;
    Ok(())
}

/// Write records in the requested encoding.
pub fn write<W: Write>(w: W, records: &[Extracted], emit: Emit, include_headers: bool) -> TmcResult<()> {
    match emit {
        Emit::Csv => write_csv(w, records, include_headers),
        Emit::Json => write_json(w, records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Approaches, PeriodBlock, TimeWindow, Volume};
    use chrono::NaiveDate;

    fn record() -> TmcRecord {
        let mut approaches = Approaches::default();
        approaches
            .get_mut(Direction::North)
            .set(Metric::Vehicles, Some(Volume::Count(120)));
        approaches
            .get_mut(Direction::West)
            .set(Metric::Vehicles, Some(Volume::ManualReview));

        let entry = |label, available, scraped, block| PeriodEntry {
            label,
            available,
            scraped,
            block,
        };
        TmcRecord {
            date: NaiveDate::from_ymd_opt(2019, 5, 14),
            weather: Some("overcast".into()),
            survey_type: Some("Manual, Turning".into()),
            periods: [
                entry(
                    PeriodLabel::Am,
                    true,
                    true,
                    Some(PeriodBlock {
                        peak_window: TimeWindow::parse("07:45 - 08:45"),
                        approaches,
                    }),
                ),
                entry(PeriodLabel::Md, true, false, None),
                entry(PeriodLabel::Pm, false, true, None),
            ],
        }
    }

    fn extracted() -> Extracted {
        Extracted {
            identity: "count-7.pdf".into(),
            meta: RowMeta::new("Main & 1st").with_geom("POINT (-122.5 45.25)"),
            record: record(),
        }
    }

    #[test]
    fn header_layout() {
        let h = header();
        assert_eq!(h.len(), 7 + 3 * 15);
        assert_eq!(h[7], "AM_available");
        assert_eq!(h[9], "AM_peak_hour");
        assert_eq!(h[10], "AM_north_peds");
        assert_eq!(h[12], "AM_north_veh");
        assert_eq!(h[21], "AM_west_veh");
        assert_eq!(h[22], "MD_available");
        assert_eq!(h.last().map(String::as_str), Some("PM_west_veh"));
    }

    #[test]
    fn row_matches_header() {
        let e = extracted();
        let cells = row(&e.identity, &e.meta, &e.record);
        let h = header();
        assert_eq!(cells.len(), h.len());

        let at = |name: &str| cells[h.iter().position(|c| c == name).unwrap()].as_str();
        assert_eq!(at("longitude"), "-122.5");
        assert_eq!(at("date"), "2019-05-14");
        assert_eq!(at("AM_peak_hour"), "07:45 - 08:45");
        assert_eq!(at("AM_north_veh"), "120");
        assert_eq!(at("AM_west_veh"), "manual_check");
        assert_eq!(at("AM_east_veh"), "");
        assert_eq!(at("MD_available"), "true");
        assert_eq!(at("MD_scraped"), "false");
        assert_eq!(at("MD_peak_hour"), "");
        assert_eq!(at("PM_scraped"), "true");
    }

    #[test]
    fn csv_quotes_commas() {
        let mut out = Vec::new();
        write_csv(&mut out, &[extracted()], true).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("identity,intersection,longitude"));
        assert!(lines[1].contains("\"Manual, Turning\""));
    }

    #[test]
    fn csv_without_headers() {
        let mut out = Vec::new();
        write_csv(&mut out, &[extracted()], false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("count-7.pdf,"));
    }

    #[test]
    fn json_rows() {
        let mut out = Vec::new();
        write_json(&mut out, &[extracted()]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let first = &value[0];
        assert_eq!(first["identity"], "count-7.pdf");
        assert_eq!(first["intersection"], "Main & 1st");
        assert_eq!(first["type"], "Manual, Turning");
        assert_eq!(first["periods"][0]["label"], "AM");
        assert_eq!(
            first["periods"][0]["block"]["approaches"]["west"]["vehicles"],
            "manual_check"
        );
        assert!(first["periods"][1]["block"].is_null());
    }

    #[test]
    fn emit_parsing() {
        assert_eq!("CSV".parse::<Emit>().unwrap(), Emit::Csv);
        assert_eq!("json".parse::<Emit>().unwrap(), Emit::Json);
        assert!("xml".parse::<Emit>().is_err());
    }
}
