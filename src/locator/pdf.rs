//! PDF locator over the text layer of the first page.
//!
//! Raw PDF bytes are linearized with `pdf-extract`; a payload without the
//! `%PDF` magic is taken to be that linearization already. The text is cut
//! into one segment per `Maximum Hour` marker and each period's fields are
//! pulled from its segment with regular expressions.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::disambiguate::{VehicleVolumes, disambiguate};
use crate::error::{TmcError, TmcResult};
use crate::locator::{FieldLocator, parse_date};
use crate::model::{
    ApproachVolumes, Approaches, Direction, DocumentFormat, Metric, TimeWindow, Volume,
};

/// Literal that opens every period block.
const PERIOD_MARKER: &str = "Maximum Hour";

/// Number of keyword-tagged pedestrian/bicycle counts per period.
const TAGGED_COUNTS: usize = 8;

static RE_PERIOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Maximum Hour\s*(\d{2}:\d{2} - \d{2}:\d{2})").unwrap());

static RE_TAGGED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:Bikes|Peds|PEDs)\s*(\d+)").unwrap());

static RE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+,\s+\w+\s+\d{1,2},\s+\d{4}\b").unwrap());

static RE_WEATHER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Weather:\s+(\w+)").unwrap());

static RE_TYPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((.*?)\)").unwrap());

/// Locator over a linearized survey page.
pub struct PdfLocator {
    text: String,
    /// Peak windows in page order; the index is the period anchor.
    windows: Vec<Option<TimeWindow>>,
    /// Text following each period marker, same indexing as `windows`.
    segments: Vec<String>,
}

impl PdfLocator {
    /// Decode raw PDF bytes or accept an existing text dump.
    pub fn parse(data: &[u8]) -> TmcResult<Self> {
        let text = if data.starts_with(b"%PDF") {
            let all_pages =
                pdf_extract::extract_text_from_mem(data).map_err(|e| TmcError::ParseError {
                    format: "pdf".into(),
                    message: e.to_string(),
                })?;
            // Pages are separated by form feeds; counts live on the first.
            all_pages
                .split('\x0C')
                .next()
                .unwrap_or_default()
                .to_string()
        } else {
            String::from_utf8_lossy(data).into_owned()
        };

        if text.trim().is_empty() {
            return Err(TmcError::EmptyDocument {
                origin: "(pdf)".into(),
            });
        }

        Ok(Self::from_text(text))
    }

    /// Build a locator from page text.
    pub fn from_text(text: String) -> Self {
        let windows = RE_PERIOD
            .captures_iter(&text)
            .map(|caps| TimeWindow::parse(&caps[1]))
            .collect();
        let segments = text
            .split(PERIOD_MARKER)
            .skip(1)
            .map(str::to_string)
            .collect();

        Self {
            text,
            windows,
            segments,
        }
    }

    fn segment(&self, anchor: usize) -> Option<&str> {
        self.segments.get(anchor).map(String::as_str)
    }

    /// First eight keyword-tagged counts of a period, in page order:
    /// north ped/bike, west ped/bike, east ped/bike, south ped/bike.
    fn tagged_counts(&self, anchor: usize) -> Vec<u64> {
        let Some(segment) = self.segment(anchor) else {
            return Vec::new();
        };
        RE_TAGGED
            .captures_iter(segment)
            .map(|caps| caps[1].parse().unwrap_or(u64::MAX))
            .take(TAGGED_COUNTS)
            .collect()
    }

    fn vehicles(&self, anchor: usize) -> VehicleVolumes {
        self.segment(anchor).map(disambiguate).unwrap_or_default()
    }
}

/// Position of a pedestrian or bicycle count in the tagged list.
fn tagged_position(direction: Direction, metric: Metric) -> Option<usize> {
    let base = match direction {
        Direction::North => 0,
        Direction::West => 2,
        Direction::East => 4,
        Direction::South => 6,
    };
    match metric {
        Metric::Pedestrians => Some(base),
        Metric::Bicycles => Some(base + 1),
        Metric::Vehicles => None,
    }
}

fn vehicle_for(vehicles: &VehicleVolumes, direction: Direction) -> Option<Volume> {
    match direction {
        Direction::North => vehicles.north,
        Direction::East => vehicles.east,
        Direction::South => vehicles.south,
        Direction::West => vehicles.west,
    }
}

impl FieldLocator for PdfLocator {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn anchors(&self) -> Vec<usize> {
        (0..self.windows.len()).collect()
    }

    fn locate_date(&self) -> Option<NaiveDate> {
        RE_DATE
            .find(&self.text)
            .and_then(|m| parse_date(m.as_str()))
    }

    fn locate_weather(&self) -> Option<String> {
        RE_WEATHER
            .captures(&self.text)
            .map(|caps| caps[1].trim().to_lowercase())
    }

    fn locate_type(&self) -> Option<String> {
        RE_TYPE.captures(&self.text).map(|caps| caps[1].to_string())
    }

    fn locate_peak_window(&self, anchor: usize) -> Option<TimeWindow> {
        self.windows.get(anchor).copied().flatten()
    }

    fn locate_volume(
        &self,
        direction: Direction,
        metric: Metric,
        anchor: usize,
    ) -> Option<Volume> {
        match tagged_position(direction, metric) {
            Some(pos) => self
                .tagged_counts(anchor)
                .get(pos)
                .copied()
                .map(Volume::from_raw),
            None => vehicle_for(&self.vehicles(anchor), direction),
        }
    }

    /// Scans the segment once for all twelve volumes.
    fn locate_approaches(&self, anchor: usize) -> Approaches {
        let tagged = self.tagged_counts(anchor);
        let vehicles = self.vehicles(anchor);

        let mut approaches = Approaches::default();
        for direction in Direction::ALL {
            let at = |metric| {
                tagged_position(direction, metric)
                    .and_then(|pos| tagged.get(pos).copied())
                    .map(Volume::from_raw)
            };
            *approaches.get_mut(direction) = ApproachVolumes {
                pedestrians: at(Metric::Pedestrians),
                bicycles: at(Metric::Bicycles),
                vehicles: vehicle_for(&vehicles, direction),
            };
        }
        approaches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PeriodLabel;

    const PAGE: &str = "City Engineering - Intersection Count (Manual Turning Movement)\n\
        Tuesday, May 14, 2019\n\
        Weather: Overcast skies\n\
        Maximum Hour\n07:45 - 08:45\n\
        PEDs 4 120 35\nBikes 2\n\
        Peds 6 210 210 95 95 Peds 3\nBikes 1\n\
        Bikes 5 300 280 PEDs 7 Bikes 8\n\
        Maximum Hour\n16:30 - 17:30\n\
        PEDs 10 140\nBikes 3\n\
        Peds 9 60 88 Peds 12\nBikes 4\n\
        Bikes 6 90 PEDs 13 Bikes 14\n";

    fn locator() -> PdfLocator {
        PdfLocator::parse(PAGE.as_bytes()).unwrap()
    }

    #[test]
    fn document_fields() {
        let loc = locator();
        assert_eq!(loc.locate_date(), NaiveDate::from_ymd_opt(2019, 5, 14));
        assert_eq!(loc.locate_weather().as_deref(), Some("overcast"));
        assert_eq!(
            loc.locate_type().as_deref(),
            Some("Manual Turning Movement")
        );
    }

    #[test]
    fn windows_by_marker() {
        let loc = locator();
        assert_eq!(loc.anchors(), vec![0, 1]);
        let am = loc.locate_peak_window(0).unwrap();
        let pm = loc.locate_peak_window(1).unwrap();
        assert_eq!(loc.classify(0, &am), PeriodLabel::Am);
        assert_eq!(loc.classify(1, &pm), PeriodLabel::Pm);
        assert_eq!(loc.locate_peak_window(2), None);
    }

    #[test]
    fn tagged_counts_in_page_order() {
        let loc = locator();
        assert_eq!(loc.tagged_counts(0), vec![4, 2, 6, 3, 1, 5, 7, 8]);
        assert_eq!(
            loc.locate_volume(Direction::North, Metric::Pedestrians, 0),
            Some(Volume::Count(4))
        );
        assert_eq!(
            loc.locate_volume(Direction::West, Metric::Bicycles, 0),
            Some(Volume::Count(3))
        );
        assert_eq!(
            loc.locate_volume(Direction::South, Metric::Bicycles, 0),
            Some(Volume::Count(8))
        );
    }

    #[test]
    fn vehicles_from_runs() {
        let loc = locator();
        let am = loc.locate_approaches(0);
        assert_eq!(am.north.vehicles, Some(Volume::Count(120)));
        assert_eq!(am.west.vehicles, Some(Volume::Count(210)));
        assert_eq!(am.east.vehicles, Some(Volume::Count(95)));
        assert_eq!(am.south.vehicles, Some(Volume::Count(300)));

        let pm = loc.locate_approaches(1);
        assert_eq!(pm.north.vehicles, Some(Volume::Count(140)));
        assert_eq!(pm.west.vehicles, Some(Volume::ManualReview));
        assert_eq!(pm.east.vehicles, Some(Volume::ManualReview));
        assert_eq!(pm.south.vehicles, Some(Volume::Count(90)));
    }

    #[test]
    fn approaches_match_single_lookups() {
        let loc = locator();
        let all = loc.locate_approaches(0);
        for direction in Direction::ALL {
            for metric in Metric::ALL {
                assert_eq!(
                    all.volume(direction, metric),
                    loc.locate_volume(direction, metric, 0),
                    "{direction} {metric}"
                );
            }
        }
    }

    #[test]
    fn short_segment_is_absent() {
        let loc = PdfLocator::from_text("Maximum Hour 07:00 - 08:00 PEDs 3".into());
        assert_eq!(
            loc.locate_volume(Direction::North, Metric::Pedestrians, 0),
            Some(Volume::Count(3))
        );
        assert_eq!(loc.locate_volume(Direction::North, Metric::Bicycles, 0), None);
        assert_eq!(loc.locate_volume(Direction::North, Metric::Vehicles, 0), None);
    }

    #[test]
    fn blank_text_fails() {
        assert!(PdfLocator::parse(b"   \n").is_err());
    }
}
