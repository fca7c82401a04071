//! Core data types for traffic movement counts.
//!
//! A survey document is reduced to one [`TmcRecord`]: document-level fields
//! plus, per peak period, availability flags and (when populated) a peak
//! window and four [`ApproachVolumes`].

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime, TimeDelta, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::TmcError;

/// Token written wherever a volume needs a human to read the source.
pub const MANUAL_REVIEW_TOKEN: &str = "manual_check";

// ── Formats ─────────────────────────────────────────────────────────────

/// Supported survey document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Rendered markup pages from the pre-2012 surveys.
    Html,
    /// Summary workbooks.
    Spreadsheet,
    /// Page-formatted PDF, either raw bytes or its text linearization.
    Pdf,
}

impl DocumentFormat {
    /// Human-readable name for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Spreadsheet => "xlsx",
            Self::Pdf => "pdf",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentFormat {
    type Err = TmcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" | "htm" | "markup" => Ok(Self::Html),
            "xlsx" | "spreadsheet" => Ok(Self::Spreadsheet),
            "pdf" | "pdf-text" => Ok(Self::Pdf),
            other => Err(TmcError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

// ── Periods ─────────────────────────────────────────────────────────────

/// Daily peak period a time window belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PeriodLabel {
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "MD")]
    Md,
    #[serde(rename = "PM")]
    Pm,
    #[serde(rename = "UNCLASSIFIED")]
    Unclassified,
}

impl PeriodLabel {
    /// The three classifiable periods, in output order.
    pub const PERIODS: [PeriodLabel; 3] = [Self::Am, Self::Md, Self::Pm];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Am => "AM",
            Self::Md => "MD",
            Self::Pm => "PM",
            Self::Unclassified => "UNCLASSIFIED",
        }
    }

    /// Position in [`Self::PERIODS`], `None` for `Unclassified`.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Am => Some(0),
            Self::Md => Some(1),
            Self::Pm => Some(2),
            Self::Unclassified => None,
        }
    }
}

impl std::fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodLabel {
    type Err = TmcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AM" => Ok(Self::Am),
            "MD" => Ok(Self::Md),
            "PM" => Ok(Self::Pm),
            other => Err(TmcError::InvalidPeriod {
                label: other.to_string(),
            }),
        }
    }
}

/// Set of periods the caller wants populated. Defaults to all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodFilter {
    requested: [bool; 3],
}

impl PeriodFilter {
    pub fn all() -> Self {
        Self {
            requested: [true; 3],
        }
    }

    pub fn none() -> Self {
        Self {
            requested: [false; 3],
        }
    }

    /// Filter requesting exactly `labels`. `Unclassified` is ignored.
    pub fn only(labels: &[PeriodLabel]) -> Self {
        let mut requested = [false; 3];
        for idx in labels.iter().filter_map(PeriodLabel::index) {
            requested[idx] = true;
        }
        Self { requested }
    }

    pub fn contains(&self, label: PeriodLabel) -> bool {
        label.index().is_some_and(|i| self.requested[i])
    }

    /// Requested labels in output order.
    pub fn labels(&self) -> Vec<PeriodLabel> {
        PeriodLabel::PERIODS
            .into_iter()
            .filter(|l| self.contains(*l))
            .collect()
    }
}

impl Default for PeriodFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl FromStr for PeriodFilter {
    type Err = TmcError;

    /// Parse a comma list such as `"AM,PM"`. An empty string requests nothing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let labels = s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PeriodLabel::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::only(&labels))
    }
}

/// Start and end clock times of a peak hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

static RE_WINDOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}:\d{2})(?::\d{2})?\s*-\s*(\d{1,2}:\d{2})(?::\d{2})?").unwrap()
});

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse the first `HH:MM - HH:MM` occurrence in `text`.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = RE_WINDOW.captures(text)?;
        let start = NaiveTime::parse_from_str(&caps[1], "%H:%M").ok()?;
        let end = NaiveTime::parse_from_str(&caps[2], "%H:%M").ok()?;
        Some(Self { start, end })
    }

    pub fn duration(&self) -> TimeDelta {
        self.end.signed_duration_since(self.start)
    }

    pub fn start_hour(&self) -> u32 {
        self.start.hour()
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

// ── Volumes ─────────────────────────────────────────────────────────────

/// Compass approach into the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Self::North, Self::East, Self::South, Self::West];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is being counted on an approach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Pedestrians,
    Bicycles,
    Vehicles,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Self::Pedestrians, Self::Bicycles, Self::Vehicles];

    /// Short token used in column names.
    pub fn column_token(&self) -> &'static str {
        match self {
            Self::Pedestrians => "peds",
            Self::Bicycles => "bikes",
            Self::Vehicles => "veh",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column_token())
    }
}

/// A located count, or the marker for a count that cannot be resolved
/// without reading the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Volume {
    Count(u32),
    ManualReview,
}

impl Volume {
    /// A count read from document text. Numbers too large for a count are
    /// kept as a position in their run but need a human to read them.
    pub fn from_raw(n: u64) -> Self {
        u32::try_from(n).map_or(Self::ManualReview, Self::Count)
    }
}

impl std::fmt::Display for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::ManualReview => f.write_str(MANUAL_REVIEW_TOKEN),
        }
    }
}

impl Serialize for Volume {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Count(n) => serializer.serialize_u32(*n),
            Self::ManualReview => serializer.serialize_str(MANUAL_REVIEW_TOKEN),
        }
    }
}

/// Counts for one approach. `None` means the count was not recoverable,
/// which is distinct from a count of zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApproachVolumes {
    pub pedestrians: Option<Volume>,
    pub bicycles: Option<Volume>,
    pub vehicles: Option<Volume>,
}

impl ApproachVolumes {
    pub fn get(&self, metric: Metric) -> Option<Volume> {
        match metric {
            Metric::Pedestrians => self.pedestrians,
            Metric::Bicycles => self.bicycles,
            Metric::Vehicles => self.vehicles,
        }
    }

    pub fn set(&mut self, metric: Metric, value: Option<Volume>) {
        match metric {
            Metric::Pedestrians => self.pedestrians = value,
            Metric::Bicycles => self.bicycles = value,
            Metric::Vehicles => self.vehicles = value,
        }
    }
}

/// Approach volumes for all four directions, indexed by [`Direction`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Approaches {
    pub north: ApproachVolumes,
    pub east: ApproachVolumes,
    pub south: ApproachVolumes,
    pub west: ApproachVolumes,
}

impl Approaches {
    pub fn get(&self, direction: Direction) -> &ApproachVolumes {
        match direction.index() {
            0 => &self.north,
            1 => &self.east,
            2 => &self.south,
            _ => &self.west,
        }
    }

    pub fn get_mut(&mut self, direction: Direction) -> &mut ApproachVolumes {
        match direction.index() {
            0 => &mut self.north,
            1 => &mut self.east,
            2 => &mut self.south,
            _ => &mut self.west,
        }
    }

    pub fn volume(&self, direction: Direction, metric: Metric) -> Option<Volume> {
        self.get(direction).get(metric)
    }
}

// ── Records ─────────────────────────────────────────────────────────────

/// Populated fields of one peak period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodBlock {
    pub peak_window: Option<TimeWindow>,
    pub approaches: Approaches,
}

/// Per-period section of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodEntry {
    pub label: PeriodLabel,
    /// A window for this period was found in the source.
    pub available: bool,
    /// The caller's filter requested this period.
    pub scraped: bool,
    /// Present only when `available && scraped`.
    pub block: Option<PeriodBlock>,
}

/// Canonical output for one survey document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TmcRecord {
    pub date: Option<NaiveDate>,
    /// Lower-cased single word, e.g. `"sunny"`.
    pub weather: Option<String>,
    #[serde(rename = "type")]
    pub survey_type: Option<String>,
    /// One entry per label in [`PeriodLabel::PERIODS`] order.
    pub periods: [PeriodEntry; 3],
}

impl TmcRecord {
    pub fn period(&self, label: PeriodLabel) -> Option<&PeriodEntry> {
        label.index().map(|i| &self.periods[i])
    }

    /// Populated block for `label`, if any.
    pub fn block(&self, label: PeriodLabel) -> Option<&PeriodBlock> {
        self.period(label).and_then(|p| p.block.as_ref())
    }
}

// ── Inputs ──────────────────────────────────────────────────────────────

/// A retrieved survey document, tagged with its declared format.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Caller-chosen identity (URL, path) used in failure reports.
    pub identity: String,
    pub format: DocumentFormat,
    pub payload: Vec<u8>,
    /// Listing-row metadata, passed through to the export untouched.
    pub meta: RowMeta,
}

impl RawDocument {
    pub fn new(
        identity: impl Into<String>,
        format: DocumentFormat,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            identity: identity.into(),
            format,
            payload: payload.into(),
            meta: RowMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: RowMeta) -> Self {
        self.meta = meta;
        self
    }
}

static RE_POINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)POINT\s*\(\s*(-?\d+(?:\.\d+)?)\s+(-?\d+(?:\.\d+)?)\s*\)").unwrap()
});

/// Identifying metadata of the listing row a document came from. The
/// extractor carries it through to the export untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowMeta {
    pub intersection: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

impl RowMeta {
    pub fn new(intersection: impl Into<String>) -> Self {
        Self {
            intersection: Some(intersection.into()),
            ..Default::default()
        }
    }

    /// Attach coordinates from a `POINT (lon lat)` geometry string. Leaves
    /// the coordinates unset if the string does not parse.
    pub fn with_geom(mut self, geom: &str) -> Self {
        if let Some(caps) = RE_POINT.captures(geom) {
            self.longitude = caps[1].parse().ok();
            self.latitude = caps[2].parse().ok();
        }
        self
    }
}
