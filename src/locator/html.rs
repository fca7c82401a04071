//! Markup locator using the `scraper` crate.
//!
//! Old survey pages are rendered tables without ids. Every field is found by
//! structural position: the nth table, the nth `th` of a row, the first cell
//! whose text mentions `Peds` or `Bikes`. The second, third and fourth
//! top-level tables hold the peak periods.

use std::collections::HashSet;

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

use crate::error::{TmcError, TmcResult};
use crate::locator::{FieldLocator, digit_runs, parse_date, weather_word};
use crate::model::{Direction, DocumentFormat, Metric, TimeWindow, Volume};

/// Table positions (1-based, CSS `nth-of-type`) that may hold a period.
const PERIOD_TABLES: [usize; 3] = [2, 3, 4];

/// One hop of a structural path: a CSS selector, optionally narrowed to
/// elements whose text contains or lacks literal needles. Text matching is
/// case-sensitive: `PEDs` and `Peds` label different cells.
struct Step<'a> {
    css: String,
    contains: Option<&'a str>,
    excludes: &'a [&'a str],
}

fn step(css: impl Into<String>) -> Step<'static> {
    Step {
        css: css.into(),
        contains: None,
        excludes: &[],
    }
}

impl<'a> Step<'a> {
    fn containing(self, needle: &'a str) -> Step<'a> {
        Step {
            contains: Some(needle),
            ..self
        }
    }

    fn excluding(self, needles: &'a [&'a str]) -> Step<'a> {
        Step {
            excludes: needles,
            ..self
        }
    }

    fn accepts(&self, el: &ElementRef<'_>) -> bool {
        if self.contains.is_none() && self.excludes.is_empty() {
            return true;
        }
        let text = el.text().collect::<String>();
        self.contains.is_none_or(|n| text.contains(n))
            && !self.excludes.iter().any(|n| text.contains(n))
    }
}

/// Locator over a parsed survey page.
pub struct HtmlLocator {
    document: Html,
}

impl HtmlLocator {
    /// Parse markup. A page without any table cannot be a count survey.
    pub fn parse(data: &[u8]) -> TmcResult<Self> {
        let text = String::from_utf8_lossy(data);
        let document = Html::parse_document(&text);

        let locator = Self { document };
        if locator.select_path(&[step("table")]).is_empty() {
            return Err(TmcError::ParseError {
                format: "html".into(),
                message: "no tables in document".into(),
            });
        }
        Ok(locator)
    }

    /// Walk `path` from the document root. Each hop selects descendants of
    /// the previous hop's matches; duplicates are dropped, first seen wins.
    fn select_path(&self, path: &[Step<'_>]) -> Vec<ElementRef<'_>> {
        let mut current = vec![self.document.root_element()];

        for hop in path {
            let Ok(selector) = Selector::parse(&hop.css) else {
                return Vec::new();
            };
            let mut seen = HashSet::new();
            let mut next = Vec::new();
            for scope in &current {
                for el in scope.select(&selector) {
                    if seen.insert(el.id()) && hop.accepts(&el) {
                        next.push(el);
                    }
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }

        current
    }

    fn first_text(&self, path: &[Step<'_>]) -> Option<String> {
        self.select_path(path)
            .first()
            .map(|el| el.text().collect::<String>())
    }

    /// First digit run of the `index`-th match.
    fn nth_count(&self, path: &[Step<'_>], index: Option<usize>) -> Option<Volume> {
        let elements = self.select_path(path);
        let el = elements.get(index?)?;
        count(digit_runs(&el.text().collect::<String>()).first())
    }

    /// Pedestrian and bicycle cells labelled `label`, shared by the east and
    /// west approaches of every period in document order.
    fn labelled_cells(label: &'static str) -> [Step<'static>; 2] {
        [
            step("tr").containing(label),
            step("th.s").containing(label),
        ]
    }

    /// Vehicle cell on the `side` (`LEFT` east, `RIGHT` west) of the
    /// pedestrian rows; `column` is that side's `th` position.
    fn side_vehicles(&self, side: &str, column: usize, anchor: usize) -> Option<Volume> {
        let path = [
            step("tr").containing("Peds"),
            step(format!("th[align='{side}']")),
            step(format!("th:nth-of-type({column})")),
            step("th.s").excluding(&["Peds", "Bikes"]),
        ];
        self.nth_count(&path, anchor.checked_sub(2))
    }
}

fn count(n: Option<&u64>) -> Option<Volume> {
    n.copied().map(Volume::from_raw)
}

/// `mul * anchor - sub`, `None` below zero.
fn offset(anchor: usize, mul: usize, sub: usize) -> Option<usize> {
    (anchor * mul).checked_sub(sub)
}

impl FieldLocator for HtmlLocator {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Html
    }

    fn anchors(&self) -> Vec<usize> {
        PERIOD_TABLES.to_vec()
    }

    fn locate_date(&self) -> Option<NaiveDate> {
        self.first_text(&[step("th[valign='TOP']:nth-of-type(3)"), step("p")])
            .and_then(|t| parse_date(&t))
    }

    fn locate_weather(&self) -> Option<String> {
        self.first_text(&[step("th:nth-of-type(13)"), step("p")])
            .and_then(|t| weather_word(&t))
    }

    fn locate_type(&self) -> Option<String> {
        self.first_text(&[step("th:nth-of-type(8)"), step("p")])
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    fn locate_peak_window(&self, anchor: usize) -> Option<TimeWindow> {
        let text = self.first_text(&[
            step(format!("table:nth-of-type({anchor})")),
            step("[valign='MIDDLE']"),
            step("p.p8"),
        ])?;
        TimeWindow::parse(&text.replace("Maximum Hour ", ""))
    }

    fn locate_volume(
        &self,
        direction: Direction,
        metric: Metric,
        anchor: usize,
    ) -> Option<Volume> {
        let table = || step(format!("table:nth-of-type({anchor})"));

        match (direction, metric) {
            (Direction::North, Metric::Bicycles) => self.nth_count(
                &[
                    table(),
                    step("[valign='BOTTOM']"),
                    step("tr").containing("Bikes"),
                    step("tr:nth-of-type(1)"),
                ],
                Some(0),
            ),
            (Direction::North, Metric::Pedestrians) => {
                let text = self.first_text(&[
                    table(),
                    step("table:nth-of-type(1)"),
                    step("th").containing("PEDs"),
                ])?;
                count(digit_runs(&text).last())
            }
            (Direction::North, Metric::Vehicles) => {
                // The total is the third number in the serialized header
                // cells, attribute values included.
                let markup: String = self
                    .select_path(&[table(), step("table:nth-of-type(1)"), step("th.s")])
                    .iter()
                    .map(|el| el.html())
                    .collect();
                count(digit_runs(&markup).get(2))
            }
            (Direction::East, Metric::Bicycles) => {
                self.nth_count(&Self::labelled_cells("Bikes"), offset(anchor, 2, 3))
            }
            (Direction::West, Metric::Bicycles) => {
                self.nth_count(&Self::labelled_cells("Bikes"), offset(anchor, 2, 4))
            }
            (Direction::East, Metric::Pedestrians) => {
                self.nth_count(&Self::labelled_cells("Peds"), offset(anchor, 2, 3))
            }
            (Direction::West, Metric::Pedestrians) => {
                self.nth_count(&Self::labelled_cells("Peds"), offset(anchor, 2, 4))
            }
            (Direction::East, Metric::Vehicles) => self.side_vehicles("LEFT", 2, anchor),
            (Direction::West, Metric::Vehicles) => self.side_vehicles("RIGHT", 3, anchor),
            (Direction::South, Metric::Bicycles) => self.nth_count(
                &[step("tr:nth-of-type(5)").containing("Bikes")],
                anchor.checked_sub(2),
            ),
            (Direction::South, Metric::Pedestrians) => self.nth_count(
                &[step("tr:nth-of-type(4)"), step("th.s").containing("PEDs")],
                anchor.checked_sub(2),
            ),
            (Direction::South, Metric::Vehicles) => {
                let row = offset(anchor, 5, 6)?;
                let cells = self.select_path(&[
                    step(format!("tr:nth-of-type({row})")),
                    step("th.s").excluding(&["PEDs"]),
                ]);
                let last = cells.last()?;
                count(digit_runs(&last.text().collect::<String>()).first())
            }
        }
    }
}
