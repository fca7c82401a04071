//! Record assembly.
//!
//! Orchestrates: parse → detect periods → apply filter → document fields →
//! period fields. Period detection always completes before any period field
//! is read. A document either yields a complete record or a [`Failure`];
//! partial records are never emitted.

use std::panic::{AssertUnwindSafe, catch_unwind};

use rayon::prelude::*;

use crate::error::TmcResult;
use crate::locator::{FieldLocator, locator_for};
use crate::model::{PeriodBlock, PeriodEntry, PeriodFilter, PeriodLabel, RawDocument, RowMeta, TmcRecord};
use crate::period::PeriodSlots;

/// A document that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub identity: String,
    pub message: String,
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.identity, self.message)
    }
}

/// A successfully extracted record with the identity and row metadata of
/// its source document.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub identity: String,
    pub meta: RowMeta,
    pub record: TmcRecord,
}

/// Outcome of a batch run, both lists in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub records: Vec<Extracted>,
    pub failures: Vec<Failure>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.records.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Detect the period slots of a parsed document.
pub fn detect_periods(locator: &dyn FieldLocator, filter: &PeriodFilter) -> PeriodSlots {
    let classified = locator.anchors().into_iter().filter_map(|anchor| {
        let Some(window) = locator.locate_peak_window(anchor) else {
            tracing::debug!(anchor, format = %locator.format(), "no peak window at anchor");
            return None;
        };
        let label = locator.classify(anchor, &window);
        tracing::debug!(anchor, %window, %label, "classified peak window");
        Some((anchor, label))
    });
    PeriodSlots::detect(classified, filter)
}

/// Build the record for a parsed document.
pub fn assemble(locator: &dyn FieldLocator, filter: &PeriodFilter) -> TmcRecord {
    let slots = detect_periods(locator, filter);

    let periods = PeriodLabel::PERIODS.map(|label| {
        let slot = slots.get(label).copied();
        let available = slot.is_some_and(|s| s.available);
        let scraped = slot.is_some_and(|s| s.scraped);

        let block = slot
            .filter(|s| s.is_populated())
            .and_then(|s| s.position)
            .map(|anchor| PeriodBlock {
                peak_window: locator.locate_peak_window(anchor),
                approaches: locator.locate_approaches(anchor),
            });

        PeriodEntry {
            label,
            available,
            scraped,
            block,
        }
    });

    TmcRecord {
        date: locator.locate_date(),
        weather: locator.locate_weather(),
        survey_type: locator.locate_type(),
        periods,
    }
}

/// Parse and assemble one document.
///
/// Every document-level fault, including a panic inside a third-party
/// decoder, comes back as a [`Failure`] carrying the document's identity.
pub fn extract_document(doc: &RawDocument, filter: &PeriodFilter) -> Result<TmcRecord, Failure> {
    let outcome = catch_unwind(AssertUnwindSafe(|| -> TmcResult<TmcRecord> {
        let locator = locator_for(doc.format, &doc.payload)?;
        Ok(assemble(locator.as_ref(), filter))
    }));

    let message = match outcome {
        Ok(Ok(record)) => return Ok(record),
        Ok(Err(e)) => e.to_string(),
        Err(panic) => panic_message(panic.as_ref()),
    };

    tracing::warn!(identity = %doc.identity, format = %doc.format, error = %message, "document skipped");
    Err(Failure {
        identity: doc.identity.clone(),
        message,
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".into());
    format!("decoder panicked: {detail}")
}

/// Extract every document in parallel. One document's failure never
/// affects another's record.
pub fn extract_batch(docs: &[RawDocument], filter: &PeriodFilter) -> BatchReport {
    let outcomes: Vec<_> = docs
        .par_iter()
        .map(|doc| {
            extract_document(doc, filter).map(|record| Extracted {
                identity: doc.identity.clone(),
                meta: doc.meta.clone(),
                record,
            })
        })
        .collect();

    let mut report = BatchReport::default();
    for outcome in outcomes {
        match outcome {
            Ok(extracted) => report.records.push(extracted),
            Err(failure) => report.failures.push(failure),
        }
    }

    tracing::info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "batch complete"
    );
    report
}
