// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # tmc-extract
//!
//! Traffic movement count (TMC) extraction from intersection survey
//! documents. Three source layouts are reduced to one canonical
//! [`TmcRecord`](model::TmcRecord):
//!
//! - **Markup** (`locator::html`): legacy survey pages, fields addressed by
//!   CSS selector paths relative to the period tables
//! - **Spreadsheet** (`locator::spreadsheet`): `Summary` worksheets with
//!   fixed cell offsets from per-period anchor rows
//! - **PDF text** (`locator::pdf`): the first page's text layer, fields pulled
//!   by pattern from per-period segments
//!
//! Vehicle totals in PDF text arrive as unlabeled digit runs and are
//! resolved by [`disambiguate`](disambiguate::disambiguate). Counts that
//! cannot be resolved become [`Volume::ManualReview`](model::Volume).
//!
//! ## Library usage
//!
//! ```no_run
//! use tmc_extract::assemble::extract_batch;
//! use tmc_extract::model::{DocumentFormat, PeriodFilter, RawDocument};
//!
//! let page = std::fs::read("count.pdf").unwrap();
//! let docs = vec![RawDocument::new("count.pdf", DocumentFormat::Pdf, page)];
//! let report = extract_batch(&docs, &PeriodFilter::all());
//! for failure in &report.failures {
//!     eprintln!("{failure}");
//! }
//! ```

pub mod assemble;
pub mod config;
pub mod disambiguate;
pub mod error;
pub mod export;
pub mod locator;
pub mod model;
pub mod period;
