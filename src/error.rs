//! Rich diagnostic error types for TMC extraction.
//!
//! Only document-level faults live here. A field that cannot be located is
//! `None` inside the record and never becomes an error.

use miette::Diagnostic;
use thiserror::Error;

/// Errors from document extraction, configuration, and export.
#[derive(Debug, Error, Diagnostic)]
pub enum TmcError {
    #[error("unsupported document format: \"{format}\"")]
    #[diagnostic(
        code(tmc::unsupported_format),
        help(
            "Supported formats are: html (old survey pages), xlsx (summary \
             workbooks) and pdf (page text). Pass the format explicitly with --format."
        )
    )]
    UnsupportedFormat { format: String },

    #[error("parse error in {format} document: {message}")]
    #[diagnostic(
        code(tmc::parse_error),
        help(
            "The document could not be parsed. Verify the payload is a valid {format} \
             survey and not truncated."
        )
    )]
    ParseError { format: String, message: String },

    #[error("worksheet \"{name}\" not found")]
    #[diagnostic(
        code(tmc::missing_sheet),
        help("Count workbooks carry their totals on a worksheet named \"{name}\".")
    )]
    MissingSheet { name: String },

    #[error("empty document: no text extracted from \"{origin}\"")]
    #[diagnostic(
        code(tmc::empty_document),
        help("The source may be a scanned image without a text layer.")
    )]
    EmptyDocument { origin: String },

    #[error("unknown period label: \"{label}\"")]
    #[diagnostic(
        code(tmc::invalid_period),
        help("Valid period labels are AM, MD and PM (comma-separated).")
    )]
    InvalidPeriod { label: String },

    #[error("failed to read config {path}: {source}")]
    #[diagnostic(
        code(tmc::config_read),
        help("Check that the config file exists and is readable.")
    )]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(tmc::config_parse),
        help("The config file must be valid TOML. Check for syntax errors.")
    )]
    ConfigParse { path: String, message: String },

    #[error("export failed: {message}")]
    #[diagnostic(code(tmc::export))]
    Export { message: String },

    #[error("I/O error: {source}")]
    #[diagnostic(
        code(tmc::io),
        help("A filesystem operation failed. Check file paths and permissions.")
    )]
    Io {
        #[source]
        source: std::io::Error,
    },
}

impl From<std::io::Error> for TmcError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

/// Convenience alias for extraction results.
pub type TmcResult<T> = std::result::Result<T, TmcError>;
