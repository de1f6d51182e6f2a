//! Error types for the pdf2md-studio library.
//!
//! Two shapes of error exist because they live in two different places:
//!
//! * [`StudioError`]: returned as `Err(StudioError)` from every fallible
//!   operation (selection, conversion, export, download).
//!
//! * [`SessionError`]: the serialisable `{ kind, message }` record that a
//!   [`crate::session::ConversionSession`] keeps as its *last error* so a UI
//!   can show a dismissible message long after the `Result` was consumed.
//!
//! Every [`StudioError`] variant maps onto exactly one [`ErrorKind`], which is
//! the user-facing taxonomy: selection errors, conversion failures and export
//! failures are surfaced differently and must never be confused.

use crate::l10n::Localizer;
use crate::session::SessionStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdf2md-studio library.
#[derive(Debug, Error)]
pub enum StudioError {
    // ── Selection errors (synchronous, never change session state) ──────
    /// Declared MIME type of the selected file is not the accepted type.
    #[error("'{name}' has type '{declared}', but only '{accepted}' documents are supported")]
    InvalidFileType {
        name: String,
        declared: String,
        accepted: String,
    },

    /// Selected file is larger than the configured limit.
    #[error("'{name}' is {size} bytes, which exceeds the {limit}-byte limit")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    // ── State machine errors ──────────────────────────────────────────────
    /// An operation was invoked from a state that does not allow it.
    #[error("Cannot {operation} while the session is {status}")]
    InvalidTransition {
        operation: &'static str,
        status: SessionStatus,
    },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The extraction capability reported an error.
    #[error("Conversion failed: {message}")]
    ConversionFailure { message: String },

    /// The extraction capability could not be loaded.
    #[error("Extraction engine is unavailable: {detail}")]
    CapabilityUnavailable { detail: String },

    /// The configured LLM provider could not be created (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_DYNAMIC_LIB_PATH to the directory holding libpdfium, \
or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// Document bytes could not be opened as a PDF.
    #[error("Document '{name}' is not a readable PDF: {detail}")]
    CorruptDocument { name: String, detail: String },

    /// Every page failed after all retries; output would be empty.
    #[error("All {total} pages failed after {retries} retries each.\nFirst error: {first_error}")]
    AllPagesFailed {
        total: usize,
        retries: u32,
        first_error: String,
    },

    // ── Export errors ─────────────────────────────────────────────────────
    /// Rendering or serialising an export failed.
    #[error("Export to {target} failed: {detail}")]
    ExportFailure { target: String, detail: String },

    /// Could not create or write a downloaded file.
    #[error("Failed to write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Input / config errors ─────────────────────────────────────────────
    /// Could not read the selected file from disk.
    #[error("Failed to read '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The user-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Selection rejected: wrong declared type.
    InvalidFileType,
    /// Selection rejected: file too large.
    FileTooLarge,
    /// Extraction failed; the user must reselect.
    ConversionFailure,
    /// Export failed; the ready session is untouched.
    ExportFailure,
    /// Operation not valid in the current state.
    InvalidState,
    /// Configuration rejected by the builder.
    Config,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Localisation key of the headline shown for this kind of error.
    pub fn message_key(self) -> &'static str {
        match self {
            ErrorKind::InvalidFileType => "supportedFormats",
            ErrorKind::FileTooLarge => "maxFileSize",
            ErrorKind::ConversionFailure => "conversionFailed",
            ErrorKind::ExportFailure => "exportFailed",
            ErrorKind::InvalidState => "invalidState",
            ErrorKind::Config => "invalidConfig",
            ErrorKind::Internal => "unexpectedError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidFileType => "invalid file type",
            ErrorKind::FileTooLarge => "file too large",
            ErrorKind::ConversionFailure => "conversion failure",
            ErrorKind::ExportFailure => "export failure",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::Config => "configuration error",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(s)
    }
}

impl StudioError {
    /// Classify this error into the user-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StudioError::InvalidFileType { .. } => ErrorKind::InvalidFileType,
            StudioError::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            StudioError::InvalidTransition { .. } => ErrorKind::InvalidState,
            StudioError::ConversionFailure { .. }
            | StudioError::CapabilityUnavailable { .. }
            | StudioError::ProviderNotConfigured { .. }
            | StudioError::PdfiumBindingFailed(_)
            | StudioError::CorruptDocument { .. }
            | StudioError::AllPagesFailed { .. }
            | StudioError::InputReadFailed { .. } => ErrorKind::ConversionFailure,
            StudioError::ExportFailure { .. } | StudioError::OutputWriteFailed { .. } => {
                ErrorKind::ExportFailure
            }
            StudioError::InvalidConfig(_) => ErrorKind::Config,
            StudioError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Localised, human-readable message: the headline for the error kind
    /// followed by the specific detail.
    pub fn user_message(&self, l10n: &Localizer) -> String {
        format!("{}\n{}", l10n.t(self.kind().message_key()), self)
    }

    /// Snapshot this error as a storable [`SessionError`].
    pub fn to_session_error(&self) -> SessionError {
        SessionError {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// A stored, dismissible error record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionError {
    /// Which part of the taxonomy the error belongs to.
    pub kind: ErrorKind,
    /// Human-readable detail (English; headline is localised on display).
    pub message: String,
}

impl SessionError {
    /// Localised headline plus the stored detail.
    pub fn user_message(&self, l10n: &Localizer) -> String {
        format!("{}\n{}", l10n.t(self.kind.message_key()), self.message)
    }
}

impl From<&StudioError> for SessionError {
    fn from(e: &StudioError) -> Self {
        e.to_session_error()
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::l10n::Locale;

    #[test]
    fn file_too_large_display() {
        let e = StudioError::FileTooLarge {
            name: "big.pdf".into(),
            size: 12 * 1024 * 1024,
            limit: 10 * 1024 * 1024,
        };
        let msg = e.to_string();
        assert!(msg.contains("big.pdf"), "got: {msg}");
        assert!(msg.contains("10485760"), "got: {msg}");
        assert_eq!(e.kind(), ErrorKind::FileTooLarge);
    }

    #[test]
    fn conversion_side_errors_share_kind() {
        let errors = [
            StudioError::ConversionFailure {
                message: "boom".into(),
            },
            StudioError::PdfiumBindingFailed("missing".into()),
            StudioError::AllPagesFailed {
                total: 3,
                retries: 2,
                first_error: "timeout".into(),
            },
        ];
        for e in &errors {
            assert_eq!(e.kind(), ErrorKind::ConversionFailure, "{e}");
        }
    }

    #[test]
    fn export_failure_is_distinct_from_conversion_failure() {
        let e = StudioError::ExportFailure {
            target: "word-document".into(),
            detail: "surface lost".into(),
        };
        assert_eq!(e.kind(), ErrorKind::ExportFailure);
        assert_ne!(e.kind(), ErrorKind::ConversionFailure);
    }

    #[test]
    fn invalid_transition_names_state() {
        let e = StudioError::InvalidTransition {
            operation: "begin conversion",
            status: SessionStatus::Idle,
        };
        assert_eq!(e.to_string(), "Cannot begin conversion while the session is idle");
    }

    #[test]
    fn user_message_has_localised_headline() {
        let l10n = Localizer::new(Locale::En);
        let e = StudioError::InvalidFileType {
            name: "notes.txt".into(),
            declared: "text/plain".into(),
            accepted: "application/pdf".into(),
        };
        let msg = e.user_message(&l10n);
        assert!(msg.starts_with(&*l10n.t("supportedFormats")), "got: {msg}");
        assert!(msg.contains("notes.txt"));
    }

    #[test]
    fn session_error_round_trips_through_json() {
        let stored = StudioError::ConversionFailure {
            message: "engine crashed".into(),
        }
        .to_session_error();
        let json = serde_json::to_string(&stored).unwrap();
        assert!(json.contains("\"conversion_failure\""), "got: {json}");
        let back: SessionError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stored);
    }
}
