//! Change detection: decides whether a discovered document needs syncing.
//!
//! The remote modification timestamp is the only version signal. A document
//! whose content changes without its timestamp advancing is never re-synced.

use std::fmt;

use crate::format::SupportedFormat;
use crate::models::{DocumentRecord, SyncState};

/// Outcome of the eligibility check for one discovered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible(SupportedFormat),
    SkippedUnsupported,
    SkippedUpToDate,
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible(_))
    }
}

impl fmt::Display for Eligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eligibility::Eligible(format) => write!(f, "eligible ({})", format),
            Eligibility::SkippedUnsupported => write!(f, "skipped: unsupported type"),
            Eligibility::SkippedUpToDate => write!(f, "skipped: up to date"),
        }
    }
}

/// Whether `doc` passes the supported-type filter.
pub fn is_supported(doc: &DocumentRecord) -> bool {
    SupportedFormat::from_name(&doc.name).is_some()
}

/// Classify a discovered document against the current sync state.
///
/// Unsupported types are rejected first. A previously synced document is
/// eligible only when its `modified` is strictly newer than the stored
/// fingerprint.
pub fn evaluate(doc: &DocumentRecord, state: &SyncState) -> Eligibility {
    let Some(format) = SupportedFormat::from_name(&doc.name) else {
        return Eligibility::SkippedUnsupported;
    };
    match state.fingerprint(&doc.id) {
        Some(fingerprint) if doc.modified <= fingerprint => Eligibility::SkippedUpToDate,
        _ => Eligibility::Eligible(format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn doc(id: &str, name: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            name: name.to_string(),
            modified: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            author: String::new(),
            workspace: String::new(),
        }
    }

    #[test]
    fn new_supported_document_is_eligible() {
        let state = SyncState::default();
        assert_eq!(
            evaluate(&doc("A", "a.pdf"), &state),
            Eligibility::Eligible(SupportedFormat::Pdf)
        );
    }

    #[test]
    fn unsupported_type_wins_over_state() {
        let state = SyncState::default();
        assert_eq!(
            evaluate(&doc("A", "a.pptx"), &state),
            Eligibility::SkippedUnsupported
        );
    }

    #[test]
    fn equal_timestamp_is_up_to_date() {
        let d = doc("A", "a.txt");
        let mut state = SyncState::default();
        state.record_synced(&d, Utc::now());
        assert_eq!(evaluate(&d, &state), Eligibility::SkippedUpToDate);
    }

    #[test]
    fn older_timestamp_is_up_to_date() {
        let mut d = doc("A", "a.txt");
        let mut state = SyncState::default();
        state.record_synced(&d, Utc::now());
        d.modified -= Duration::days(1);
        assert_eq!(evaluate(&d, &state), Eligibility::SkippedUpToDate);
    }

    #[test]
    fn strictly_newer_timestamp_is_eligible() {
        let mut d = doc("A", "a.docx");
        let mut state = SyncState::default();
        state.record_synced(&d, Utc::now());
        d.modified += Duration::seconds(1);
        assert!(evaluate(&d, &state).is_eligible());
    }
}
