//! Supported document formats, resolved once from a file name.

use std::fmt;
use std::path::Path;

/// A document format the pipeline knows how to extract text from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedFormat {
    Pdf,
    Docx,
    Txt,
}

impl SupportedFormat {
    pub const ALL: [SupportedFormat; 3] = [Self::Pdf, Self::Docx, Self::Txt];

    /// Resolve the format from a document name's extension (case-insensitive).
    ///
    /// Returns `None` for anything outside the supported set, including
    /// names without an extension.
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == ext)
    }

    /// Extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
        }
    }
}

impl fmt::Display for SupportedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_extensions_case_insensitively() {
        assert_eq!(SupportedFormat::from_name("Brief.PDF"), Some(SupportedFormat::Pdf));
        assert_eq!(SupportedFormat::from_name("memo.docx"), Some(SupportedFormat::Docx));
        assert_eq!(SupportedFormat::from_name("notes.v2.txt"), Some(SupportedFormat::Txt));
    }

    #[test]
    fn rejects_unknown_or_missing_extensions() {
        assert_eq!(SupportedFormat::from_name("budget.xlsx"), None);
        assert_eq!(SupportedFormat::from_name("README"), None);
        assert_eq!(SupportedFormat::from_name("archive.doc"), None);
        assert_eq!(SupportedFormat::from_name(""), None);
    }

    #[test]
    fn display_includes_dot() {
        assert_eq!(SupportedFormat::Docx.to_string(), ".docx");
    }
}
