//! Document-type discrimination
//!
//! Decides whether a URL (before fetching) or a response (after fetching) is a
//! document worth harvesting. The URL extension is checked first; content-type
//! hints and magic numbers cover download endpoints without a useful
//! extension, and catch HTML error pages served under a document name.
//!
//! Images are rejected at every stage, whatever the include set says.

use crate::config::DocumentsConfig;
use crate::url::extension_of;
use std::collections::BTreeSet;
use std::fmt;
use url::Url;

/// Extensions that are always images, never documents
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "ico", "tif", "tiff",
];

/// Kind of document, used as the extraction hint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Pdf,
    Doc,
    Docx,
    Xls,
    Xlsx,
    Rtf,
    Csv,
    Txt,
    /// Any other extension the user included
    Other(String),
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "doc" => Self::Doc,
            "docx" => Self::Docx,
            "xls" => Self::Xls,
            "xlsx" => Self::Xlsx,
            "rtf" => Self::Rtf,
            "csv" => Self::Csv,
            "txt" => Self::Txt,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn extension(&self) -> &str {
        match self {
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
            Self::Rtf => "rtf",
            Self::Csv => "csv",
            Self::Txt => "txt",
            Self::Other(ext) => ext,
        }
    }

    /// Maps a specific document media type onto a kind
    fn from_media_type(media_type: &str) -> Option<Self> {
        let kind = match media_type {
            "application/pdf" | "application/x-pdf" => Self::Pdf,
            "application/msword" => Self::Doc,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Self::Docx
            }
            "application/vnd.ms-excel" => Self::Xls,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Self::Xlsx,
            "application/rtf" | "text/rtf" => Self::Rtf,
            "text/csv" => Self::Csv,
            "text/plain" => Self::Txt,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// What a discovered link should become
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    Document(DocumentKind),
    Page,
    Ignored,
}

/// What the leading bytes of a body look like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Magic {
    Pdf,
    /// OLE2 compound file (legacy .doc / .xls)
    Ole,
    Docx,
    Xlsx,
    /// ZIP without a recognizable Office layout
    Zip,
    Rtf,
    Image,
    Html,
}

/// Inspects the start of a body
pub fn sniff(body: &[u8]) -> Option<Magic> {
    const OLE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

    if body.starts_with(b"%PDF-") {
        return Some(Magic::Pdf);
    }
    if body.starts_with(OLE) {
        return Some(Magic::Ole);
    }
    if body.starts_with(b"PK\x03\x04") {
        if contains(body, b"word/") {
            return Some(Magic::Docx);
        }
        if contains(body, b"xl/") {
            return Some(Magic::Xlsx);
        }
        return Some(Magic::Zip);
    }
    if body.starts_with(b"{\\rtf") {
        return Some(Magic::Rtf);
    }
    if is_image_magic(body) {
        return Some(Magic::Image);
    }
    if looks_like_html_bytes(body) {
        return Some(Magic::Html);
    }
    None
}

fn is_image_magic(body: &[u8]) -> bool {
    body.starts_with(b"\x89PNG\r\n\x1a\n")
        || body.starts_with(b"GIF87a")
        || body.starts_with(b"GIF89a")
        || body.starts_with(&[0xFF, 0xD8, 0xFF])
        || (body.starts_with(b"BM") && body.get(6..10) == Some([0u8; 4].as_slice()))
        || (body.starts_with(b"RIFF") && body.get(8..12) == Some(b"WEBP".as_slice()))
        || body.starts_with(b"II*\0")
        || body.starts_with(b"MM\0*")
        || body.starts_with(&[0x00, 0x00, 0x01, 0x00])
        || starts_with_tag(body, "<svg")
}

fn looks_like_html_bytes(body: &[u8]) -> bool {
    ["<!doctype html", "<html", "<head", "<body"]
        .iter()
        .any(|tag| starts_with_tag(body, tag))
}

/// Case-insensitive prefix check after a BOM and leading whitespace
fn starts_with_tag(body: &[u8], tag: &str) -> bool {
    let body = body.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(body);
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    body[start..]
        .get(..tag.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(tag.as_bytes()))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Lowercased media type without parameters
fn media_type(content_type: Option<&str>) -> Option<String> {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty())
}

/// Returns true if the response should be parsed as an HTML page
pub fn is_html_response(content_type: Option<&str>, body: &[u8]) -> bool {
    match media_type(content_type).as_deref() {
        Some("text/html") | Some("application/xhtml+xml") => true,
        None | Some("application/octet-stream") | Some("binary/octet-stream") => {
            looks_like_html_bytes(body)
        }
        Some(_) => false,
    }
}

/// Include/exclude extension rules for one run
#[derive(Debug, Clone)]
pub struct DocumentRules {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl DocumentRules {
    pub fn new(include: BTreeSet<String>, exclude: BTreeSet<String>) -> Self {
        Self { include, exclude }
    }

    pub fn from_config(config: &DocumentsConfig) -> Self {
        Self::new(config.include.clone(), config.exclude.clone())
    }

    fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext)
    }

    /// True if `ext` is a harvestable document extension
    pub fn accepts_extension(&self, ext: &str) -> bool {
        !Self::is_image_extension(ext) && !self.exclude.contains(ext) && self.include.contains(ext)
    }

    /// Classifies a discovered link by its URL alone
    pub fn link_kind(&self, url: &Url) -> LinkKind {
        match extension_of(url) {
            None => LinkKind::Page,
            Some(ext) if Self::is_image_extension(&ext) || self.exclude.contains(&ext) => {
                LinkKind::Ignored
            }
            Some(ext) if self.include.contains(&ext) => {
                LinkKind::Document(DocumentKind::from_extension(&ext))
            }
            Some(_) => LinkKind::Page,
        }
    }

    /// Decides whether a fetched response is a harvestable document
    ///
    /// # Arguments
    ///
    /// * `url` - Final URL of the response
    /// * `content_type` - Raw `Content-Type` header, if any
    /// * `body` - Response body (only the leading bytes matter, plus the
    ///   ZIP local headers for Office files)
    ///
    /// # Returns
    ///
    /// The document kind, or `None` for images, excluded types, HTML and
    /// anything unrecognized.
    pub fn is_document(
        &self,
        url: &Url,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Option<DocumentKind> {
        let ext = extension_of(url);
        let media = media_type(content_type);
        let magic = sniff(body);

        if ext.as_deref().is_some_and(Self::is_image_extension)
            || media.as_deref().is_some_and(|m| m.starts_with("image/"))
            || magic == Some(Magic::Image)
        {
            return None;
        }
        if ext.as_deref().is_some_and(|e| self.exclude.contains(e)) {
            return None;
        }
        if magic == Some(Magic::Html) || is_html_response(content_type, body) {
            return None;
        }

        let hinted = media.as_deref().and_then(DocumentKind::from_media_type);
        let by_extension = ext
            .as_deref()
            .filter(|e| self.include.contains(*e))
            .map(DocumentKind::from_extension);

        let kind = match magic {
            Some(Magic::Pdf) => Some(DocumentKind::Pdf),
            Some(Magic::Rtf) => Some(DocumentKind::Rtf),
            Some(Magic::Docx) => Some(DocumentKind::Docx),
            Some(Magic::Xlsx) => Some(DocumentKind::Xlsx),
            Some(Magic::Ole) => match by_extension.as_ref().or(hinted.as_ref()) {
                Some(DocumentKind::Xls) => Some(DocumentKind::Xls),
                _ => Some(DocumentKind::Doc),
            },
            Some(Magic::Zip) | Some(Magic::Image) | Some(Magic::Html) | None => None,
        }
        .or(by_extension)
        .or(hinted)?;

        self.accepts_extension(kind.extension()).then_some(kind)
    }
}

impl Default for DocumentRules {
    fn default() -> Self {
        Self::from_config(&DocumentsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn rules() -> DocumentRules {
        DocumentRules::default()
    }

    #[test]
    fn test_sniff_magic_numbers() {
        assert_eq!(sniff(b"%PDF-1.7\n..."), Some(Magic::Pdf));
        assert_eq!(
            sniff(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0, 0]),
            Some(Magic::Ole)
        );
        assert_eq!(sniff(b"PK\x03\x04....word/document.xml"), Some(Magic::Docx));
        assert_eq!(sniff(b"PK\x03\x04....xl/workbook.xml"), Some(Magic::Xlsx));
        assert_eq!(sniff(b"PK\x03\x04....data.bin"), Some(Magic::Zip));
        assert_eq!(sniff(b"{\\rtf1\\ansi"), Some(Magic::Rtf));
        assert_eq!(sniff(b"\x89PNG\r\n\x1a\n...."), Some(Magic::Image));
        assert_eq!(sniff(b"  <!DOCTYPE html><html>"), Some(Magic::Html));
        assert_eq!(sniff(b"plain words"), None);
    }

    #[test]
    fn test_link_kind() {
        let rules = rules();
        assert_eq!(
            rules.link_kind(&url("https://example.com/files/Report.PDF")),
            LinkKind::Document(DocumentKind::Pdf)
        );
        assert_eq!(rules.link_kind(&url("https://example.com/about")), LinkKind::Page);
        assert_eq!(
            rules.link_kind(&url("https://example.com/index.html")),
            LinkKind::Page
        );
        assert_eq!(
            rules.link_kind(&url("https://example.com/logo.png")),
            LinkKind::Ignored
        );
        assert_eq!(
            rules.link_kind(&url("https://example.com/clip.mp4")),
            LinkKind::Ignored
        );
    }

    #[test]
    fn test_images_rejected_even_when_included() {
        let mut include = BTreeSet::new();
        include.insert("png".to_string());
        include.insert("pdf".to_string());
        let rules = DocumentRules::new(include, BTreeSet::new());

        assert_eq!(
            rules.link_kind(&url("https://example.com/scan.png")),
            LinkKind::Ignored
        );
        assert_eq!(
            rules.is_document(&url("https://example.com/scan.png"), Some("image/png"), b"\x89PNG\r\n\x1a\n"),
            None
        );
        // Image bytes behind a document name
        assert_eq!(
            rules.is_document(&url("https://example.com/scan.pdf"), None, &[0xFF, 0xD8, 0xFF, 0xE0]),
            None
        );
    }

    #[test]
    fn test_is_document_by_extension() {
        let rules = rules();
        assert_eq!(
            rules.is_document(&url("https://example.com/a.pdf"), Some("application/pdf"), b"%PDF-1.4"),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            rules.is_document(&url("https://example.com/notes.txt"), Some("text/plain"), b"hello"),
            Some(DocumentKind::Txt)
        );
    }

    #[test]
    fn test_html_behind_document_name_is_rejected() {
        let rules = rules();
        assert_eq!(
            rules.is_document(
                &url("https://example.com/report.pdf"),
                Some("text/html; charset=utf-8"),
                b"<html><body>Please log in</body></html>"
            ),
            None
        );
    }

    #[test]
    fn test_is_document_without_extension() {
        let rules = rules();
        assert_eq!(
            rules.is_document(&url("https://example.com/download?id=7"), Some("application/octet-stream"), b"%PDF-1.5"),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            rules.is_document(
                &url("https://example.com/get"),
                Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
                b"PK\x03\x04 xl/"
            ),
            Some(DocumentKind::Xlsx)
        );
        assert_eq!(
            rules.is_document(&url("https://example.com/get"), None, b"\x00\x01binary"),
            None
        );
    }

    #[test]
    fn test_ole_uses_extension_hint() {
        let rules = rules();
        let ole = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
        assert_eq!(
            rules.is_document(&url("https://example.com/budget.xls"), None, &ole),
            Some(DocumentKind::Xls)
        );
        assert_eq!(
            rules.is_document(&url("https://example.com/memo.doc"), None, &ole),
            Some(DocumentKind::Doc)
        );
    }

    #[test]
    fn test_excluded_kind_not_accepted() {
        let mut config = DocumentsConfig::default();
        config.exclude_extensions(["pdf"]);
        let rules = DocumentRules::from_config(&config);

        assert_eq!(
            rules.is_document(&url("https://example.com/download"), Some("application/pdf"), b"%PDF-1.4"),
            None
        );
    }

    #[test]
    fn test_is_html_response() {
        assert!(is_html_response(Some("text/html"), b""));
        assert!(is_html_response(None, b"<!doctype html><title>x</title>"));
        assert!(!is_html_response(Some("application/json"), b"<html>"));
        assert!(!is_html_response(None, b"%PDF-1.4"));
    }
}
