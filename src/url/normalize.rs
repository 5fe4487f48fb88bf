use crate::UrlError;
use url::Url;

/// Normalizes a URL string for visited-set lookups
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only http and https
/// 3. Lowercase the scheme and host
/// 4. Drop the port when it is the scheme default
/// 5. Resolve `.` and `..` path segments; an empty path becomes `/`
/// 6. Remove the fragment
///
/// Query strings are kept verbatim: download endpoints frequently select
/// the file through a query parameter.
///
/// # Examples
///
/// ```
/// use docscoop::url::normalize_url;
///
/// let url = normalize_url("HTTP://Example.COM:80/a/../report.pdf#page=2").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/report.pdf");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Normalizes an already parsed URL
///
/// The `url` crate handles case, default ports and dot segments while
/// parsing special schemes; this function enforces the scheme, the host and
/// strips the fragment.
pub fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(UrlError::MissingHost),
    }

    url.set_fragment(None);

    if url.path().is_empty() {
        url.set_path("/");
    }

    Ok(url)
}

/// Returns the lowercase file extension of the URL's last path segment
///
/// Dot-files such as `/.htaccess` have no extension.
///
/// # Examples
///
/// ```
/// use docscoop::url::extension_of;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/files/Budget.XLSX?v=2").unwrap();
/// assert_eq!(extension_of(&url), Some("xlsx".to_string()));
///
/// let url = Url::parse("https://example.com/download?id=7").unwrap();
/// assert_eq!(extension_of(&url), None);
/// ```
pub fn extension_of(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.last()?;
    let (stem, ext) = segment.rsplit_once('.')?;

    if stem.is_empty() || ext.is_empty() {
        return None;
    }

    Some(ext.to_ascii_lowercase())
}
