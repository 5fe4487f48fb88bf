use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use docscoop::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks whether a URL belongs to the crawl scope
///
/// Scope is an exact, case-insensitive host match. Subdomains of the seed
/// host are out of scope. Scheme and port are not compared.
pub fn in_scope(url: &Url, scope_host: &str) -> bool {
    url.host_str()
        .map_or(false, |host| host.eq_ignore_ascii_case(scope_host))
}
